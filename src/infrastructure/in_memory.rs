use crate::domain::account::{Account, AccountId};
use crate::domain::ports::{
    AccountStore, Page, PageRequest, StoreError, StoreResult, TransactionFilter,
    TransactionStore, UserStore,
};
use crate::domain::transaction::{Transaction, TransactionId};
use crate::domain::user::{User, UserId};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Thread-safe in-memory account store.
///
/// Clones share the same underlying map, so a clone kept by the caller
/// observes everything written through the engine.
#[derive(Default, Clone)]
pub struct InMemoryAccountStore {
    accounts: Arc<RwLock<HashMap<AccountId, Account>>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn insert(&self, account: Account) -> StoreResult<()> {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&account.id) {
            return Err(StoreError::Duplicate(account.id.to_string()));
        }
        if accounts
            .values()
            .any(|existing| existing.number == account.number)
        {
            return Err(StoreError::Duplicate(account.number.to_string()));
        }
        accounts.insert(account.id, account);
        Ok(())
    }

    async fn update(&self, account: Account) -> StoreResult<()> {
        let mut accounts = self.accounts.write().await;
        accounts.insert(account.id, account);
        Ok(())
    }

    async fn get(&self, id: AccountId) -> StoreResult<Option<Account>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.get(&id).cloned())
    }

    async fn get_by_number(&self, number: &str) -> StoreResult<Option<Account>> {
        let accounts = self.accounts.read().await;
        Ok(accounts
            .values()
            .find(|account| account.number.as_str() == number)
            .cloned())
    }

    async fn list_by_owner(&self, owner: UserId) -> StoreResult<Vec<Account>> {
        let accounts = self.accounts.read().await;
        let mut owned: Vec<Account> = accounts
            .values()
            .filter(|account| account.owner == owner)
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.number.cmp(&b.number));
        Ok(owned)
    }

    async fn exists(&self, id: AccountId) -> StoreResult<bool> {
        let accounts = self.accounts.read().await;
        Ok(accounts.contains_key(&id))
    }

    async fn delete(&self, id: AccountId) -> StoreResult<bool> {
        let mut accounts = self.accounts.write().await;
        Ok(accounts.remove(&id).is_some())
    }
}

#[derive(Default)]
struct TransactionLog {
    records: Vec<Transaction>,
    // Uniqueness constraint on transaction numbers.
    numbers: HashSet<String>,
}

/// Thread-safe in-memory transaction history. Append-only by construction:
/// the trait exposes no update or delete.
#[derive(Default, Clone)]
pub struct InMemoryTransactionStore {
    inner: Arc<RwLock<TransactionLog>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in the history, regardless of account.
    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn involves(tx: &Transaction, accounts: &[AccountId]) -> bool {
    tx.source_account.is_some_and(|id| accounts.contains(&id))
        || tx.destination_account.is_some_and(|id| accounts.contains(&id))
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn append(&self, tx: Transaction) -> StoreResult<()> {
        let mut log = self.inner.write().await;
        if !log.numbers.insert(tx.number.as_str().to_string()) {
            return Err(StoreError::Duplicate(tx.number.to_string()));
        }
        log.records.push(tx);
        Ok(())
    }

    async fn append_all(&self, txs: &[Transaction]) -> StoreResult<()> {
        let mut log = self.inner.write().await;
        // Validate the whole batch before touching the log.
        let mut batch = HashSet::new();
        for tx in txs {
            if log.numbers.contains(tx.number.as_str()) || !batch.insert(tx.number.as_str()) {
                return Err(StoreError::Duplicate(tx.number.to_string()));
            }
        }
        for tx in txs {
            log.numbers.insert(tx.number.as_str().to_string());
            log.records.push(tx.clone());
        }
        Ok(())
    }

    async fn get(&self, id: TransactionId) -> StoreResult<Option<Transaction>> {
        let log = self.inner.read().await;
        Ok(log.records.iter().find(|tx| tx.id == id).cloned())
    }

    async fn find(
        &self,
        accounts: &[AccountId],
        filter: &TransactionFilter,
        page: PageRequest,
    ) -> StoreResult<Page<Transaction>> {
        let log = self.inner.read().await;
        let mut matches: Vec<Transaction> = log
            .records
            .iter()
            .filter(|tx| involves(tx, accounts) && filter.matches(tx))
            .cloned()
            .collect();

        // Newest first; the number tie-break keeps equal timestamps stable.
        matches.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.number.cmp(&b.number))
        });

        let total = matches.len();
        let items: Vec<Transaction> = matches
            .into_iter()
            .skip(page.offset())
            .take(page.size)
            .collect();

        Ok(Page {
            items,
            page: page.page,
            size: page.size,
            total,
        })
    }
}

/// Thread-safe in-memory user store.
#[derive(Default, Clone)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<HashMap<UserId, User>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn insert(&self, user: User) -> StoreResult<()> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.id) {
            return Err(StoreError::Duplicate(user.id.to_string()));
        }
        users.insert(user.id, user);
        Ok(())
    }

    async fn get(&self, id: UserId) -> StoreResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(&id).cloned())
    }
}
