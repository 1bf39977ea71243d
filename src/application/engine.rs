use crate::application::locks::AccountLocks;
use crate::domain::account::{
    Account, AccountId, AccountNumber, AccountType, Amount, Balance, Currency,
};
use crate::domain::ports::{
    AccountStoreBox, Page, PageRequest, StoreError, TransactionFilter, TransactionStoreBox,
    UserStoreBox,
};
use crate::domain::transaction::{Transaction, TransactionType};
use crate::domain::user::UserId;
use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Cap on the unique-identifier generation loop. Collisions on a 16-hex-char
/// token are vanishingly rare, so hitting the cap means the store is
/// misbehaving and the call fails with `IdentifierExhausted`.
const MAX_IDENTIFIER_ATTEMPTS: u32 = 8;

/// The transaction engine: validates balance-changing operations, applies
/// them atomically, appends immutable transaction records and answers
/// filtered history queries.
///
/// Every mutating operation serializes on the touched account(s) through
/// [`AccountLocks`], so the sufficient-balance check and the following debit
/// can never be separated by another debit on the same account. If a store
/// write fails after a partial update, the pre-operation snapshots are
/// restored before the lock is released; callers never observe intermediate
/// state.
pub struct LedgerEngine {
    accounts: AccountStoreBox,
    transactions: TransactionStoreBox,
    users: UserStoreBox,
    locks: AccountLocks,
}

impl LedgerEngine {
    pub fn new(
        accounts: AccountStoreBox,
        transactions: TransactionStoreBox,
        users: UserStoreBox,
    ) -> Self {
        Self {
            accounts,
            transactions,
            users,
            locks: AccountLocks::default(),
        }
    }

    /// Opens an account for an existing user.
    ///
    /// The account number is a random token; on a store uniqueness violation
    /// a fresh one is generated, up to [`MAX_IDENTIFIER_ATTEMPTS`].
    pub async fn open_account(
        &self,
        owner: UserId,
        account_type: AccountType,
        currency: Currency,
        initial_balance: Decimal,
    ) -> Result<Account> {
        self.require_user(owner).await?;
        let balance = Balance::new(initial_balance)?;
        let mut account = Account::open(owner, account_type, currency, balance);

        for attempt in 1..=MAX_IDENTIFIER_ATTEMPTS {
            match self.accounts.insert(account.clone()).await {
                Ok(()) => {
                    tracing::info!(number = %account.number, %owner, "opened account");
                    return Ok(account);
                }
                Err(StoreError::Duplicate(key)) => {
                    tracing::warn!(attempt, key, "account number collision, regenerating");
                    account.number = AccountNumber::generate();
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(LedgerError::IdentifierExhausted {
            attempts: MAX_IDENTIFIER_ATTEMPTS,
        })
    }

    pub async fn account(&self, id: AccountId) -> Result<Account> {
        self.load(id).await
    }

    pub async fn account_by_number(&self, number: &str) -> Result<Account> {
        self.accounts
            .get_by_number(number)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(number.to_string()))
    }

    pub async fn accounts_of(&self, owner: UserId) -> Result<Vec<Account>> {
        self.require_user(owner).await?;
        Ok(self.accounts.list_by_owner(owner).await?)
    }

    pub async fn close_account(&self, id: AccountId) -> Result<()> {
        let _guard = self.locks.acquire(id).await;
        if self.accounts.delete(id).await? {
            self.locks.remove(id).await;
            tracing::info!(account = %id, "closed account");
            Ok(())
        } else {
            Err(LedgerError::AccountNotFound(id.to_string()))
        }
    }

    /// Credits `amount` to the account and appends a `DEPOSIT` record.
    pub async fn deposit(
        &self,
        account_id: AccountId,
        amount: Decimal,
        description: &str,
    ) -> Result<Transaction> {
        self.credit_account(account_id, amount, description, TransactionType::Deposit)
            .await
    }

    /// Same shape as a deposit, recorded as `INTEREST_CREDIT`. The engine
    /// applies a supplied amount; rate policy lives elsewhere.
    pub async fn apply_interest(
        &self,
        account_id: AccountId,
        amount: Decimal,
        description: &str,
    ) -> Result<Transaction> {
        self.credit_account(
            account_id,
            amount,
            description,
            TransactionType::InterestCredit,
        )
        .await
    }

    /// Debits `amount` from the account and appends a `WITHDRAWAL` record.
    /// Fails with `InsufficientBalance` if the balance does not cover it.
    pub async fn withdraw(
        &self,
        account_id: AccountId,
        amount: Decimal,
        description: &str,
    ) -> Result<Transaction> {
        self.debit_account(account_id, amount, description, TransactionType::Withdrawal)
            .await
    }

    /// Same shape as a withdrawal, recorded as `FEE_DEDUCTION`.
    pub async fn apply_fee(
        &self,
        account_id: AccountId,
        amount: Decimal,
        description: &str,
    ) -> Result<Transaction> {
        self.debit_account(account_id, amount, description, TransactionType::FeeDeduction)
            .await
    }

    /// Moves `amount` from `source_id` to `destination_id` atomically and
    /// appends a `TRANSFER_OUT`/`TRANSFER_IN` pair sharing one fresh
    /// reference id. Each record is balance-anchored to its own account.
    pub async fn transfer(
        &self,
        source_id: AccountId,
        destination_id: AccountId,
        amount: Decimal,
        description: &str,
    ) -> Result<(Transaction, Transaction)> {
        let amount = Amount::new(amount)?;
        if source_id == destination_id {
            return Err(LedgerError::InvalidTransaction(
                "cannot transfer to the same account".to_string(),
            ));
        }

        let _guards = self.locks.acquire_pair(source_id, destination_id).await;

        let mut source = self.load(source_id).await?;
        let mut destination = self.load(destination_id).await?;
        let source_snapshot = source.clone();
        let destination_snapshot = destination.clone();

        source.debit(amount)?;
        destination.credit(amount);

        let reference_id = Uuid::new_v4();
        let outgoing = Transaction::new(
            TransactionType::TransferOut,
            amount,
            description,
            Some(source.id),
            Some(destination.id),
            source.currency,
            source.balance,
        )
        .with_reference(reference_id);
        let incoming = Transaction::new(
            TransactionType::TransferIn,
            amount,
            description,
            Some(source.id),
            Some(destination.id),
            destination.currency,
            destination.balance,
        )
        .with_reference(reference_id);

        // Scoped so a failure at any step falls through to one rollback path.
        // The pair goes through a single batch append: the store commits both
        // records or neither, so a failure never strands half a transfer.
        let written = async {
            self.accounts.update(source).await?;
            self.accounts.update(destination).await?;
            self.append_pair(outgoing, incoming).await
        }
        .await;

        match written {
            Ok(pair) => {
                tracing::info!(
                    %reference_id,
                    source = %source_id,
                    destination = %destination_id,
                    amount = %amount,
                    "transfer applied"
                );
                Ok(pair)
            }
            Err(err) => {
                self.restore(source_snapshot).await;
                self.restore(destination_snapshot).await;
                Err(err)
            }
        }
    }

    /// Filtered, paginated transaction history for a user.
    ///
    /// Resolves the user's complete account set and returns records where the
    /// source OR destination account belongs to it, intersected with every
    /// supplied filter dimension. Ordering is `created_at` descending with
    /// transaction number ascending as tie-break.
    pub async fn query_transactions(
        &self,
        user_id: UserId,
        filter: &TransactionFilter,
        page: PageRequest,
    ) -> Result<Page<Transaction>> {
        validate_filter(filter)?;
        self.require_user(user_id).await?;

        let accounts = self.accounts.list_by_owner(user_id).await?;
        let ids: Vec<AccountId> = accounts.iter().map(|account| account.id).collect();
        Ok(self.transactions.find(&ids, filter, page).await?)
    }

    async fn credit_account(
        &self,
        account_id: AccountId,
        amount: Decimal,
        description: &str,
        tx_type: TransactionType,
    ) -> Result<Transaction> {
        let amount = Amount::new(amount)?;
        let _guard = self.locks.acquire(account_id).await;

        let mut account = self.load(account_id).await?;
        let snapshot = account.clone();
        account.credit(amount);

        let record = Transaction::new(
            tx_type,
            amount,
            description,
            None,
            Some(account.id),
            account.currency,
            account.balance,
        );
        self.commit(snapshot, account, record).await
    }

    async fn debit_account(
        &self,
        account_id: AccountId,
        amount: Decimal,
        description: &str,
        tx_type: TransactionType,
    ) -> Result<Transaction> {
        let amount = Amount::new(amount)?;
        let _guard = self.locks.acquire(account_id).await;

        let mut account = self.load(account_id).await?;
        let snapshot = account.clone();
        account.debit(amount)?;

        let record = Transaction::new(
            tx_type,
            amount,
            description,
            Some(account.id),
            None,
            account.currency,
            account.balance,
        );
        self.commit(snapshot, account, record).await
    }

    /// Persists the mutated account and appends its record. Caller must hold
    /// the account lock; on a failed append the snapshot is restored before
    /// the error propagates.
    async fn commit(
        &self,
        snapshot: Account,
        account: Account,
        record: Transaction,
    ) -> Result<Transaction> {
        self.accounts.update(account).await?;
        match self.append_record(record).await {
            Ok(record) => Ok(record),
            Err(err) => {
                self.restore(snapshot).await;
                Err(err)
            }
        }
    }

    /// Appends a record, regenerating the transaction number on a store
    /// uniqueness violation, up to [`MAX_IDENTIFIER_ATTEMPTS`].
    async fn append_record(&self, mut record: Transaction) -> Result<Transaction> {
        for attempt in 1..=MAX_IDENTIFIER_ATTEMPTS {
            match self.transactions.append(record.clone()).await {
                Ok(()) => return Ok(record),
                Err(StoreError::Duplicate(key)) => {
                    tracing::warn!(attempt, key, "transaction number collision, regenerating");
                    record.renumber();
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(LedgerError::IdentifierExhausted {
            attempts: MAX_IDENTIFIER_ATTEMPTS,
        })
    }

    /// Appends a transfer pair through the store's atomic batch append,
    /// regenerating both transaction numbers on a uniqueness violation, up to
    /// [`MAX_IDENTIFIER_ATTEMPTS`].
    async fn append_pair(
        &self,
        mut outgoing: Transaction,
        mut incoming: Transaction,
    ) -> Result<(Transaction, Transaction)> {
        for attempt in 1..=MAX_IDENTIFIER_ATTEMPTS {
            let batch = [outgoing.clone(), incoming.clone()];
            match self.transactions.append_all(&batch).await {
                Ok(()) => return Ok((outgoing, incoming)),
                Err(StoreError::Duplicate(key)) => {
                    tracing::warn!(attempt, key, "transaction number collision, regenerating");
                    outgoing.renumber();
                    incoming.renumber();
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(LedgerError::IdentifierExhausted {
            attempts: MAX_IDENTIFIER_ATTEMPTS,
        })
    }

    async fn restore(&self, snapshot: Account) {
        let id = snapshot.id;
        if let Err(err) = self.accounts.update(snapshot).await {
            tracing::error!(account = %id, %err, "failed to restore account after aborted write");
        }
    }

    async fn load(&self, id: AccountId) -> Result<Account> {
        self.accounts
            .get(id)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(id.to_string()))
    }

    async fn require_user(&self, id: UserId) -> Result<()> {
        if self.users.get(id).await?.is_none() {
            return Err(LedgerError::UserNotFound(id));
        }
        Ok(())
    }
}

fn validate_filter(filter: &TransactionFilter) -> Result<()> {
    if let (Some(start), Some(end)) = (filter.start, filter.end)
        && start > end
    {
        return Err(LedgerError::InvalidFilter(
            "start date must be before or equal to end date".to_string(),
        ));
    }
    if filter.min_amount.is_some_and(|min| min < Decimal::ZERO) {
        return Err(LedgerError::InvalidFilter(
            "minimum amount cannot be negative".to_string(),
        ));
    }
    if filter.max_amount.is_some_and(|max| max < Decimal::ZERO) {
        return Err(LedgerError::InvalidFilter(
            "maximum amount cannot be negative".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{AccountStore, StoreResult, TransactionStore, UserStore};
    use crate::domain::transaction::TransactionId;
    use crate::domain::user::User;
    use crate::infrastructure::in_memory::{
        InMemoryAccountStore, InMemoryTransactionStore, InMemoryUserStore,
    };
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    async fn engine_with_user() -> (LedgerEngine, UserId) {
        let users = InMemoryUserStore::new();
        let user = User::new("test");
        let user_id = user.id;
        users.insert(user).await.unwrap();

        let engine = LedgerEngine::new(
            Box::new(InMemoryAccountStore::new()),
            Box::new(InMemoryTransactionStore::new()),
            Box::new(users),
        );
        (engine, user_id)
    }

    #[tokio::test]
    async fn test_open_account_unknown_user() {
        let engine = LedgerEngine::new(
            Box::new(InMemoryAccountStore::new()),
            Box::new(InMemoryTransactionStore::new()),
            Box::new(InMemoryUserStore::new()),
        );

        let stranger = UserId::new();
        let result = engine
            .open_account(stranger, AccountType::Checking, Currency::Usd, dec!(0))
            .await;
        assert_eq!(result.unwrap_err(), LedgerError::UserNotFound(stranger));
    }

    #[tokio::test]
    async fn test_open_account_rejects_negative_initial_balance() {
        let (engine, user_id) = engine_with_user().await;

        let result = engine
            .open_account(user_id, AccountType::Savings, Currency::Eur, dec!(-1))
            .await;
        assert!(matches!(
            result,
            Err(LedgerError::InvalidTransaction(_))
        ));
    }

    #[tokio::test]
    async fn test_validate_filter_rejects_inverted_range() {
        let now = chrono::Utc::now();
        let filter = TransactionFilter {
            start: Some(now),
            end: Some(now - chrono::Duration::hours(1)),
            ..Default::default()
        };
        assert!(matches!(
            validate_filter(&filter),
            Err(LedgerError::InvalidFilter(_))
        ));
    }

    #[tokio::test]
    async fn test_validate_filter_rejects_negative_bounds() {
        let filter = TransactionFilter {
            min_amount: Some(dec!(-1)),
            ..Default::default()
        };
        assert!(validate_filter(&filter).is_err());

        let filter = TransactionFilter {
            max_amount: Some(dec!(-1)),
            ..Default::default()
        };
        assert!(validate_filter(&filter).is_err());
    }

    /// Account store that reports every insert as a duplicate-key violation.
    struct CollidingAccountStore;

    #[async_trait]
    impl AccountStore for CollidingAccountStore {
        async fn insert(&self, account: Account) -> StoreResult<()> {
            Err(StoreError::Duplicate(account.number.to_string()))
        }
        async fn update(&self, _account: Account) -> StoreResult<()> {
            Ok(())
        }
        async fn get(&self, _id: AccountId) -> StoreResult<Option<Account>> {
            Ok(None)
        }
        async fn get_by_number(&self, _number: &str) -> StoreResult<Option<Account>> {
            Ok(None)
        }
        async fn list_by_owner(&self, _owner: UserId) -> StoreResult<Vec<Account>> {
            Ok(Vec::new())
        }
        async fn exists(&self, _id: AccountId) -> StoreResult<bool> {
            Ok(false)
        }
        async fn delete(&self, _id: AccountId) -> StoreResult<bool> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn test_account_number_retry_cap() {
        let users = InMemoryUserStore::new();
        let user = User::new("test");
        let user_id = user.id;
        users.insert(user).await.unwrap();

        let engine = LedgerEngine::new(
            Box::new(CollidingAccountStore),
            Box::new(InMemoryTransactionStore::new()),
            Box::new(users),
        );

        let result = engine
            .open_account(user_id, AccountType::Checking, Currency::Usd, dec!(0))
            .await;
        assert_eq!(
            result.unwrap_err(),
            LedgerError::IdentifierExhausted {
                attempts: MAX_IDENTIFIER_ATTEMPTS
            }
        );
    }

    /// Transaction store whose appends always fail, for rollback coverage.
    struct BrokenTransactionStore;

    #[async_trait]
    impl TransactionStore for BrokenTransactionStore {
        async fn append(&self, _tx: Transaction) -> StoreResult<()> {
            Err(StoreError::Unavailable("append rejected".to_string()))
        }
        async fn append_all(&self, _txs: &[Transaction]) -> StoreResult<()> {
            Err(StoreError::Unavailable("append rejected".to_string()))
        }
        async fn get(&self, _id: TransactionId) -> StoreResult<Option<Transaction>> {
            Ok(None)
        }
        async fn find(
            &self,
            _accounts: &[AccountId],
            _filter: &TransactionFilter,
            page: PageRequest,
        ) -> StoreResult<Page<Transaction>> {
            Ok(Page {
                items: Vec::new(),
                page: page.page,
                size: page.size,
                total: 0,
            })
        }
    }

    #[tokio::test]
    async fn test_failed_append_rolls_back_balance() {
        let users = InMemoryUserStore::new();
        let user = User::new("test");
        let user_id = user.id;
        users.insert(user).await.unwrap();

        let accounts = InMemoryAccountStore::new();
        let engine = LedgerEngine::new(
            Box::new(accounts.clone()),
            Box::new(BrokenTransactionStore),
            Box::new(users),
        );

        let account = engine
            .open_account(user_id, AccountType::Checking, Currency::Usd, dec!(100))
            .await
            .unwrap();

        let result = engine.deposit(account.id, dec!(50), "doomed").await;
        assert!(matches!(result, Err(LedgerError::Storage(_))));
        assert!(result.unwrap_err().is_transient());

        let stored = accounts.get(account.id).await.unwrap().unwrap();
        assert_eq!(stored.balance.value(), dec!(100));
    }

    /// Delegates to a real store but rejects batch appends, so a transfer
    /// fails after both account updates have landed.
    struct BatchRejectingStore {
        inner: InMemoryTransactionStore,
    }

    #[async_trait]
    impl TransactionStore for BatchRejectingStore {
        async fn append(&self, tx: Transaction) -> StoreResult<()> {
            self.inner.append(tx).await
        }
        async fn append_all(&self, _txs: &[Transaction]) -> StoreResult<()> {
            Err(StoreError::Unavailable("batch rejected".to_string()))
        }
        async fn get(&self, id: TransactionId) -> StoreResult<Option<Transaction>> {
            self.inner.get(id).await
        }
        async fn find(
            &self,
            accounts: &[AccountId],
            filter: &TransactionFilter,
            page: PageRequest,
        ) -> StoreResult<Page<Transaction>> {
            self.inner.find(accounts, filter, page).await
        }
    }

    #[tokio::test]
    async fn test_failed_transfer_leaves_no_records() {
        let users = InMemoryUserStore::new();
        let user = User::new("test");
        let user_id = user.id;
        users.insert(user).await.unwrap();

        let accounts = InMemoryAccountStore::new();
        let transactions = InMemoryTransactionStore::new();
        let engine = LedgerEngine::new(
            Box::new(accounts.clone()),
            Box::new(BatchRejectingStore {
                inner: transactions.clone(),
            }),
            Box::new(users),
        );

        let source = engine
            .open_account(user_id, AccountType::Checking, Currency::Usd, dec!(100))
            .await
            .unwrap();
        let destination = engine
            .open_account(user_id, AccountType::Checking, Currency::Usd, dec!(0))
            .await
            .unwrap();

        let result = engine
            .transfer(source.id, destination.id, dec!(40), "doomed")
            .await;
        assert!(matches!(result, Err(LedgerError::Storage(_))));

        // Both balances roll back and the history stays empty: no orphaned
        // half of the pair.
        let source = accounts.get(source.id).await.unwrap().unwrap();
        let destination = accounts.get(destination.id).await.unwrap().unwrap();
        assert_eq!(source.balance.value(), dec!(100));
        assert_eq!(destination.balance.value(), dec!(0));
        assert!(transactions.is_empty().await);
    }
}
