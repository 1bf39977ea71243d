use crate::domain::account::{Account, AccountId};
use crate::domain::transaction::{Transaction, TransactionId, TransactionType};
use crate::domain::user::{User, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

pub type AccountStoreBox = Box<dyn AccountStore>;
pub type TransactionStoreBox = Box<dyn TransactionStore>;
pub type UserStoreBox = Box<dyn UserStore>;

/// Storage-layer failures, kept separate from business errors.
///
/// `Duplicate` signals a uniqueness-constraint violation; the engine treats
/// it as expected during identifier generation and retries. Everything else
/// aborts the call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("duplicate key: {0}")]
    Duplicate(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Inserts a new account. Fails with [`StoreError::Duplicate`] if the
    /// account number (or id) is already taken.
    async fn insert(&self, account: Account) -> StoreResult<()>;

    /// Overwrites an existing account's state.
    async fn update(&self, account: Account) -> StoreResult<()>;

    async fn get(&self, id: AccountId) -> StoreResult<Option<Account>>;

    async fn get_by_number(&self, number: &str) -> StoreResult<Option<Account>>;

    async fn list_by_owner(&self, owner: UserId) -> StoreResult<Vec<Account>>;

    async fn exists(&self, id: AccountId) -> StoreResult<bool>;

    /// Removes the account. Returns whether a record was deleted.
    async fn delete(&self, id: AccountId) -> StoreResult<bool>;
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Appends a record to the history. Fails with [`StoreError::Duplicate`]
    /// if the transaction number is already taken. The history is
    /// append-only: there is no update or delete.
    async fn append(&self, tx: Transaction) -> StoreResult<()>;

    /// Appends a batch of records atomically: either every record is
    /// committed or none is. Fails with [`StoreError::Duplicate`] if any
    /// transaction number in the batch is already taken.
    async fn append_all(&self, txs: &[Transaction]) -> StoreResult<()>;

    async fn get(&self, id: TransactionId) -> StoreResult<Option<Transaction>>;

    /// Returns the page of records where the source OR destination account is
    /// in `accounts`, intersected with every supplied filter dimension.
    ///
    /// Ordering is `created_at` descending with transaction number ascending
    /// as tie-break, so identical queries against unchanged state return
    /// identical pages.
    async fn find(
        &self,
        accounts: &[AccountId],
        filter: &TransactionFilter,
        page: PageRequest,
    ) -> StoreResult<Page<Transaction>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: User) -> StoreResult<()>;

    async fn get(&self, id: UserId) -> StoreResult<Option<User>>;
}

/// Filter specification for the transaction query surface.
///
/// A plain value interpreted by the storage adapter; absent fields do not
/// constrain the result. Range validation happens in the engine before the
/// filter reaches a store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub tx_type: Option<TransactionType>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
}

impl TransactionFilter {
    /// Whether a record passes the date, type and amount dimensions.
    /// Account-set membership is the store's concern.
    pub fn matches(&self, tx: &Transaction) -> bool {
        if self.start.is_some_and(|start| tx.created_at < start) {
            return false;
        }
        if self.end.is_some_and(|end| tx.created_at > end) {
            return false;
        }
        if self.tx_type.is_some_and(|tx_type| tx.tx_type != tx_type) {
            return false;
        }
        if self.min_amount.is_some_and(|min| tx.amount.value() < min) {
            return false;
        }
        if self.max_amount.is_some_and(|max| tx.amount.value() > max) {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Zero-based page index.
    pub page: usize,
    pub size: usize,
}

impl PageRequest {
    pub fn new(page: usize, size: usize) -> Self {
        Self { page, size }
    }

    pub fn offset(&self) -> usize {
        self.page * self.size
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 0, size: 50 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub size: usize,
    /// Total matching records across all pages.
    pub total: usize,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> usize {
        if self.size == 0 {
            0
        } else {
            self.total.div_ceil(self.size)
        }
    }
}
