use crate::domain::ports::StoreError;
use crate::domain::user::UserId;
use rust_decimal::Decimal;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors surfaced by the ledger engine.
///
/// All variants except `Storage` and `IdentifierExhausted` are precondition
/// failures: the call performed no balance mutation and wrote no record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    /// Non-positive amount, same-account transfer, or other malformed request.
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    /// A debit would take the balance below zero.
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },

    /// Malformed query filter (inverted date range, negative amount bound).
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(UserId),

    /// The unique-identifier retry loop hit its cap. Fatal to the call.
    #[error("Gave up generating a unique identifier after {attempts} attempts")]
    IdentifierExhausted { attempts: u32 },

    /// Storage-layer failure, distinct from the business errors above so
    /// callers can treat it as transient.
    #[error("Storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl LedgerError {
    /// True for failures where retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}
