use crate::domain::account::{AccountId, Amount, Balance, Currency};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Length of the random hex part of a transaction number.
const TRANSACTION_NUMBER_LEN: usize = 16;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TransactionId(Uuid);

impl TransactionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Human-facing transaction number: `TXN` followed by a 16-character hex
/// token. Unique across the store; callers regenerate and retry on collision.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionNumber(String);

impl TransactionNumber {
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(format!("TXN{}", &hex[..TRANSACTION_NUMBER_LEN]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    TransferOut,
    TransferIn,
    InterestCredit,
    FeeDeduction,
}

/// Immutable record of a balance-affecting event.
///
/// Records are append-only: once persisted they are never mutated or deleted.
/// `balance_after` snapshots the affected account's balance immediately after
/// this record's mutation and is the audit anchor for the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub number: TransactionNumber,
    pub tx_type: TransactionType,
    pub amount: Amount,
    pub description: String,
    /// Account money comes from; `None` for deposits and interest credits.
    pub source_account: Option<AccountId>,
    /// Account money goes to; `None` for withdrawals and fee deductions.
    pub destination_account: Option<AccountId>,
    /// Currency of the account whose balance is being recorded.
    pub currency: Currency,
    pub balance_after: Balance,
    /// Shared by the two halves of one transfer; `None` otherwise.
    pub reference_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tx_type: TransactionType,
        amount: Amount,
        description: impl Into<String>,
        source_account: Option<AccountId>,
        destination_account: Option<AccountId>,
        currency: Currency,
        balance_after: Balance,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            number: TransactionNumber::generate(),
            tx_type,
            amount,
            description: description.into(),
            source_account,
            destination_account,
            currency,
            balance_after,
            reference_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_reference(mut self, reference_id: Uuid) -> Self {
        self.reference_id = Some(reference_id);
        self
    }

    /// Replaces the transaction number after a store uniqueness violation.
    pub(crate) fn renumber(&mut self) {
        self.number = TransactionNumber::generate();
    }
}
