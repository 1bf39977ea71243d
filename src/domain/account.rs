use crate::domain::user::UserId;
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Length of the random hex token used as an account number.
pub const ACCOUNT_NUMBER_LEN: usize = 16;

/// Unique identifier of an account, assigned at creation and never changed.
///
/// `Ord` matters: transfers lock both accounts in ascending id order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct AccountId(Uuid);

impl AccountId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Human-facing account number: a random 16-character hex token.
///
/// Uniqueness is enforced by the account store; callers regenerate and retry
/// on collision.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountNumber(String);

impl AccountNumber {
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(hex[..ACCOUNT_NUMBER_LEN].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Eur,
    Usd,
    Gbp,
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
            Currency::Gbp => "GBP",
        };
        f.write_str(code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountType {
    Checking,
    Savings,
}

/// A strictly positive monetary amount.
///
/// Wraps `rust_decimal::Decimal` so that a non-positive transaction amount
/// cannot exist past the validation boundary.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, LedgerError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(LedgerError::InvalidTransaction(format!(
                "amount must be positive, got {value}"
            )))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = LedgerError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An account balance. Unlike [`Amount`] it may be zero, but never negative.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Balance(Decimal);

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Result<Self, LedgerError> {
        if value >= Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(LedgerError::InvalidTransaction(format!(
                "balance cannot be negative, got {value}"
            )))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn credit(&self, amount: Amount) -> Balance {
        Self(self.0 + amount.value())
    }

    pub fn debit(&self, amount: Amount) -> Result<Balance, LedgerError> {
        if self.0 >= amount.value() {
            Ok(Self(self.0 - amount.value()))
        } else {
            Err(LedgerError::InsufficientBalance {
                required: amount.value(),
                available: self.0,
            })
        }
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A user-owned account. The balance is mutated only by the ledger engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub number: AccountNumber,
    pub account_type: AccountType,
    pub balance: Balance,
    pub currency: Currency,
    pub owner: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn open(
        owner: UserId,
        account_type: AccountType,
        currency: Currency,
        balance: Balance,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::new(),
            number: AccountNumber::generate(),
            account_type,
            balance,
            currency,
            owner,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn credit(&mut self, amount: Amount) {
        self.balance = self.balance.credit(amount);
        self.updated_at = Utc::now();
    }

    pub fn debit(&mut self, amount: Amount) -> Result<(), LedgerError> {
        self.balance = self.balance.debit(amount)?;
        self.updated_at = Utc::now();
        Ok(())
    }
}
