use crate::domain::account::Currency;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Open,
    Deposit,
    Withdraw,
    Transfer,
    Interest,
    Fee,
}

/// One row of the batch operations file.
///
/// `user` names the owner (only meaningful for `open`); `account` and
/// `counterparty` are caller-chosen labels resolved to account ids by the
/// batch runner. Which fields are required depends on the operation kind.
#[derive(Debug, Deserialize, Clone)]
pub struct OperationRecord {
    pub op: OpKind,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub counterparty: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<Currency>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Reads batch operations from a CSV source.
///
/// Wraps `csv::Reader` and provides a lazy iterator over
/// `csv::Result<OperationRecord>`, trimming whitespace and tolerating
/// variable-length rows.
pub struct OperationReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OperationReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn operations(self) -> impl Iterator<Item = csv::Result<OperationRecord>> {
        self.reader.into_deserialize()
    }
}
