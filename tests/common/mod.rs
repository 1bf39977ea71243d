#![allow(dead_code)]

use bankledger::application::engine::LedgerEngine;
use bankledger::domain::account::{Account, AccountType, Currency};
use bankledger::domain::ports::UserStore;
use bankledger::domain::user::{User, UserId};
use bankledger::infrastructure::in_memory::{
    InMemoryAccountStore, InMemoryTransactionStore, InMemoryUserStore,
};
use rust_decimal::Decimal;
use std::sync::Arc;

pub struct TestLedger {
    pub engine: Arc<LedgerEngine>,
    pub users: InMemoryUserStore,
    pub transactions: InMemoryTransactionStore,
}

pub fn ledger() -> TestLedger {
    let users = InMemoryUserStore::new();
    let transactions = InMemoryTransactionStore::new();
    let engine = LedgerEngine::new(
        Box::new(InMemoryAccountStore::new()),
        Box::new(transactions.clone()),
        Box::new(users.clone()),
    );
    TestLedger {
        engine: Arc::new(engine),
        users,
        transactions,
    }
}

pub async fn user(ledger: &TestLedger, name: &str) -> UserId {
    let user = User::new(name);
    let id = user.id;
    ledger.users.insert(user).await.unwrap();
    id
}

pub async fn funded_account(ledger: &TestLedger, owner: UserId, balance: Decimal) -> Account {
    ledger
        .engine
        .open_account(owner, AccountType::Checking, Currency::Usd, balance)
        .await
        .unwrap()
}
