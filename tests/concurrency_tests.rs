mod common;

use bankledger::domain::ports::{PageRequest, TransactionFilter};
use bankledger::domain::transaction::TransactionType;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_concurrent_withdrawals_drain_to_exactly_zero() {
    let ledger = common::ledger();
    let owner = common::user(&ledger, "alice").await;
    let account = common::funded_account(&ledger, owner, dec!(100)).await;

    let n = 10;
    let mut tasks = Vec::new();
    for _ in 0..n {
        let engine = Arc::clone(&ledger.engine);
        let account_id = account.id;
        tasks.push(tokio::spawn(async move {
            engine.withdraw(account_id, dec!(10), "slice").await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let stored = ledger.engine.account(account.id).await.unwrap();
    assert_eq!(stored.balance.value(), dec!(0));

    // Exactly n records, each with a distinct running balance.
    let filter = TransactionFilter {
        tx_type: Some(TransactionType::Withdrawal),
        ..Default::default()
    };
    let page = ledger
        .engine
        .query_transactions(owner, &filter, PageRequest::new(0, 50))
        .await
        .unwrap();
    assert_eq!(page.total, n);

    let snapshots: HashSet<Decimal> = page
        .items
        .iter()
        .map(|tx| tx.balance_after.value())
        .collect();
    assert_eq!(snapshots.len(), n);
}

#[tokio::test]
async fn test_opposite_direction_transfers_do_not_deadlock() {
    let ledger = common::ledger();
    let owner = common::user(&ledger, "alice").await;
    let a = common::funded_account(&ledger, owner, dec!(500)).await;
    let b = common::funded_account(&ledger, owner, dec!(500)).await;

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let engine = Arc::clone(&ledger.engine);
        let (from, to) = (a.id, b.id);
        tasks.push(tokio::spawn(async move {
            engine.transfer(from, to, dec!(1), "ping").await
        }));

        let engine = Arc::clone(&ledger.engine);
        let (from, to) = (b.id, a.id);
        tasks.push(tokio::spawn(async move {
            engine.transfer(from, to, dec!(1), "pong").await
        }));
    }

    tokio::time::timeout(Duration::from_secs(10), async {
        for task in tasks {
            task.await.unwrap().unwrap();
        }
    })
    .await
    .expect("transfers deadlocked");

    // Equal counts in both directions: both balances land where they began.
    let a_after = ledger.engine.account(a.id).await.unwrap();
    let b_after = ledger.engine.account(b.id).await.unwrap();
    assert_eq!(a_after.balance.value(), dec!(500));
    assert_eq!(b_after.balance.value(), dec!(500));
    assert_eq!(
        a_after.balance.value() + b_after.balance.value(),
        dec!(1000)
    );
}

#[tokio::test]
async fn test_disjoint_accounts_make_progress_in_parallel() {
    let ledger = common::ledger();
    let owner = common::user(&ledger, "alice").await;
    let a = common::funded_account(&ledger, owner, dec!(0)).await;
    let b = common::funded_account(&ledger, owner, dec!(0)).await;

    let mut tasks = Vec::new();
    for account_id in [a.id, b.id] {
        for _ in 0..50 {
            let engine = Arc::clone(&ledger.engine);
            tasks.push(tokio::spawn(async move {
                engine.deposit(account_id, dec!(1), "").await
            }));
        }
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(
        ledger.engine.account(a.id).await.unwrap().balance.value(),
        dec!(50)
    );
    assert_eq!(
        ledger.engine.account(b.id).await.unwrap().balance.value(),
        dec!(50)
    );
}

#[tokio::test]
async fn test_concurrent_transfers_never_double_spend() {
    let ledger = common::ledger();
    let owner = common::user(&ledger, "alice").await;
    let source = common::funded_account(&ledger, owner, dec!(50)).await;
    let sink = common::funded_account(&ledger, owner, dec!(0)).await;

    // 100 competing transfers of 1, but only 50 can be funded.
    let mut tasks = Vec::new();
    for _ in 0..100 {
        let engine = Arc::clone(&ledger.engine);
        let (from, to) = (source.id, sink.id);
        tasks.push(tokio::spawn(async move {
            engine.transfer(from, to, dec!(1), "").await
        }));
    }

    let mut succeeded = 0;
    for task in tasks {
        if task.await.unwrap().is_ok() {
            succeeded += 1;
        }
    }

    assert_eq!(succeeded, 50);
    assert_eq!(
        ledger
            .engine
            .account(source.id)
            .await
            .unwrap()
            .balance
            .value(),
        dec!(0)
    );
    assert_eq!(
        ledger.engine.account(sink.id).await.unwrap().balance.value(),
        dec!(50)
    );
}
