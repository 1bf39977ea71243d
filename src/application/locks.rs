use crate::domain::account::AccountId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of per-account mutexes.
///
/// Every mutating engine operation holds its account's mutex across the whole
/// read-validate-mutate-persist sequence, so two debits on the same account
/// can never interleave. Operations on disjoint accounts run in parallel.
#[derive(Default)]
pub(super) struct AccountLocks {
    inner: Mutex<HashMap<AccountId, Arc<Mutex<()>>>>,
}

impl AccountLocks {
    pub(super) async fn acquire(&self, id: AccountId) -> OwnedMutexGuard<()> {
        let handle = {
            let mut map = self.inner.lock().await;
            Arc::clone(map.entry(id).or_default())
        };
        handle.lock_owned().await
    }

    /// Locks both accounts in ascending id order so concurrent
    /// opposite-direction transfers cannot deadlock.
    pub(super) async fn acquire_pair(
        &self,
        a: AccountId,
        b: AccountId,
    ) -> (OwnedMutexGuard<()>, OwnedMutexGuard<()>) {
        if a <= b {
            let first = self.acquire(a).await;
            let second = self.acquire(b).await;
            (first, second)
        } else {
            let second = self.acquire(b).await;
            let first = self.acquire(a).await;
            (first, second)
        }
    }

    /// Evicts an account's registry entry so closed accounts do not pin a
    /// mutex forever. A later acquire for the same id creates a fresh mutex,
    /// so only call this once the account itself is gone.
    pub(super) async fn remove(&self, id: AccountId) {
        let mut map = self.inner.lock().await;
        map.remove(&id);
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}
