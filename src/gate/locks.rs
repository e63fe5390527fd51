//! Per-key async locks serializing read-then-write sequences on the store.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
pub(crate) struct KeyedLocks {
    inner: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub(crate) async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut locks = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            // Entries nobody holds or waits on are only referenced by the map.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(key.to_string()).or_default())
        };
        entry.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let locks = KeyedLocks::default();
        let guard = locks.lock("caller").await;
        assert!(timeout(Duration::from_millis(20), locks.lock("caller"))
            .await
            .is_err());
        drop(guard);
        assert!(timeout(Duration::from_millis(20), locks.lock("caller"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let locks = KeyedLocks::default();
        let _a = locks.lock("a").await;
        assert!(timeout(Duration::from_millis(20), locks.lock("b"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn idle_entries_are_pruned() {
        let locks = KeyedLocks::default();
        drop(locks.lock("a").await);
        drop(locks.lock("b").await);
        let _c = locks.lock("c").await;
        assert_eq!(locks.len(), 1);
    }
}
