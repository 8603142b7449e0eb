use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Keyed async mutexes. Holding the guard for a key excludes every other holder
/// of the same key; distinct keys never contend.
pub(crate) struct LockTable<K> {
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K: Eq + Hash + Clone> LockTable<K> {
    pub(crate) fn new() -> Self {
        Self { locks: DashMap::new() }
    }

    pub(crate) async fn lock(&self, key: K) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the shard lock is released before awaiting.
        let mutex = self.locks.entry(key).or_default().value().clone();
        mutex.lock_owned().await
    }

    /// Drop entries nobody holds or waits on.
    pub(crate) fn prune(&self) {
        self.locks.retain(|_, m| Arc::strong_count(m) > 1);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locks.len()
    }
}
