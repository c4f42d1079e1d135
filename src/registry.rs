//! Per-key lock table.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::trace;

/// Concurrent mapping from key to a dedicated lock.
///
/// Locks are created on first use and never removed, so the registry grows
/// with the number of distinct keys ever seen. This is the price paid for
/// keeping lock identity independent from the lifetime of cache entries.
#[derive(Debug)]
pub struct LockRegistry<K>
where
    K: Hash + Eq,
{
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K> Default for LockRegistry<K>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }
}

impl<K> LockRegistry<K>
where
    K: Hash + Eq + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock for `key`, creating it if needed.
    ///
    /// Concurrent calls for the same key always return the same lock.
    pub fn lock_for(&self, key: &K) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.get(key) {
            return Arc::clone(lock.value());
        }

        // The shard stays write-locked while the entry is held, which makes
        // get-or-create a single step.
        let lock = Arc::clone(self.locks.entry(key.clone()).or_default().value());
        trace!(locks = self.locks.len(), "registered key lock");
        lock
    }

    /// Number of keys that own a lock.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn same_key_same_lock() {
        let registry = LockRegistry::new();

        let first = registry.lock_for(&"a");
        let second = registry.lock_for(&"a");
        let other = registry.lock_for(&"b");

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn concurrent_callers_converge() {
        let registry = LockRegistry::new();

        let locks: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|_| scope.spawn(|| registry.lock_for(&42u64)))
                .collect();

            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect()
        });

        assert!(locks.iter().all(|lock| Arc::ptr_eq(lock, &locks[0])));
        assert_eq!(registry.len(), 1);
    }
}
