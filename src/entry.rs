//! Values stored by the memoizing caches.

use std::sync::{Arc, OnceLock};

use tokio::sync::{Mutex, MutexGuard};

/// Lazily filled cache entry carrying its own fill lock.
///
/// An entry is published empty, then filled at most once by whichever caller
/// holds its lock. Once filled, the value is never replaced: the entry lives
/// until the store drops it.
#[derive(Debug, Default)]
pub struct Entry<V> {
    lock: Mutex<()>,
    slot: OnceLock<V>,
}

impl<V> Entry<V> {
    /// Creates an entry without a value.
    pub fn empty() -> Self {
        Self {
            lock: Mutex::new(()),
            slot: OnceLock::new(),
        }
    }

    /// Returns the value, if the entry has been filled.
    pub fn get(&self) -> Option<&V> {
        self.slot.get()
    }

    pub fn is_filled(&self) -> bool {
        self.slot.get().is_some()
    }

    /// Acquires the fill lock.
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }

    /// Fills the entry and returns the stored value.
    ///
    /// If the entry already holds a value, `value` is discarded and the
    /// existing one is returned.
    pub fn fill(&self, value: V) -> &V {
        self.slot.get_or_init(|| value)
    }
}

/// Immutable wrapper around a produced value.
///
/// Cloning a holder shares the value instead of copying it.
#[derive(Debug)]
pub struct ValueHolder<V>(Arc<V>);

impl<V> ValueHolder<V> {
    pub fn new(value: V) -> Self {
        Self(Arc::new(value))
    }

    pub fn value(&self) -> &V {
        &self.0
    }
}

impl<V> Clone for ValueHolder<V> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_never_overwrites() {
        let entry = Entry::empty();
        assert!(!entry.is_filled());

        assert_eq!(entry.fill("first"), &"first");
        assert_eq!(entry.fill("second"), &"first");
        assert_eq!(entry.get(), Some(&"first"));
    }

    #[tokio::test]
    async fn lock_is_exclusive() {
        let entry = Entry::<u32>::empty();

        let guard = entry.lock().await;
        assert!(entry.lock.try_lock().is_err());

        drop(guard);
        assert!(entry.lock.try_lock().is_ok());
    }

    #[test]
    fn holder_clones_share_value() {
        let holder = ValueHolder::new(String::from("value"));
        let clone = holder.clone();

        assert!(std::ptr::eq(holder.value(), clone.value()));
    }
}
