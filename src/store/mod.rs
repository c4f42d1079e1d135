//! Bounded, TTL-aware key/value stores used as the backing storage of the
//! memoizing caches.

mod memory;

pub use memory::{MemoryStore, StoreMetrics};

use std::time::Duration;

use async_trait::async_trait;

/// Store abstraction for the memoizing caches.
///
/// Implementations must be safe to share between tasks. Maintenance may be
/// deferred and admission may be refused, so a value that was just written
/// is not guaranteed to be returned by the next [`get`]. Callers that need
/// pending work applied issue a [`wait`] barrier.
///
/// [`get`]: EvictionStore::get
/// [`wait`]: EvictionStore::wait
#[async_trait]
pub trait EvictionStore<K, V>: Send + Sync {
    /// Returns the value stored for `key`, unless it expired or was evicted.
    async fn get(&self, key: &K) -> Option<V>;

    /// Writes `value` for `key`, to live for `ttl` from now.
    ///
    /// Replaces any resident value along with its expiry. Returns `false` if
    /// the store refused the value. A `true` return does not mean the value
    /// will survive admission.
    async fn set_with_ttl(&self, key: K, value: V, cost: u64, ttl: Duration) -> bool;

    /// Atomically returns the live value for `key`, or stores `value` if
    /// there is none.
    ///
    /// A value stored this way has no expiry: it stays until a
    /// [`set_with_ttl`] replaces it or the store evicts it. Returns `None` if
    /// the store refused `value`.
    ///
    /// [`set_with_ttl`]: EvictionStore::set_with_ttl
    async fn get_or_insert(&self, key: K, value: V, cost: u64) -> Option<V>;

    /// Waits until the pending maintenance of the store has been applied.
    async fn wait(&self);
}
