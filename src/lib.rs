//! # singleflight-ttl
//!
//! Deduplicating memoization cache with a fixed time-to-live.
//!
//! This crate provides caches implementing [`LoadOrStore`]: given a key and a
//! (possibly slow) asynchronous producer, the producer runs at most once per
//! key at any time, every concurrent caller for that key receives the value
//! of that single run, and the value expires after a fixed TTL. A burst of
//! concurrent misses on the same key results in one computation.
//!
//! Values live in an [`EvictionStore`]. [`MemoryStore`] is the provided
//! implementation, a [moka](https://docs.rs/moka) cache with per-entry TTL
//! and a cost budget.
//!
//! ## Strategies
//! Two ways of serializing fills are provided, both behind the same trait:
//!
//! - [`EntryLockCache`] publishes an empty [`Entry`] carrying its own lock
//!   before producing the value. Locks are reclaimed with their entries, but a
//!   miss costs two store writes.
//! - [`RegistryLockCache`] takes a per-key lock from a [`LockRegistry`] and
//!   only writes the produced value. A miss costs one store write, but the
//!   registry keeps a lock for every key ever seen.
//!
//! [`MemoCache`] selects one of them from a [`CacheConfig`].
//!
//! ## Usage
//! Producers are awaited while the fill lock is held, so the caches are
//! meant to be driven by an async runtime such as [tokio].
//!
//! ```no_run
//! use singleflight_ttl::{CacheConfig, LoadOrStore, MemoCache, StoreConfig, Strategy};
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), singleflight_ttl::ConfigError> {
//! let store = StoreConfig::new(Duration::from_secs(2));
//! let cache = MemoCache::new(CacheConfig::new(Strategy::EntryLock, store))?;
//!
//! let value = cache
//!     .load_or_store("k1", || async { String::from("expensive") })
//!     .await;
//! assert_eq!(value, "expensive");
//! # Ok(())
//! # }
//! ```
//!
//! ### Failures
//! A producer error returned through [`LoadOrStore::try_load_or_store`] is
//! handed to the caller that ran the producer and nothing is cached. The next
//! caller holding the lock runs its own producer. Errors are never cached, and
//! a panicking producer behaves the same way.

pub mod config;
pub mod entry;
mod entry_lock;
pub mod error;
mod memo;
pub mod registry;
mod registry_lock;
pub mod store;

pub use config::{CacheConfig, StoreConfig};
pub use entry::{Entry, ValueHolder};
pub use entry_lock::EntryLockCache;
pub use error::ConfigError;
pub use memo::{MemoCache, Strategy};
pub use registry::LockRegistry;
pub use registry_lock::RegistryLockCache;
pub use store::{EvictionStore, MemoryStore};

use std::future::Future;

use async_trait::async_trait;

/// Deduplicating load-or-compute operation.
///
/// For a given key, concurrent calls that miss the cache are serialized: one
/// of them runs its producer and the others receive the produced value
/// without running theirs.
#[async_trait]
pub trait LoadOrStore<K, V>: Send + Sync {
    /// Returns the cached value for `key`, running `produce` to compute it
    /// on a miss.
    async fn load_or_store<F, Fut>(&self, key: K, produce: F) -> V
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = V> + Send;

    /// Same as [`load_or_store`], with a fallible producer.
    ///
    /// An error is returned only to the caller whose producer failed, and the
    /// key stays uncached.
    ///
    /// [`load_or_store`]: LoadOrStore::load_or_store
    async fn try_load_or_store<F, Fut, E>(&self, key: K, produce: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<V, E>> + Send,
        E: Send;
}
