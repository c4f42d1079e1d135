use std::{future::Future, hash::Hash, sync::Arc};

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::CacheConfig;
use crate::entry::{Entry, ValueHolder};
use crate::entry_lock::EntryLockCache;
use crate::error::ConfigError;
use crate::registry_lock::RegistryLockCache;
use crate::store::MemoryStore;
use crate::LoadOrStore;

/// Concurrency-control strategy of a [`MemoCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Lock embedded in the cache entry, see [`EntryLockCache`].
    #[default]
    EntryLock,
    /// Side table of per-key locks, see [`RegistryLockCache`].
    LockRegistry,
}

/// Memoizing cache backed by a [`MemoryStore`], with the strategy picked at
/// construction time.
#[derive(Debug)]
pub enum MemoCache<K, V>
where
    K: Hash + Eq,
{
    EntryLock(EntryLockCache<K, V>),
    LockRegistry(RegistryLockCache<K, V>),
}

impl<K, V> MemoCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a cache and its store from `config`.
    pub fn new(config: CacheConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let ttl = config.store.default_ttl;

        let cache = match config.strategy {
            Strategy::EntryLock => {
                let store = MemoryStore::<K, Arc<Entry<V>>>::new(config.store)?;
                let cache = EntryLockCache::new(store, ttl).with_cost(config.entry_cost);
                Self::EntryLock(cache)
            }
            Strategy::LockRegistry => {
                let store = MemoryStore::<K, ValueHolder<V>>::new(config.store)?;
                let cache = RegistryLockCache::new(store, ttl).with_cost(config.entry_cost);
                Self::LockRegistry(cache)
            }
        };

        Ok(cache)
    }

    pub fn strategy(&self) -> Strategy {
        match self {
            Self::EntryLock(_) => Strategy::EntryLock,
            Self::LockRegistry(_) => Strategy::LockRegistry,
        }
    }
}

#[async_trait]
impl<K, V> LoadOrStore<K, V> for MemoCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn load_or_store<F, Fut>(&self, key: K, produce: F) -> V
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = V> + Send,
    {
        match self {
            Self::EntryLock(cache) => cache.load_or_store(key, produce).await,
            Self::LockRegistry(cache) => cache.load_or_store(key, produce).await,
        }
    }

    async fn try_load_or_store<F, Fut, E>(&self, key: K, produce: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<V, E>> + Send,
        E: Send,
    {
        match self {
            Self::EntryLock(cache) => cache.try_load_or_store(key, produce).await,
            Self::LockRegistry(cache) => cache.try_load_or_store(key, produce).await,
        }
    }
}
