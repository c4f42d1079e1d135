use std::{
    fmt,
    hash::Hash,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use async_trait::async_trait;
use moka::future::Cache;
use moka::notification::RemovalCause;
use tracing::{debug, trace};

use crate::config::StoreConfig;
use crate::error::ConfigError;
use crate::store::EvictionStore;

/// A value together with the parameters it was written with.
#[derive(Debug, Clone)]
struct StoredItem<V> {
    value: V,
    /// Weight of the item against [`StoreConfig::max_cost`].
    cost: u32,
    /// `None` keeps the item until it is replaced or evicted.
    ttl: Option<Duration>,
}

/// Expires every item after the TTL it was last written with.
struct ItemExpiration;

impl<K, V> moka::Expiry<K, StoredItem<V>> for ItemExpiration {
    fn expire_after_create(
        &self,
        _key: &K,
        item: &StoredItem<V>,
        _current_time: Instant,
    ) -> Option<Duration> {
        item.ttl
    }

    fn expire_after_update(
        &self,
        _key: &K,
        item: &StoredItem<V>,
        _current_time: Instant,
        _current_duration: Option<Duration>,
    ) -> Option<Duration> {
        item.ttl
    }
}

/// Bounded in-memory store with per-entry TTL, backed by a [`moka`] cache.
///
/// The total cost of the resident items is kept under
/// [`StoreConfig::max_cost`], and moka's TinyLFU policy decides which items
/// are admitted and evicted once that budget is used up. An item that costs
/// more than the whole budget is rejected upfront.
///
/// Reads never return an expired item. Evictions and expirations are
/// applied by moka's maintenance, which [`wait`] runs to completion.
///
/// [`wait`]: EvictionStore::wait
pub struct MemoryStore<K, V> {
    cache: Cache<K, StoredItem<V>>,
    metrics: Arc<Metrics>,
    config: StoreConfig,
}

impl<K, V> MemoryStore<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Initialize a new [`MemoryStore`].
    pub fn new(config: StoreConfig) -> Result<Arc<Self>, ConfigError> {
        config.validate()?;

        let metrics: Arc<Metrics> = Default::default();
        let removals = metrics.clone();

        let cache = Cache::builder()
            .initial_capacity(config.initial_capacity)
            .max_capacity(config.max_cost)
            .weigher(|_key: &K, item: &StoredItem<V>| item.cost)
            .expire_after(ItemExpiration)
            .eviction_listener(move |_key, _item, cause| removals.record_removal(cause))
            .build();

        Ok(Arc::new(Self {
            cache,
            metrics,
            config,
        }))
    }

    /// Returns the store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Writes `value` with the default TTL of the store.
    pub async fn set(&self, key: K, value: V, cost: u64) -> bool {
        self.set_with_ttl(key, value, cost, self.config.default_ttl)
            .await
    }

    /// Number of resident items, as of the last maintenance run.
    ///
    /// Items that expired since then may still be counted.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Returns a snapshot of the store counters.
    pub fn metrics(&self) -> StoreMetrics {
        self.metrics.snapshot()
    }

    /// Wraps `value` for the cache, or returns `None` if it can never fit.
    fn item(&self, value: V, cost: u64, ttl: Option<Duration>) -> Option<StoredItem<V>> {
        if cost > self.config.max_cost {
            self.metrics.rejected.fetch_add(1, Ordering::Relaxed);
            debug!(cost, max_cost = self.config.max_cost, "rejected oversized item");

            return None;
        }

        Some(StoredItem {
            value,
            cost: u32::try_from(cost).unwrap_or(u32::MAX),
            ttl,
        })
    }
}

#[async_trait]
impl<K, V> EvictionStore<K, V> for MemoryStore<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> Option<V> {
        match self.cache.get(key).await {
            Some(item) => {
                self.metrics.hits.fetch_add(1, Ordering::Relaxed);
                Some(item.value)
            }
            None => {
                self.metrics.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    async fn set_with_ttl(&self, key: K, value: V, cost: u64, ttl: Duration) -> bool {
        let Some(item) = self.item(value, cost, Some(ttl)) else {
            return false;
        };
        self.cache.insert(key, item).await;

        true
    }

    async fn get_or_insert(&self, key: K, value: V, cost: u64) -> Option<V> {
        let item = self.item(value, cost, None)?;
        let entry = self.cache.entry(key).or_insert(item).await;
        if entry.is_fresh() {
            trace!("inserted item without expiry");
        }

        Some(entry.into_value().value)
    }

    async fn wait(&self) {
        self.cache.run_pending_tasks().await;
    }
}

impl<K, V> fmt::Debug for MemoryStore<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("config", &self.config)
            .field("metrics", &self.metrics.snapshot())
            .finish()
    }
}

/// Counters of a [`MemoryStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreMetrics {
    /// Lookups that returned a value.
    pub hits: u64,
    /// Lookups that found nothing or an expired item.
    pub misses: u64,
    /// Writes refused because the item costs more than the whole budget.
    pub rejected: u64,
    /// Items removed, or refused admission, to stay within the budget.
    pub evicted: u64,
    /// Items removed after their TTL elapsed.
    pub expired: u64,
}

#[derive(Debug, Default)]
struct Metrics {
    hits: AtomicU64,
    misses: AtomicU64,
    rejected: AtomicU64,
    evicted: AtomicU64,
    expired: AtomicU64,
}

impl Metrics {
    fn record_removal(&self, cause: RemovalCause) {
        match cause {
            RemovalCause::Expired => self.expired.fetch_add(1, Ordering::Relaxed),
            RemovalCause::Size => self.evicted.fetch_add(1, Ordering::Relaxed),
            _ => return,
        };
        trace!(?cause, "removed item");
    }

    fn snapshot(&self) -> StoreMetrics {
        StoreMetrics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
        }
    }
}
