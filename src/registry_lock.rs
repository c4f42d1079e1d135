use std::{
    convert::Infallible, future::Future, hash::Hash, marker::PhantomData, sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use tracing::trace;

use crate::entry::ValueHolder;
use crate::registry::LockRegistry;
use crate::store::{EvictionStore, MemoryStore};
use crate::LoadOrStore;

/// Memoizing cache guarded by a side table of per-key locks.
///
/// Fills are serialized through a lock taken from a [`LockRegistry`], so only
/// the filled [`ValueHolder`] is ever written to the store: a miss costs a
/// single store write. The registry keeps one lock per distinct key for the
/// lifetime of the cache.
#[derive(Debug)]
pub struct RegistryLockCache<K, V, S = MemoryStore<K, ValueHolder<V>>>
where
    K: Hash + Eq,
{
    store: Arc<S>,
    locks: LockRegistry<K>,
    ttl: Duration,
    cost: u64,
    _types: PhantomData<fn(K) -> V>,
}

impl<K, V, S> RegistryLockCache<K, V, S>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: EvictionStore<K, ValueHolder<V>>,
{
    /// Creates a cache whose values live for `ttl` in `store`.
    pub fn new(store: Arc<S>, ttl: Duration) -> Self {
        Self {
            store,
            locks: LockRegistry::new(),
            ttl,
            cost: 1,
            _types: PhantomData,
        }
    }

    /// Sets the cost charged to the store for each value.
    pub fn with_cost(mut self, cost: u64) -> Self {
        self.cost = cost;

        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Number of per-key locks created so far.
    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }
}

#[async_trait]
impl<K, V, S> LoadOrStore<K, V> for RegistryLockCache<K, V, S>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: EvictionStore<K, ValueHolder<V>>,
{
    async fn load_or_store<F, Fut>(&self, key: K, produce: F) -> V
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = V> + Send,
    {
        let produced = self
            .try_load_or_store(key, move || async move { Ok::<_, Infallible>(produce().await) })
            .await;

        match produced {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    async fn try_load_or_store<F, Fut, E>(&self, key: K, produce: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<V, E>> + Send,
        E: Send,
    {
        if let Some(holder) = self.store.get(&key).await {
            return Ok(holder.value().clone());
        }

        let lock = self.locks.lock_for(&key);
        let _guard = lock.lock().await;

        // Stored while this caller was waiting for the lock.
        if let Some(holder) = self.store.get(&key).await {
            return Ok(holder.value().clone());
        }

        let holder = ValueHolder::new(produce().await?);
        let value = holder.value().clone();
        trace!("filled entry");

        self.store
            .set_with_ttl(key, holder, self.cost, self.ttl)
            .await;
        self.store.wait().await;

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::time;

    use super::*;
    use crate::config::StoreConfig;

    fn cache(ttl: Duration) -> RegistryLockCache<u32, String> {
        let config = StoreConfig::builder(ttl)
            .initial_capacity(64)
            .build()
            .unwrap();

        RegistryLockCache::new(MemoryStore::new(config).unwrap(), ttl)
    }

    #[tokio::test]
    async fn warm_key_skips_registry() {
        let cache = cache(Duration::from_secs(60));
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        for _ in 0..3 {
            let value = cache
                .load_or_store(1, move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    String::from("one")
                })
                .await;
            assert_eq!(value, "one");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.lock_count(), 1);
    }

    #[tokio::test]
    async fn failed_fill_stores_nothing() {
        let cache = cache(Duration::from_secs(60));

        let failed = cache
            .try_load_or_store(1, || async { Err::<String, _>("unavailable") })
            .await;
        assert_eq!(failed, Err("unavailable"));
        assert!(cache.store().get(&1).await.is_none());

        let value = cache
            .try_load_or_store(1, || async { Ok::<_, &str>(String::from("one")) })
            .await;
        assert_eq!(value.as_deref(), Ok("one"));
        assert!(cache.store().get(&1).await.is_some());
    }

    #[tokio::test]
    async fn locks_outlive_expired_values() {
        let ttl = Duration::from_millis(100);
        let cache = cache(ttl);

        for key in 0..10 {
            cache.load_or_store(key, || async { String::from("value") }).await;
        }
        time::sleep(ttl * 2).await;

        for key in 0..10 {
            assert!(cache.store().get(&key).await.is_none());
        }
        assert_eq!(cache.lock_count(), 10);
    }

    #[tokio::test]
    async fn fill_longer_than_ttl_is_shared() {
        let ttl = Duration::from_millis(200);
        let cache = cache(ttl);
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let produce = move || async move {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            time::sleep(Duration::from_millis(300)).await;
            format!("value-{call}")
        };

        let late = async {
            time::sleep(Duration::from_millis(250)).await;
            cache.load_or_store(1, produce).await
        };
        let (first, late) = tokio::join!(cache.load_or_store(1, produce), late);

        assert_eq!(first, "value-0");
        assert_eq!(late, first);
        assert_eq!(cache.load_or_store(1, produce).await, first);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
