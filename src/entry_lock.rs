use std::{
    convert::Infallible, future::Future, hash::Hash, marker::PhantomData, sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::entry::Entry;
use crate::store::{EvictionStore, MemoryStore};
use crate::LoadOrStore;

/// Memoizing cache whose fill lock lives inside the cache entry.
///
/// On a miss, an empty [`Entry`] is published to the store before the value
/// is produced. Racing callers all end up with that entry and serialize on its
/// lock; the first one to get it produces the value, the others find it
/// filled. Since the lock belongs to the entry, it is dropped together with
/// the entry when the store expires or evicts it.
///
/// A miss costs two store writes. The empty entry is published without an
/// expiry, so it stays resident for however long the producer runs and late
/// callers still queue on its lock. The filled entry then replaces it with
/// the cache TTL, counted from the moment the value was produced.
#[derive(Debug)]
pub struct EntryLockCache<K, V, S = MemoryStore<K, Arc<Entry<V>>>> {
    store: Arc<S>,
    ttl: Duration,
    cost: u64,
    _types: PhantomData<fn(K) -> V>,
}

impl<K, V, S> EntryLockCache<K, V, S>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: EvictionStore<K, Arc<Entry<V>>>,
{
    /// Creates a cache whose entries live for `ttl` in `store`.
    pub fn new(store: Arc<S>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            cost: 1,
            _types: PhantomData,
        }
    }

    /// Sets the cost charged to the store for each entry.
    pub fn with_cost(mut self, cost: u64) -> Self {
        self.cost = cost;

        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns the entry resident for `key`, publishing an empty one if
    /// there is none.
    ///
    /// The empty entry never expires on its own. It is replaced by the filled
    /// entry, or evicted by the store.
    async fn publish_placeholder(&self, key: &K) -> Arc<Entry<V>> {
        let placeholder = Arc::new(Entry::empty());
        let resident = self
            .store
            .get_or_insert(key.clone(), placeholder.clone(), self.cost)
            .await;

        match resident {
            Some(entry) => entry,
            None => {
                // Callers racing on this key will not share the fill.
                debug!("store rejected placeholder entry");
                placeholder
            }
        }
    }
}

#[async_trait]
impl<K, V, S> LoadOrStore<K, V> for EntryLockCache<K, V, S>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: EvictionStore<K, Arc<Entry<V>>>,
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
        let entry = match self.store.get(&key).await {
            Some(entry) => entry,
            None => self.publish_placeholder(&key).await,
        };
        if let Some(value) = entry.get() {
            return Ok(value.clone());
        }

        let _guard = entry.lock().await;

        // Filled while this caller was waiting for the lock.
        if let Some(value) = entry.get() {
            return Ok(value.clone());
        }

        // On error the guard is released with the entry still empty, so the
        // next caller retries the fill.
        let value = entry.fill(produce().await?).clone();
        trace!("filled entry");

        self.store
            .set_with_ttl(key, entry.clone(), self.cost, self.ttl)
            .await;
        self.store.wait().await;

        Ok(value)
    }
}
