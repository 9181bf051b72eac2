//! Time-bounded cache for market data

use cached::{Cached, TimedCache};
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Thread-safe TTL cache shared by clones
pub struct DataCache<K, V> {
    inner: Arc<RwLock<TimedCache<K, V>>>,
}

impl<K, V> DataCache<K, V>
where
    K: Hash + Eq + Clone + std::fmt::Debug,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(TimedCache::with_lifespan(ttl))),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        // TimedCache evicts on read, so even lookups need the write lock
        let mut cache = self.inner.write().await;
        cache.cache_get(key).cloned()
    }

    pub async fn insert(&self, key: K, value: V) {
        let mut cache = self.inner.write().await;
        let _ = cache.cache_set(key, value);
    }

    /// Return the cached value or run `fetch` and cache its success
    ///
    /// Errors are not cached, so a later call retries.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key).await {
            tracing::debug!(key = ?key, "Cache hit");
            return Ok(value);
        }

        tracing::debug!(key = ?key, "Cache miss");
        let value = fetch().await?;
        self.insert(key, value.clone()).await;
        Ok(value)
    }

    pub async fn invalidate(&self, key: &K) {
        let mut cache = self.inner.write().await;
        let _ = cache.cache_remove(key);
    }

    pub async fn clear(&self) {
        self.inner.write().await.cache_clear();
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.cache_size()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<K, V> Clone for DataCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_get_or_fetch_caches_success() {
        let cache: DataCache<String, u32> = DataCache::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_fetch("AAPL".to_string(), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(42)
                })
                .await
                .unwrap();
            assert_eq!(value, 42);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache: DataCache<String, u32> = DataCache::new(Duration::from_secs(60));

        let err = cache
            .get_or_fetch("AAPL".to_string(), || async { Err::<u32, _>("offline") })
            .await;
        assert_eq!(err, Err("offline"));
        assert!(cache.is_empty().await);

        let ok = cache
            .get_or_fetch("AAPL".to_string(), || async { Ok::<_, &str>(7) })
            .await;
        assert_eq!(ok, Ok(7));
    }

    #[tokio::test]
    async fn test_clone_shares_entries() {
        let cache: DataCache<&'static str, u32> = DataCache::new(Duration::from_secs(60));
        let other = cache.clone();

        cache.insert("SPY", 1).await;
        assert_eq!(other.get(&"SPY").await, Some(1));

        other.invalidate(&"SPY").await;
        assert!(cache.get(&"SPY").await.is_none());
    }
}
