//! Cache Backend Module
//!
//! The async cache interface the catalog talks to, and the in-process
//! implementation over [`CacheStore`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::trace;

use crate::cache::{CacheStats, CacheStore, Clock, EntryOptions};
use crate::error::Result;

/// Byte-oriented cache used by the cache-aside read path.
///
/// `Ok(None)` is a miss. `Err` means the cache itself failed.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Reads `key` without recording a hit or miss and without extending
    /// its sliding window.
    async fn peek(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>, options: EntryOptions) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<bool>;
}

// == In-Memory Cache ==
/// Shared handle to an in-process [`CacheStore`].
#[derive(Debug, Clone)]
pub struct InMemoryCache {
    store: Arc<RwLock<CacheStore>>,
}

impl InMemoryCache {
    pub fn new(max_entries: usize) -> Self {
        Self::from_store(CacheStore::new(max_entries))
    }

    pub fn with_clock(max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self::from_store(CacheStore::with_clock(max_entries, clock))
    }

    pub fn from_store(store: CacheStore) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
        }
    }

    /// The underlying store, shared with the cleanup task.
    pub fn store(&self) -> Arc<RwLock<CacheStore>> {
        Arc::clone(&self.store)
    }

    pub async fn stats(&self) -> CacheStats {
        self.store.read().await.stats()
    }
}

#[async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        // Write lock: a hit updates access time, LRU order and stats
        let value = self.store.write().await.get(key);
        trace!(key, hit = value.is_some(), "cache read");
        Ok(value)
    }

    async fn peek(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.store.read().await.peek(key))
    }

    async fn set(&self, key: &str, value: Vec<u8>, options: EntryOptions) -> Result<()> {
        trace!(key, bytes = value.len(), "cache write");
        self.store.write().await.set(key.to_string(), value, options)
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.store.write().await.remove(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use std::time::Duration;

    #[tokio::test]
    async fn test_in_memory_cache_roundtrip() {
        let cache = InMemoryCache::new(10);

        cache
            .set("k", b"payload".to_vec(), EntryOptions::new())
            .await
            .unwrap();

        assert_eq!(cache.get("k").await.unwrap(), Some(b"payload".to_vec()));
        assert_eq!(cache.get("other").await.unwrap(), None);

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_in_memory_cache_honors_clock() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = InMemoryCache::with_clock(10, clock.clone());
        let options = EntryOptions::new().with_sliding_expiration(Duration::from_secs(1));

        cache.set("k", b"v".to_vec(), options).await.unwrap();
        clock.advance(Duration::from_secs(2));

        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_in_memory_cache_peek_leaves_stats_alone() {
        let cache = InMemoryCache::new(10);
        cache.set("k", b"v".to_vec(), EntryOptions::new()).await.unwrap();

        assert_eq!(cache.peek("k").await.unwrap(), Some(b"v".to_vec()));
        assert_eq!(cache.peek("other").await.unwrap(), None);

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }

    #[tokio::test]
    async fn test_in_memory_cache_remove() {
        let cache = InMemoryCache::new(10);
        cache.set("k", b"v".to_vec(), EntryOptions::new()).await.unwrap();

        assert!(cache.remove("k").await.unwrap());
        assert!(!cache.remove("k").await.unwrap());
    }
}
