//! Cache-aside read path for the product list.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{CacheBackend, EntryOptions};
use crate::catalog::InFlight;
use crate::config::Config;
use crate::db::ProductRepository;
use crate::error::{CatalogError, Result};
use crate::models::{decode_products, encode_products, Product};

// == Failure Policy ==
/// What the catalog does when the cache backend itself fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheFailurePolicy {
    /// Return the cache error to the caller
    Propagate,
    /// Log it, then serve from the store as if the cache were empty
    FallbackToStore,
}

impl FromStr for CacheFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "propagate" => Ok(Self::Propagate),
            "fallback" | "fallback_to_store" => Ok(Self::FallbackToStore),
            other => Err(format!("unknown cache failure policy: {other}")),
        }
    }
}

// == Catalog Options ==
#[derive(Debug, Clone)]
pub struct CatalogOptions {
    /// Key the full product list is cached under
    pub cache_key: String,
    /// Expiration attached to every cache write
    pub entry_options: EntryOptions,
    pub failure_policy: CacheFailurePolicy,
    /// Share one store load between concurrent misses
    pub coalesce_loads: bool,
}

impl CatalogOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cache_key: config.cache_key.clone(),
            entry_options: EntryOptions::new()
                .with_absolute_expiration(config.absolute_expiration())
                .with_sliding_expiration(config.sliding_expiration()),
            failure_policy: config.cache_failure_policy,
            coalesce_loads: config.coalesce_loads,
        }
    }
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            cache_key: "GET_ALL_PRODUCTS".to_string(),
            entry_options: EntryOptions::new()
                .with_absolute_expiration(Duration::from_secs(120))
                .with_sliding_expiration(Duration::from_secs(60)),
            failure_policy: CacheFailurePolicy::FallbackToStore,
            coalesce_loads: true,
        }
    }
}

// == Catalog Stats ==
#[derive(Debug, Default)]
struct CatalogStats {
    store_loads: AtomicU64,
    coalesced_waits: AtomicU64,
    cache_fallbacks: AtomicU64,
}

/// Point-in-time copy of the catalog counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStatsSnapshot {
    pub store_loads: u64,
    pub coalesced_waits: u64,
    pub cache_fallbacks: u64,
}

impl CatalogStats {
    fn snapshot(&self) -> CatalogStatsSnapshot {
        CatalogStatsSnapshot {
            store_loads: self.store_loads.load(Ordering::Relaxed),
            coalesced_waits: self.coalesced_waits.load(Ordering::Relaxed),
            cache_fallbacks: self.cache_fallbacks.load(Ordering::Relaxed),
        }
    }
}

// == Product Catalog ==
/// Serves the product list, preferring the cached copy.
///
/// Cheap to clone; clones share the cache, store, counters and in-flight
/// loads.
#[derive(Clone)]
pub struct ProductCatalog {
    inner: Arc<CatalogInner>,
}

struct CatalogInner {
    cache: Arc<dyn CacheBackend>,
    repository: Arc<dyn ProductRepository>,
    options: CatalogOptions,
    in_flight: InFlight<Arc<Vec<Product>>>,
    stats: CatalogStats,
}

impl fmt::Debug for ProductCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProductCatalog")
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}

impl ProductCatalog {
    pub fn new(
        cache: Arc<dyn CacheBackend>,
        repository: Arc<dyn ProductRepository>,
        options: CatalogOptions,
    ) -> Self {
        Self {
            inner: Arc::new(CatalogInner {
                cache,
                repository,
                options,
                in_flight: InFlight::new(),
                stats: CatalogStats::default(),
            }),
        }
    }

    pub fn cache_key(&self) -> &str {
        &self.inner.options.cache_key
    }

    pub fn stats(&self) -> CatalogStatsSnapshot {
        self.inner.stats.snapshot()
    }

    // == Get All ==
    /// Returns every product.
    ///
    /// Hit: decode the cached bytes. Miss: load from the store, write the
    /// encoded list back with the configured expiration, return the load.
    pub async fn get_all(&self) -> Result<Vec<Product>> {
        let key = self.cache_key();

        if let Some(products) = self.inner.read_cached(key).await? {
            debug!(key, count = products.len(), "catalog cache hit");
            return Ok(products);
        }
        debug!(key, "catalog cache miss");

        if !self.inner.options.coalesce_loads {
            return self.inner.populate(key).await.map(into_owned);
        }

        let inner = Arc::clone(&self.inner);
        let owned_key = key.to_string();
        let (result, joined) = self
            .inner
            .in_flight
            .run(key, move || async move {
                // Another flight may have filled the cache since our miss.
                if let Some(products) = inner.recheck_cached(&owned_key).await? {
                    return Ok(Arc::new(products));
                }
                inner.populate(&owned_key).await
            })
            .await;

        if joined {
            self.inner.stats.coalesced_waits.fetch_add(1, Ordering::Relaxed);
            debug!(key, "joined in-flight catalog load");
        }
        result.map(into_owned)
    }
}

impl CatalogInner {
    /// Reads and decodes the cached list. `Ok(None)` on a miss.
    async fn read_cached(&self, key: &str) -> Result<Option<Vec<Product>>> {
        match self.cache.get(key).await {
            Ok(Some(bytes)) => decode_products(&bytes).map(Some),
            Ok(None) => Ok(None),
            Err(err) => {
                self.absorb_cache_failure(err, "read")?;
                Ok(None)
            }
        }
    }

    /// Second look at the cache before a coalesced load.
    ///
    /// Uses `peek` so the request's miss, already counted by
    /// [`read_cached`](Self::read_cached), is not counted again. A failing
    /// cache was already handled by that first read, so errors here fall
    /// through to the store.
    async fn recheck_cached(&self, key: &str) -> Result<Option<Vec<Product>>> {
        match self.cache.peek(key).await {
            Ok(Some(bytes)) => decode_products(&bytes).map(Some),
            Ok(None) => Ok(None),
            Err(err) => {
                debug!(key, "cache recheck failed: {}", err);
                Ok(None)
            }
        }
    }

    /// Loads from the store and writes the result to the cache.
    async fn populate(&self, key: &str) -> Result<Arc<Vec<Product>>> {
        let products = self.repository.load_all().await?;
        self.stats.store_loads.fetch_add(1, Ordering::Relaxed);
        info!(key, count = products.len(), "loaded products from store");

        let bytes = encode_products(&products)?;
        match self
            .cache
            .set(key, bytes, self.options.entry_options)
            .await
        {
            Ok(()) => debug!(key, "catalog cache populated"),
            Err(err) => self.absorb_cache_failure(err, "write")?,
        }

        Ok(Arc::new(products))
    }

    /// Applies the failure policy to a cache error.
    ///
    /// Returns the error when it must reach the caller.
    fn absorb_cache_failure(&self, err: CatalogError, op: &str) -> Result<()> {
        if err.is_cache_failure() && self.options.failure_policy == CacheFailurePolicy::FallbackToStore
        {
            warn!("cache {} failed, serving from store: {}", op, err);
            self.stats.cache_fallbacks.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }
        Err(err)
    }
}

fn into_owned(products: Arc<Vec<Product>>) -> Vec<Product> {
    Arc::try_unwrap(products).unwrap_or_else(|shared| (*shared).clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{InMemoryCache, ManualClock};
    use crate::models::{seed_products, SEED_COUNT};
    use async_trait::async_trait;
    use futures::future::join_all;
    use std::sync::atomic::AtomicUsize;

    // == Test Doubles ==

    /// Repository that counts calls and can be slowed down or broken.
    struct CountingRepository {
        products: Vec<Product>,
        loads: AtomicUsize,
        delay: Option<Duration>,
        fail: bool,
    }

    impl CountingRepository {
        fn seeded() -> Self {
            Self {
                products: seed_products(SEED_COUNT),
                loads: AtomicUsize::new(0),
                delay: None,
                fail: false,
            }
        }

        fn small() -> Self {
            Self {
                products: seed_products(3),
                ..Self::seeded()
            }
        }

        fn loads(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProductRepository for CountingRepository {
        async fn load_all(&self) -> Result<Vec<Product>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(CatalogError::StorageUnavailable("connection refused".into()));
            }
            Ok(self.products.clone())
        }
    }

    /// Cache whose every call fails.
    struct BrokenCache;

    #[async_trait]
    impl CacheBackend for BrokenCache {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Err(CatalogError::CacheUnavailable("no route to cache".into()))
        }

        async fn peek(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Err(CatalogError::CacheUnavailable("no route to cache".into()))
        }

        async fn set(&self, _key: &str, _value: Vec<u8>, _options: EntryOptions) -> Result<()> {
            Err(CatalogError::CacheUnavailable("no route to cache".into()))
        }

        async fn remove(&self, _key: &str) -> Result<bool> {
            Err(CatalogError::CacheUnavailable("no route to cache".into()))
        }
    }

    struct Harness {
        catalog: ProductCatalog,
        cache: InMemoryCache,
        repository: Arc<CountingRepository>,
        clock: Arc<ManualClock>,
    }

    fn harness(repository: CountingRepository, options: CatalogOptions) -> Harness {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let cache = InMemoryCache::with_clock(100, clock.clone());
        let repository = Arc::new(repository);
        let catalog = ProductCatalog::new(
            Arc::new(cache.clone()),
            repository.clone(),
            options,
        );
        Harness {
            catalog,
            cache,
            repository,
            clock,
        }
    }

    // == Read Path ==

    #[tokio::test]
    async fn test_miss_loads_store_and_populates_cache() {
        let h = harness(CountingRepository::seeded(), CatalogOptions::default());

        let products = h.catalog.get_all().await.unwrap();

        assert_eq!(products.len(), 10_000);
        assert_eq!(products, seed_products(SEED_COUNT));
        assert_eq!(h.repository.loads(), 1);

        let cached = h.cache.get("GET_ALL_PRODUCTS").await.unwrap().unwrap();
        assert!(!cached.is_empty());
    }

    #[tokio::test]
    async fn test_hit_skips_store() {
        let h = harness(CountingRepository::seeded(), CatalogOptions::default());

        let first = h.catalog.get_all().await.unwrap();
        let second = h.catalog.get_all().await.unwrap();

        assert_eq!(h.repository.loads(), 1);
        assert_eq!(first, second);
        assert_eq!(
            encode_products(&second).unwrap(),
            encode_products(&h.repository.products).unwrap()
        );
        assert_eq!(h.catalog.stats().store_loads, 1);
    }

    #[tokio::test]
    async fn test_each_request_counts_one_cache_lookup() {
        let h = harness(CountingRepository::small(), CatalogOptions::default());

        h.catalog.get_all().await.unwrap();
        h.catalog.get_all().await.unwrap();

        let stats = h.cache.stats().await;
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[tokio::test]
    async fn test_cache_key_is_configurable() {
        let options = CatalogOptions {
            cache_key: "catalog:v2".to_string(),
            ..CatalogOptions::default()
        };
        let h = harness(CountingRepository::small(), options);

        h.catalog.get_all().await.unwrap();

        assert!(h.cache.get("catalog:v2").await.unwrap().is_some());
        assert!(h.cache.get("GET_ALL_PRODUCTS").await.unwrap().is_none());
    }

    // == Expiration ==

    #[tokio::test]
    async fn test_idle_entry_expires_after_sliding_window() {
        let h = harness(CountingRepository::small(), CatalogOptions::default());

        h.catalog.get_all().await.unwrap();
        h.clock.advance(Duration::from_secs(59));
        h.catalog.get_all().await.unwrap();
        assert_eq!(h.repository.loads(), 1);

        h.clock.advance(Duration::from_secs(61));
        h.catalog.get_all().await.unwrap();
        assert_eq!(h.repository.loads(), 2);
    }

    #[tokio::test]
    async fn test_frequent_access_cannot_outlive_absolute_ceiling() {
        let h = harness(CountingRepository::small(), CatalogOptions::default());

        h.catalog.get_all().await.unwrap();
        for _ in 0..23 {
            h.clock.advance(Duration::from_secs(5));
            h.catalog.get_all().await.unwrap();
        }
        assert_eq!(h.repository.loads(), 1);

        // 120 seconds after the write
        h.clock.advance(Duration::from_secs(5));
        h.catalog.get_all().await.unwrap();
        assert_eq!(h.repository.loads(), 2);
    }

    // == Coalescing ==

    #[tokio::test]
    async fn test_concurrent_misses_share_one_load() {
        let repository = CountingRepository {
            delay: Some(Duration::from_millis(50)),
            ..CountingRepository::small()
        };
        let h = harness(repository, CatalogOptions::default());

        let results = join_all((0..8).map(|_| h.catalog.get_all())).await;

        assert!(results.iter().all(|r| r.as_ref().map(Vec::len) == Ok(3)));
        assert_eq!(h.repository.loads(), 1);
        let stats = h.catalog.stats();
        assert_eq!(stats.store_loads, 1);
        assert_eq!(stats.coalesced_waits, 7);
    }

    #[tokio::test]
    async fn test_uncoalesced_misses_each_hit_the_store() {
        let repository = CountingRepository {
            delay: Some(Duration::from_millis(50)),
            ..CountingRepository::small()
        };
        let options = CatalogOptions {
            coalesce_loads: false,
            ..CatalogOptions::default()
        };
        let h = harness(repository, options);

        let results = join_all((0..4).map(|_| h.catalog.get_all())).await;

        assert!(results.iter().all(Result::is_ok));
        assert_eq!(h.repository.loads(), 4);
    }

    // == Failures ==

    #[tokio::test]
    async fn test_broken_cache_falls_back_to_store() {
        let repository = Arc::new(CountingRepository::small());
        let catalog = ProductCatalog::new(
            Arc::new(BrokenCache),
            repository.clone(),
            CatalogOptions::default(),
        );

        let products = tokio_test::assert_ok!(catalog.get_all().await);

        assert_eq!(products.len(), 3);
        assert_eq!(repository.loads(), 1);
        // Failed read, then failed write
        assert_eq!(catalog.stats().cache_fallbacks, 2);
    }

    #[tokio::test]
    async fn test_broken_cache_propagates_when_configured() {
        let repository = Arc::new(CountingRepository::small());
        let options = CatalogOptions {
            failure_policy: CacheFailurePolicy::Propagate,
            ..CatalogOptions::default()
        };
        let catalog = ProductCatalog::new(Arc::new(BrokenCache), repository.clone(), options);

        let err = tokio_test::assert_err!(catalog.get_all().await);

        assert!(matches!(err, CatalogError::CacheUnavailable(_)));
        assert_eq!(repository.loads(), 0);
    }

    #[tokio::test]
    async fn test_malformed_cached_bytes_fail_loudly() {
        let h = harness(CountingRepository::small(), CatalogOptions::default());
        h.cache
            .set("GET_ALL_PRODUCTS", b"[{\"id\":".to_vec(), EntryOptions::new())
            .await
            .unwrap();

        let err = h.catalog.get_all().await.unwrap_err();

        assert!(matches!(err, CatalogError::Serialization(_)));
        assert_eq!(h.repository.loads(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_propagates_and_leaves_cache_empty() {
        let repository = CountingRepository {
            fail: true,
            ..CountingRepository::small()
        };
        let h = harness(repository, CatalogOptions::default());

        let err = h.catalog.get_all().await.unwrap_err();

        assert!(matches!(err, CatalogError::StorageUnavailable(_)));
        assert!(h.cache.get("GET_ALL_PRODUCTS").await.unwrap().is_none());
        assert_eq!(h.catalog.stats().store_loads, 0);
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!(
            "Propagate".parse::<CacheFailurePolicy>(),
            Ok(CacheFailurePolicy::Propagate)
        );
        assert_eq!(
            "fallback".parse::<CacheFailurePolicy>(),
            Ok(CacheFailurePolicy::FallbackToStore)
        );
        assert!("retry".parse::<CacheFailurePolicy>().is_err());
    }
}
