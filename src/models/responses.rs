//! Response DTOs for the catalog API
//!
//! Defines the structure of outgoing HTTP response bodies other than the
//! product list itself.

use serde::Serialize;

use crate::cache::CacheStats;
use crate::catalog::CatalogStatsSnapshot;

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of capacity evictions
    pub evictions: u64,
    /// Number of entries dropped on expiration
    pub expirations: u64,
    /// Current number of entries in cache
    pub total_entries: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    /// Loads that reached the product store
    pub store_loads: u64,
    /// Requests that joined a load already in flight
    pub coalesced_waits: u64,
    /// Requests served from the store because the cache failed
    pub cache_fallbacks: u64,
}

impl StatsResponse {
    pub fn new(cache: &CacheStats, catalog: &CatalogStatsSnapshot) -> Self {
        Self {
            hits: cache.hits,
            misses: cache.misses,
            evictions: cache.evictions,
            expirations: cache.expirations,
            total_entries: cache.total_entries,
            hit_rate: cache.hit_rate(),
            store_loads: catalog.store_loads,
            coalesced_waits: catalog.coalesced_waits,
            cache_fallbacks: catalog.cache_fallbacks,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
