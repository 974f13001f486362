//! API Handlers
//!
//! HTTP request handlers for each catalog endpoint.

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::cache::InMemoryCache;
use crate::catalog::{CatalogOptions, ProductCatalog};
use crate::config::Config;
use crate::db::SqliteProductStore;
use crate::error::Result;
use crate::models::{HealthResponse, Product, StatsResponse};

/// Application state shared across all handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Cache-aside orchestrator
    pub catalog: ProductCatalog,
    /// In-process cache the catalog writes to, kept for stats and cleanup
    pub cache: InMemoryCache,
}

impl AppState {
    pub fn new(catalog: ProductCatalog, cache: InMemoryCache) -> Self {
        Self { catalog, cache }
    }

    /// Opens the product store and builds the cache and catalog from
    /// configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = match &config.database_path {
            Some(path) => SqliteProductStore::open(path)?,
            None => SqliteProductStore::open_in_memory()?,
        };
        let cache = InMemoryCache::new(config.max_entries);
        let catalog = ProductCatalog::new(
            Arc::new(cache.clone()),
            Arc::new(store),
            CatalogOptions::from_config(config),
        );
        Ok(Self::new(catalog, cache))
    }
}

/// Handler for GET /api/product
///
/// Returns every product, served from cache when possible.
pub async fn list_products_handler(State(state): State<AppState>) -> Result<Json<Vec<Product>>> {
    let products = state.catalog.get_all().await?;
    Ok(Json(products))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let cache = state.cache.stats().await;
    let catalog = state.catalog.stats();

    Json(StatsResponse::new(&cache, &catalog))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
