//! Catalog Module
//!
//! The cache-aside orchestrator: check the cache, fall back to the product
//! store on a miss, repopulate the cache with an expiration policy.

mod flight;
mod service;

pub use flight::InFlight;
pub use service::{
    CacheFailurePolicy, CatalogOptions, CatalogStatsSnapshot, ProductCatalog,
};
