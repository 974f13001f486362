//! Product Catalog - cache-aside product list service
//!
//! Serves the product list over HTTP from an in-memory cache with absolute
//! and sliding expiration, falling back to SQLite on a miss.

pub mod api;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use catalog::ProductCatalog;
pub use config::Config;
pub use error::CatalogError;
pub use tasks::spawn_cleanup_task;
