//! Database Module
//!
//! Read access to the persisted product list.

mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Product;

pub use sqlite::SqliteProductStore;

/// Source of truth for the product list.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Every persisted product, in storage order. No filtering or paging.
    async fn load_all(&self) -> Result<Vec<Product>>;
}
