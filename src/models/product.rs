//! Product entity and its cache encoding.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Number of products seeded into an empty store.
pub const SEED_COUNT: i64 = 10_000;

/// A catalog product. Flat, no relationships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: i64,
}

impl Product {
    /// The deterministic seed record for `id`.
    pub fn seeded(id: i64) -> Self {
        Self {
            id,
            name: format!("Product #{}", id),
            price: id * 1000,
        }
    }
}

/// The full seed set, ids `1..=count`.
pub fn seed_products(count: i64) -> Vec<Product> {
    (1..=count).map(Product::seeded).collect()
}

/// Encodes products as UTF-8 JSON bytes for the cache.
pub fn encode_products(products: &[Product]) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(products)?)
}

/// Decodes cached bytes back into products.
///
/// Bytes that are not UTF-8 JSON of the expected shape are a
/// serialization failure.
pub fn decode_products(bytes: &[u8]) -> Result<Vec<Product>> {
    Ok(serde_json::from_slice(bytes)?)
}
