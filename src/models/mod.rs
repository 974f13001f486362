//! Domain and response models for the catalog service

pub mod product;
pub mod responses;

// Re-export commonly used types
pub use product::{decode_products, encode_products, seed_products, Product, SEED_COUNT};
pub use responses::{HealthResponse, StatsResponse};
