//! Error types for the catalog service
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Catalog Error Enum ==
/// Unified error type for the catalog service.
///
/// Payloads are plain strings so the error is `Clone` and can be handed to
/// every request waiting on the same coalesced load.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// The product store could not be reached or queried
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The cache could not be reached for read or write
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    /// Cached bytes could not be decoded, or products could not be encoded
    #[error("Serialization failure: {0}")]
    Serialization(String),

    /// The cache refused an entry (key or value outside the allowed size)
    #[error("Invalid cache entry: {0}")]
    InvalidEntry(String),
}

impl CatalogError {
    /// True for failures originating in the cache backend.
    pub fn is_cache_failure(&self) -> bool {
        matches!(
            self,
            CatalogError::CacheUnavailable(_) | CatalogError::InvalidEntry(_)
        )
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::Serialization(err.to_string())
    }
}

impl From<rusqlite::Error> for CatalogError {
    fn from(err: rusqlite::Error) -> Self {
        CatalogError::StorageUnavailable(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        tracing::error!("request failed: {}", self);

        // Dependency failures are not differentiated for clients.
        let body = Json(json!({
            "error": self.to_string()
        }));

        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the catalog service.
pub type Result<T> = std::result::Result<T, CatalogError>;
