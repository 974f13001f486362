//! Configuration Module
//!
//! Handles loading and managing service configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::catalog::CacheFailurePolicy;

/// Service configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// SQLite database file, None = in-memory database
    pub database_path: Option<String>,
    /// Cache key the full product list is stored under
    pub cache_key: String,
    /// Absolute expiration in seconds, measured from the cache write
    pub absolute_expiration_secs: u64,
    /// Sliding expiration in seconds, refreshed on every cache hit
    pub sliding_expiration_secs: u64,
    /// Maximum number of entries the cache can hold
    pub max_entries: usize,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
    /// What to do when the cache backend fails
    pub cache_failure_policy: CacheFailurePolicy,
    /// Share one store load between concurrent misses on the same key
    pub coalesce_loads: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `DATABASE_PATH` - SQLite file path (default: in-memory)
    /// - `CACHE_KEY` - Catalog cache key (default: GET_ALL_PRODUCTS)
    /// - `ABSOLUTE_EXPIRATION_SECS` - Absolute expiration (default: 120)
    /// - `SLIDING_EXPIRATION_SECS` - Sliding expiration (default: 60)
    /// - `MAX_ENTRIES` - Maximum cache entries (default: 1000)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 1)
    /// - `CACHE_FAILURE_POLICY` - `fallback` or `propagate` (default: fallback)
    /// - `COALESCE_LOADS` - `true` or `false` (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: parse_env("SERVER_PORT").unwrap_or(defaults.server_port),
            database_path: env::var("DATABASE_PATH").ok().filter(|p| !p.is_empty()),
            cache_key: env::var("CACHE_KEY")
                .ok()
                .filter(|k| !k.is_empty())
                .unwrap_or(defaults.cache_key),
            absolute_expiration_secs: parse_env("ABSOLUTE_EXPIRATION_SECS")
                .unwrap_or(defaults.absolute_expiration_secs),
            sliding_expiration_secs: parse_env("SLIDING_EXPIRATION_SECS")
                .unwrap_or(defaults.sliding_expiration_secs),
            max_entries: parse_env("MAX_ENTRIES").unwrap_or(defaults.max_entries),
            cleanup_interval: parse_env("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
            cache_failure_policy: parse_env("CACHE_FAILURE_POLICY")
                .unwrap_or(defaults.cache_failure_policy),
            coalesce_loads: parse_env("COALESCE_LOADS").unwrap_or(defaults.coalesce_loads),
        }
    }

    /// Absolute expiration as a Duration.
    pub fn absolute_expiration(&self) -> Duration {
        Duration::from_secs(self.absolute_expiration_secs)
    }

    /// Sliding expiration as a Duration.
    pub fn sliding_expiration(&self) -> Duration {
        Duration::from_secs(self.sliding_expiration_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            database_path: None,
            cache_key: "GET_ALL_PRODUCTS".to_string(),
            absolute_expiration_secs: 120,
            sliding_expiration_secs: 60,
            max_entries: 1000,
            cleanup_interval: 1,
            cache_failure_policy: CacheFailurePolicy::FallbackToStore,
            coalesce_loads: true,
        }
    }
}

/// Reads and parses an environment variable, None when unset or unparsable.
fn parse_env<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
