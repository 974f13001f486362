//! Cache Module
//!
//! In-memory byte cache with absolute and sliding expiration, LRU capacity
//! eviction, and the async [`CacheBackend`] interface the catalog uses.

mod backend;
mod clock;
mod entry;
mod lru;
mod stats;
mod store;


// Re-export public types
pub use backend::{CacheBackend, InMemoryCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{CacheEntry, EntryOptions};
pub use lru::LruTracker;
pub use stats::CacheStats;
pub use store::CacheStore;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum allowed value size in bytes
pub const MAX_VALUE_SIZE: usize = 8 * 1024 * 1024; // 8 MB
