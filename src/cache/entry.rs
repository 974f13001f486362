//! Cache Entry Module
//!
//! Defines individual cache entries and their expiration policy. An entry may
//! carry an absolute deadline, a sliding window, or both; whichever deadline
//! comes first wins.

use std::time::Duration;

// == Entry Options ==
/// Expiration policy attached to a cache write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryOptions {
    /// Deadline relative to the write time, never extended
    pub absolute_expiration: Option<Duration>,
    /// Idle window, restarted on every read
    pub sliding_expiration: Option<Duration>,
}

impl EntryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_absolute_expiration(mut self, after: Duration) -> Self {
        self.absolute_expiration = Some(after);
        self
    }

    pub fn with_sliding_expiration(mut self, idle: Duration) -> Self {
        self.sliding_expiration = Some(idle);
        self
    }
}

// == Cache Entry ==
/// A single cache entry with value and expiration metadata.
///
/// All timestamps are Unix milliseconds taken from the store's clock.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored bytes
    pub value: Vec<u8>,
    /// Write timestamp
    pub created_at: u64,
    /// Last read (or write) timestamp
    pub last_accessed: u64,
    /// Absolute deadline, None = no ceiling
    pub absolute_deadline: Option<u64>,
    /// Sliding window in milliseconds, None = no idle limit
    pub sliding_ms: Option<u64>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry written at `now` with the given policy.
    pub fn new(value: Vec<u8>, options: EntryOptions, now: u64) -> Self {
        Self {
            value,
            created_at: now,
            last_accessed: now,
            absolute_deadline: options
                .absolute_expiration
                .map(|d| now.saturating_add(d.as_millis() as u64)),
            sliding_ms: options.sliding_expiration.map(|d| d.as_millis() as u64),
        }
    }

    // == Expires At ==
    /// The earliest point at which the entry stops being served.
    ///
    /// None when the entry has neither an absolute nor a sliding expiration.
    pub fn expires_at(&self) -> Option<u64> {
        let sliding = self
            .sliding_ms
            .map(|window| self.last_accessed.saturating_add(window));
        match (self.absolute_deadline, sliding) {
            (Some(a), Some(s)) => Some(a.min(s)),
            (a, s) => a.or(s),
        }
    }

    // == Is Expired ==
    /// An entry is expired once `now` reaches its earliest deadline.
    pub fn is_expired(&self, now: u64) -> bool {
        match self.expires_at() {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }

    // == Touch ==
    /// Records a read at `now`, restarting the sliding window.
    ///
    /// The absolute deadline is unaffected.
    pub fn touch(&mut self, now: u64) {
        self.last_accessed = now;
    }
}
