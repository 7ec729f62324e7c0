//! Cache Entry Module
//!
//! Defines the structure for individual memoized results.

use std::time::Duration;

use crate::cache::Instant;

// == Cache Entry ==
/// A memoized result together with the instant it was stored.
///
/// Entries are only ever replaced whole, so `value` and `stored_at` always
/// come from the same completed invocation.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The result of the underlying operation
    pub value: V,
    /// When the result was stored (monotonic)
    pub stored_at: Instant,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new entry stamped with `stored_at`.
    pub fn new(value: V, stored_at: Instant) -> Self {
        Self { value, stored_at }
    }

    // == Age ==
    /// Returns how long ago the entry was stored, saturating at zero.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.stored_at)
    }

    // == Is Fresh ==
    /// Checks if the entry may still be served.
    ///
    /// Boundary condition: the entry is fresh only while its age is strictly
    /// less than `ttl`. Once the full TTL has elapsed it is stale, and with a
    /// zero TTL no entry is ever fresh.
    pub fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        self.age(now) < ttl
    }
}
