//! Memo Store Module
//!
//! The cache table: a HashMap of memoized results behind a read/write lock.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use crate::cache::{CacheEntry, CacheKey, CacheStats, Instant, StatsRecorder};

// == Memo Store ==
/// Table of memoized results owned by a single wrapper.
///
/// Lookups share a read lock and never mutate the table. Stores take the
/// write lock and replace the whole entry, so readers observe either the
/// previous entry or the new one. Entries are never removed; a key's entry is
/// only ever overwritten by a fresher result.
#[derive(Debug)]
pub struct MemoStore<V> {
    /// Key to memoized result
    entries: RwLock<HashMap<CacheKey, CacheEntry<V>>>,
    /// Performance statistics
    stats: StatsRecorder,
}

impl<V: Clone> MemoStore<V> {
    // == Constructor ==
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            stats: StatsRecorder::new(),
        }
    }

    // == Lookup Fresh ==
    /// Returns a clone of the stored value if it is still fresh at `now`.
    pub fn lookup_fresh(&self, key: &CacheKey, ttl: Duration, now: Instant) -> Option<V> {
        self.read()
            .get(key)
            .filter(|entry| entry.is_fresh(ttl, now))
            .map(|entry| entry.value.clone())
    }

    // == Store ==
    /// Inserts or overwrites the entry for `key`.
    pub fn store(&self, key: CacheKey, value: V, stored_at: Instant) {
        self.write().insert(key, CacheEntry::new(value, stored_at));
    }

    /// Returns a clone of the raw entry, fresh or not.
    pub fn entry(&self, key: &CacheKey) -> Option<CacheEntry<V>> {
        self.read().get(key).cloned()
    }

    // == Stats ==
    /// Returns the counters recorded by callers of this store.
    pub fn recorder(&self) -> &StatsRecorder {
        &self.stats
    }

    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.len())
    }

    // == Length ==
    /// Returns the current number of entries, expired ones included.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A panic can only interrupt a plain HashMap insert here, which leaves
    // the map consistent, so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<CacheKey, CacheEntry<V>>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<CacheKey, CacheEntry<V>>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl<V: Clone> Default for MemoStore<V> {
    fn default() -> Self {
        Self::new()
    }
}
