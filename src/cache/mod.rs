//! Cache Module
//!
//! Building blocks of the memoization layer: key canonicalization, entries,
//! the per-wrapper table, per-key recomputation gates, clocks and statistics.

mod clock;
mod entry;
mod gate;
mod key;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use clock::{Clock, Instant, ManualClock, MonotonicClock};
pub use entry::CacheEntry;
pub use gate::{GateTicket, KeyGates};
pub use key::{CacheKey, CallArgs, Keyable};
pub use stats::{CacheStats, StatsRecorder};
pub use store::MemoStore;
