//! TTL Memo - A concurrency-safe memoization layer
//!
//! Wraps an operation and caches its results per argument key for a fixed
//! time-to-live, with at most one concurrent recomputation per key.

pub mod cache;
pub mod config;
pub mod error;
pub mod memo;

pub use cache::{CacheStats, CallArgs, Keyable};
pub use config::MemoConfig;
pub use error::MemoError;
pub use memo::{BlockingMemoized, Memoized};
