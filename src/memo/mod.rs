//! Memo Module
//!
//! The memoizing wrappers callers interact with.
//!
//! # Wrappers
//! - `Memoized`: async operations, callers wait on `tokio::sync::Mutex` gates
//! - `BlockingMemoized`: synchronous operations, callers block on `std::sync::Mutex` gates

mod blocking;
mod wrapper;

pub use blocking::BlockingMemoized;
pub use wrapper::Memoized;
