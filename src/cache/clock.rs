//! Clock Module
//!
//! Monotonic time sources used to timestamp and age cache entries.
//!
//! Entries are aged with a monotonic clock rather than wall-clock time, so
//! adjusting the system clock can neither expire entries early nor keep them
//! alive forever.

use std::sync::Mutex;
use std::time::Duration;

pub use tokio::time::Instant;

// == Clock Trait ==
/// A monotonically non-decreasing time source.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

// == Monotonic Clock ==
/// The default clock, backed by `tokio::time::Instant`.
///
/// Inside a tokio runtime whose clock is paused (`start_paused = true`),
/// this follows the runtime's virtual time, so tests can use
/// `tokio::time::advance` to simulate elapsed TTLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

// == Manual Clock ==
/// A clock that only moves when told to.
///
/// Useful for simulating TTL expiry in synchronous code. Share it with the
/// wrapper through an `Arc` and call `advance` from the test.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
}

impl ManualClock {
    /// Creates a manual clock frozen at the current instant.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
        }
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut elapsed = self.elapsed.lock().unwrap_or_else(|e| e.into_inner());
        *elapsed += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let elapsed = *self.elapsed.lock().unwrap_or_else(|e| e.into_inner());
        self.origin + elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_is_frozen() {
        let clock = ManualClock::new();
        let a = clock.now();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(clock.now(), a);
    }

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new();
        let start = clock.now();
        clock.advance(Duration::from_secs(61));
        assert_eq!(clock.now() - start, Duration::from_secs(61));
    }

    #[test]
    fn test_monotonic_clock_never_goes_back() {
        let clock = MonotonicClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[tokio::test(start_paused = true)]
    async fn test_monotonic_clock_follows_paused_runtime() {
        let clock = MonotonicClock;
        let start = clock.now();
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(clock.now() - start >= Duration::from_secs(61));
    }
}
