//! Blocking Memoizing Wrapper
//!
//! The synchronous counterpart of `Memoized`, for plain functions called
//! from OS threads.

use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, warn};

use crate::cache::{CacheKey, CacheStats, Clock, KeyGates, Keyable, MemoStore, MonotonicClock};
use crate::config::MemoConfig;
use crate::error::MemoError;

// == Blocking Memoized ==
/// A memoized synchronous operation.
///
/// Same caching contract as [`crate::Memoized`]: fresh hits skip the
/// operation, failures are never cached, and at most one thread recomputes
/// a given key at a time while the others block and reuse its result.
/// A panic inside the operation unwinds to its caller without storing
/// anything; threads waiting on the same key carry on normally.
///
/// # Example
/// ```
/// use ttl_memo::BlockingMemoized;
///
/// let square = BlockingMemoized::create(|x: i32| Ok::<_, anyhow::Error>(x * x), 30.0)?;
/// assert_eq!(square.call(4)?, 16);
/// assert_eq!(square.stats().misses, 1);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub struct BlockingMemoized<A, V, E, F> {
    operation: F,
    config: MemoConfig,
    clock: Arc<dyn Clock>,
    store: MemoStore<V>,
    gates: KeyGates<Mutex<()>>,
    _marker: PhantomData<fn(A) -> Result<V, E>>,
}

impl<A, V, E, F> BlockingMemoized<A, V, E, F>
where
    A: Keyable,
    V: Clone,
    E: From<MemoError>,
    F: Fn(A) -> Result<V, E>,
{
    // == Constructors ==
    /// Wraps `operation` with a TTL given in seconds.
    ///
    /// # Errors
    /// Returns `MemoError::InvalidConfiguration` if `ttl_seconds` is negative,
    /// NaN, infinite or out of range.
    pub fn create(operation: F, ttl_seconds: f64) -> Result<Self, MemoError> {
        Ok(Self::new(operation, MemoConfig::from_secs_f64(ttl_seconds)?))
    }

    /// Wraps `operation` using the monotonic system clock.
    pub fn new(operation: F, config: MemoConfig) -> Self {
        Self::with_clock(operation, config, Arc::new(MonotonicClock))
    }

    /// Wraps `operation` using the given clock.
    pub fn with_clock(operation: F, config: MemoConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            operation,
            config,
            clock,
            store: MemoStore::new(),
            gates: KeyGates::new(),
            _marker: PhantomData,
        }
    }

    // == Call ==
    /// Returns the memoized result for `args`, computing it if needed.
    ///
    /// Blocks while another thread is recomputing the same key.
    ///
    /// # Errors
    /// - `MemoError::UnkeyableArguments` (converted into `E`) if `args` cannot
    ///   be keyed; the operation is not invoked.
    /// - Whatever error the operation returns, unchanged.
    pub fn call(&self, args: A) -> Result<V, E> {
        let key = args.cache_key()?;

        if let Some(value) = self.lookup(&key) {
            self.store.recorder().record_hit();
            debug!(memo = self.label(), key = %key, "cache hit");
            return Ok(value);
        }

        let ticket = self.gates.acquire(&key);
        // A poisoned gate only means an earlier holder panicked before storing
        let _guard = ticket.gate().lock().unwrap_or_else(|e| e.into_inner());

        if let Some(value) = self.lookup(&key) {
            self.store.recorder().record_coalesced();
            debug!(memo = self.label(), key = %key, "cache hit after waiting on recompute");
            return Ok(value);
        }

        self.store.recorder().record_miss();
        debug!(memo = self.label(), key = %key, "cache miss, invoking operation");

        match (self.operation)(args) {
            Ok(value) => {
                self.store.store(key, value.clone(), self.clock.now());
                Ok(value)
            }
            Err(err) => {
                self.store.recorder().record_failure();
                warn!(memo = self.label(), key = %key, "operation failed, nothing cached");
                Err(err)
            }
        }
    }

    fn lookup(&self, key: &CacheKey) -> Option<V> {
        self.store.lookup_fresh(key, self.config.ttl, self.clock.now())
    }
}

impl<A, V, E, F> BlockingMemoized<A, V, E, F>
where
    V: Clone,
{
    // == Accessors ==
    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    pub fn name(&self) -> Option<&str> {
        self.config.name.as_deref()
    }

    /// Number of entries in the table, expired ones included.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.store.stats()
    }

    /// Number of keys with a recomputation in progress or queued.
    pub fn in_flight(&self) -> usize {
        self.gates.in_flight()
    }

    fn label(&self) -> &str {
        self.name().unwrap_or("anonymous")
    }
}

impl<A, V, E, F> fmt::Debug for BlockingMemoized<A, V, E, F>
where
    V: Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingMemoized")
            .field("name", &self.config.name)
            .field("ttl", &self.config.ttl)
            .field("entries", &self.len())
            .finish()
    }
}
