//! Async Memoizing Wrapper
//!
//! Wraps an async operation and caches its successful results per argument
//! key for a fixed TTL.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::cache::{CacheKey, CacheStats, Clock, Keyable, MemoStore, KeyGates, MonotonicClock};
use crate::config::MemoConfig;
use crate::error::MemoError;

// == Memoized ==
/// A memoized async operation.
///
/// `call` returns a cached result when an identical call completed less than
/// `ttl` ago, and otherwise awaits the operation and stores its result.
/// Failed calls are never cached and leave any earlier entry untouched.
///
/// Concurrent callers with the same key are serialized: one runs the
/// operation while the others wait and then reuse its result. Callers with
/// different keys never wait on each other. Dropping a pending `call` future
/// is handled like a failure: nothing is stored and the next waiter takes
/// over.
///
/// Share a wrapper across tasks with `Arc<Memoized<..>>`.
///
/// # Example
/// ```
/// use ttl_memo::Memoized;
///
/// # tokio_test::block_on(async {
/// let double = Memoized::create(|x: u64| async move { Ok::<_, anyhow::Error>(x * 2) }, 60.0)?;
/// assert_eq!(double.call(3).await?, 6);
/// assert_eq!(double.call(3).await?, 6);
/// assert_eq!(double.stats().hits, 1);
/// # Ok::<(), anyhow::Error>(())
/// # }).unwrap();
/// ```
pub struct Memoized<A, V, E, F> {
    /// The underlying operation
    operation: F,
    /// TTL and name, fixed at construction
    config: MemoConfig,
    /// Monotonic time source
    clock: Arc<dyn Clock>,
    /// Cache table exclusive to this wrapper
    store: MemoStore<V>,
    /// Per-key recomputation gates
    gates: KeyGates<Mutex<()>>,
    _marker: PhantomData<fn(A) -> Result<V, E>>,
}

impl<A, V, E, F, Fut> Memoized<A, V, E, F>
where
    A: Keyable,
    V: Clone,
    E: From<MemoError>,
    F: Fn(A) -> Fut,
    Fut: Future<Output = Result<V, E>>,
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
    /// # Errors
    /// - `MemoError::UnkeyableArguments` (converted into `E`) if `args` cannot
    ///   be keyed; the operation is not invoked.
    /// - Whatever error the operation returns, unchanged.
    pub async fn call(&self, args: A) -> Result<V, E> {
        let key = args.cache_key()?;

        if let Some(value) = self.lookup(&key) {
            self.store.recorder().record_hit();
            debug!(memo = self.label(), key = %key, "cache hit");
            return Ok(value);
        }

        let ticket = self.gates.acquire(&key);
        let _guard = ticket.gate().lock().await;

        // Another caller may have refreshed the entry while we waited
        if let Some(value) = self.lookup(&key) {
            self.store.recorder().record_coalesced();
            debug!(memo = self.label(), key = %key, "cache hit after waiting on recompute");
            return Ok(value);
        }

        self.store.recorder().record_miss();
        debug!(memo = self.label(), key = %key, "cache miss, invoking operation");

        match (self.operation)(args).await {
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

impl<A, V, E, F> Memoized<A, V, E, F>
where
    V: Clone,
{
    // == Accessors ==
    /// The freshness window applied to every entry.
    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    /// The name given in the config, if any.
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

impl<A, V, E, F> fmt::Debug for Memoized<A, V, E, F>
where
    V: Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoized")
            .field("name", &self.config.name)
            .field("ttl", &self.config.ttl)
            .field("entries", &self.len())
            .finish()
    }
}
