//! Configuration Module
//!
//! Holds the per-wrapper settings fixed at construction time.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{MemoError, Result};

/// Default TTL in seconds, used by `MemoConfig::default()`.
pub const DEFAULT_TTL_SECS: u64 = 300;

/// Wrapper configuration parameters.
///
/// The TTL is immutable once a wrapper has been built from this config.
/// Can be embedded in a host application's own configuration and
/// deserialized from `{ "ttl_seconds": 60, "name": "lookup" }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawMemoConfig")]
pub struct MemoConfig {
    /// Freshness window applied uniformly to every entry
    pub ttl: Duration,
    /// Optional label reported by the wrapper and attached to log events
    pub name: Option<String>,
}

impl MemoConfig {
    /// Creates a config with the given TTL and no name.
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, name: None }
    }

    /// Creates a config from a TTL expressed in (possibly fractional) seconds.
    ///
    /// # Errors
    /// Returns `MemoError::InvalidConfiguration` when `ttl_seconds` is
    /// negative, NaN, infinite, or too large to represent as a `Duration`.
    pub fn from_secs_f64(ttl_seconds: f64) -> Result<Self> {
        Ok(Self::new(ttl_from_secs(ttl_seconds)?))
    }

    /// Attaches a name to the config.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl Default for MemoConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TTL_SECS))
    }
}

// == Deserialization ==
#[derive(Deserialize)]
struct RawMemoConfig {
    ttl_seconds: f64,
    #[serde(default)]
    name: Option<String>,
}

impl TryFrom<RawMemoConfig> for MemoConfig {
    type Error = MemoError;

    fn try_from(raw: RawMemoConfig) -> Result<Self> {
        Ok(Self {
            ttl: ttl_from_secs(raw.ttl_seconds)?,
            name: raw.name,
        })
    }
}

fn ttl_from_secs(ttl_seconds: f64) -> Result<Duration> {
    if ttl_seconds.is_nan() {
        return Err(MemoError::InvalidConfiguration(
            "ttl must be a number, got NaN".to_string(),
        ));
    }
    if ttl_seconds < 0.0 {
        return Err(MemoError::InvalidConfiguration(format!(
            "ttl must be non-negative, got {}",
            ttl_seconds
        )));
    }
    Duration::try_from_secs_f64(ttl_seconds).map_err(|e| {
        MemoError::InvalidConfiguration(format!("ttl of {} seconds: {}", ttl_seconds, e))
    })
}
