//! Error types for the memoization layer
//!
//! Provides the cache's own error taxonomy using thiserror. Failures raised by
//! the wrapped operation never pass through this type; they are handed back to
//! the caller untouched.

use thiserror::Error;

// == Memo Error Enum ==
/// Errors produced by the cache itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoError {
    /// The wrapper was constructed with a negative or malformed TTL
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The call arguments could not be turned into a cache key
    #[error("Unkeyable arguments: {0}")]
    UnkeyableArguments(String),
}

// == Result Type Alias ==
/// Convenience Result type for cache-level operations.
pub type Result<T> = std::result::Result<T, MemoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = MemoError::InvalidConfiguration("ttl must be non-negative".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: ttl must be non-negative"
        );

        let err = MemoError::UnkeyableArguments("key must be a string".to_string());
        assert_eq!(err.to_string(), "Unkeyable arguments: key must be a string");
    }

    #[test]
    fn test_converts_into_anyhow() {
        let err: anyhow::Error = MemoError::UnkeyableArguments("nan".to_string()).into();
        assert!(matches!(
            err.downcast_ref::<MemoError>(),
            Some(MemoError::UnkeyableArguments(_))
        ));
    }
}
