//! Error types for the store layer.

use std::time::Duration;

/// Errors that can occur while talking to the shared store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached or dropped the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A single store call did not complete within the command timeout.
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    /// The store answered, but not with the shape we asked for
    /// (e.g. a key holding a hash where a set was expected).
    #[error("unexpected store value: {0}")]
    UnexpectedType(String),
}

impl StoreError {
    /// Returns `true` if repeating the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(StoreError::Unavailable("down".into()).is_transient());
        assert!(StoreError::Timeout(Duration::from_millis(5)).is_transient());
        assert!(!StoreError::UnexpectedType("WRONGTYPE".into()).is_transient());
    }

    #[test]
    fn test_display() {
        let err = StoreError::Unavailable("connection refused".into());
        assert_eq!(err.to_string(), "store unavailable: connection refused");
    }
}
