//! Error types for the points ledger

use crate::types::{Address, Points};
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
///
/// Every variant is recoverable by the caller. A failed mutation leaves the
/// ledger unchanged and emits no event.
#[derive(Error, Debug)]
pub enum Error {
    /// `spend` or `lock` exceeds the available balance (or no entry exists)
    #[error("Insufficient balance for {address}: requested {requested}, available {available}")]
    InsufficientBalance {
        /// Affected user
        address: Address,
        /// Requested amount
        requested: Points,
        /// Available balance at the time of the call
        available: Points,
    },

    /// `unlock` exceeds the locked balance (or no entry exists)
    #[error("Insufficient locked balance for {address}: requested {requested}, locked {locked}")]
    InsufficientLockedBalance {
        /// Affected user
        address: Address,
        /// Requested amount
        requested: Points,
        /// Locked balance at the time of the call
        locked: Points,
    },

    /// Arithmetic step would exceed the representable range
    #[error("Arithmetic overflow: {0}")]
    Overflow(String),

    /// Capability does not grant the requested operation
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Restored state breaks a ledger invariant
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Overflow error naming the step that overflowed
    pub(crate) fn overflow(step: impl Into<String>) -> Self {
        Error::Overflow(step.into())
    }

    /// True for the three domain errors a mutator can return
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::InsufficientBalance { .. }
                | Error::InsufficientLockedBalance { .. }
                | Error::Overflow(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Error::InsufficientBalance {
            address: Address::new("userY"),
            requested: 50,
            available: 0,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient balance for userY: requested 50, available 0"
        );
        assert!(err.is_rejection());

        let err = Error::overflow("supply + amount");
        assert!(err.to_string().contains("supply + amount"));
        assert!(!Error::Concurrency("closed".into()).is_rejection());
    }
}
