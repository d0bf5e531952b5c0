//! Error types for the exchange

use thiserror::Error;

/// Result type for exchange operations
pub type Result<T> = std::result::Result<T, Error>;

/// Exchange errors
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid credential
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Role or ownership check failed
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Referenced entity absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// State-machine precondition violated
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Balance below the required amount
    #[error("Insufficient credits: required {required}, available {available}")]
    InsufficientFunds {
        /// Credits needed
        required: i64,
        /// Credits held
        available: i64,
    },

    /// Malformed input
    #[error("Validation error: {0}")]
    Validation(String),

    /// A concurrent writer won every retry
    #[error("Write conflict: {0}")]
    Conflict(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Snapshot serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (writer mailbox closed, etc.)
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
    /// True for store or dependency failures that must not leak to callers
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Error::Storage(_)
                | Error::Serialization(_)
                | Error::Concurrency(_)
                | Error::Config(_)
                | Error::Io(_)
        )
    }

    pub(crate) fn account_not_found(id: impl std::fmt::Display) -> Self {
        Error::NotFound(format!("User {} not found", id))
    }

    pub(crate) fn course_not_found(id: impl std::fmt::Display) -> Self {
        Error::NotFound(format!("Course {} not found", id))
    }
}
