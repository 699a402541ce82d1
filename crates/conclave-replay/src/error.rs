//! Error types for conclave-replay

use thiserror::Error;

/// Replay error type
#[derive(Debug, Error)]
pub enum Error {
    /// No log entries exist for the requested conversation
    #[error("conversation not found: {0}")]
    NotFound(String),

    /// Database error (store unreachable, query failed)
    #[error("database error: {0}")]
    Database(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A persisted value could not be interpreted
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl Error {
    /// Whether retrying the same operation later can succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
