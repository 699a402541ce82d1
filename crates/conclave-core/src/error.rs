//! Error types for conclave-core

use crate::approval::ApprovalStatus;
use thiserror::Error;
use uuid::Uuid;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Conversation or approval request does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// A conversation with this id is already tracked
    #[error("conversation already exists: {0}")]
    DuplicateConversation(String),

    /// The approval request left the pending state earlier
    #[error("approval request {id} already decided ({status})")]
    AlreadyDecided {
        /// Request ID
        id: Uuid,
        /// Effective status at the time of the attempt
        status: ApprovalStatus,
    },

    /// Not a single agent produced a usable response
    #[error("no agent reachable for conversation {conversation_id}: {reason}")]
    TotalDispatchFailure {
        /// Conversation that was failed
        conversation_id: String,
        /// Summary of the per-agent failures
        reason: String,
    },

    /// The request cannot be dispatched as given
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The service no longer accepts work
    #[error("service is shutting down")]
    ShuttingDown,

    /// Invalid configuration
    #[error("invalid configuration: {field}: {message}")]
    InvalidConfig {
        /// Config field name
        field: String,
        /// Detailed message
        message: String,
    },

    /// Event log error
    #[error("replay error: {0}")]
    Replay(#[from] conclave_replay::Error),

    /// Approval or cost store error
    #[error("database error: {0}")]
    Database(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Whether retrying the same operation later can succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(_) => true,
            Self::Replay(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(Error::Database("locked".into()).is_retryable());
        assert!(Error::Replay(conclave_replay::Error::Database("gone".into())).is_retryable());
        assert!(!Error::Replay(conclave_replay::Error::NotFound("c1".into())).is_retryable());
        assert!(!Error::DuplicateConversation("c1".into()).is_retryable());
    }

    #[test]
    fn test_already_decided_message() {
        let err = Error::AlreadyDecided {
            id: Uuid::nil(),
            status: ApprovalStatus::Expired,
        };
        assert!(err.to_string().contains("expired"));
    }
}
