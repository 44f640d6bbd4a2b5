//! Error types for the store contracts.

use crate::types::RecordId;
use thiserror::Error;

/// Result type for local store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by a [`crate::LocalStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// The referenced record does not exist locally.
    #[error("record not found: {id}")]
    NotFound {
        /// The missing record.
        id: RecordId,
    },

    /// Storage backend failure.
    #[error("local store error: {0}")]
    Backend(String),

    /// A stored record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error from a file-backed store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for remote store operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors raised by a [`crate::RemoteStore`].
///
/// The engine only distinguishes two classes, see [`RemoteError::is_retryable`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The remote store could not be reached.
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    /// The call did not complete within its time budget.
    #[error("remote call timed out")]
    Timeout,

    /// Transient server-side failure (5xx, 408, 429).
    #[error("server error {status}: {message}")]
    Server {
        /// Status code reported by the remote.
        status: u16,
        /// Error message.
        message: String,
    },

    /// The remote refused the request (validation, 4xx).
    #[error("rejected {status}: {message}")]
    Rejected {
        /// Status code reported by the remote.
        status: u16,
        /// Error message.
        message: String,
    },

    /// The record to update does not exist remotely.
    #[error("remote record not found: {id}")]
    NotFound {
        /// The missing record.
        id: RecordId,
    },

    /// A create response carried a different id than the one sent.
    #[error("remote assigned id {actual} to record {expected}")]
    IdMismatch {
        /// Client-generated id.
        expected: RecordId,
        /// Id echoed by the remote.
        actual: RecordId,
    },
}

impl RemoteError {
    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Creates a validation rejection.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            status: 422,
            message: message.into(),
        }
    }

    /// Classifies an HTTP-like status code.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            408 | 429 | 500..=599 => Self::Server { status, message },
            _ => Self::Rejected { status, message },
        }
    }

    /// Returns true if the same call may succeed when repeated later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RemoteError::Unavailable(_) | RemoteError::Timeout | RemoteError::Server { .. }
        )
    }
}
