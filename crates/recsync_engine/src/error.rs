//! Error types for the sync engine.

use recsync_core::{RecordId, RemoteError, Scope, StoreError};
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
///
/// Only [`SyncError::PhaseFatal`] and [`SyncError::Cancelled`] end a run;
/// everything else is confined to the record it happened on.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A record referenced by id no longer exists locally.
    #[error("record not found: {id}")]
    NotFound {
        /// The missing record.
        id: RecordId,
    },

    /// Remote store call failed.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Local store call failed.
    #[error("local store error: {0}")]
    Store(#[from] StoreError),

    /// The authoritative remote set could not be obtained.
    #[error("download failed: {0}")]
    PhaseFatal(String),

    /// Sync was cancelled at a phase boundary.
    #[error("sync cancelled")]
    Cancelled,

    /// Another sync attempt holds the scope or record.
    #[error("sync already in flight for {what}")]
    Busy {
        /// The scope or record that is busy.
        what: String,
    },

    /// A downloaded record belongs to a different scope than requested.
    #[error("record {id} belongs to scope {actual}, expected {expected}")]
    ScopeMismatch {
        /// The offending record.
        id: RecordId,
        /// Scope of the sync run.
        expected: Scope,
        /// Scope carried by the record.
        actual: Scope,
    },

    /// The record was edited while its upload was in flight. The remote
    /// holds the previous version and the record stays pending.
    #[error("record {id} was edited during upload and stays pending")]
    EditedDuringUpload {
        /// The edited record.
        id: RecordId,
    },

    /// Record hit the non-retryable failure cap and is no longer uploaded by
    /// sync runs.
    #[error("record {id} stalled after {attempts} rejected uploads")]
    Stalled {
        /// The stalled record.
        id: RecordId,
        /// Number of non-retryable failures observed.
        attempts: u32,
    },
}

impl SyncError {
    /// Creates a busy error for a scope or record.
    pub fn busy(what: impl std::fmt::Display) -> Self {
        Self::Busy {
            what: what.to_string(),
        }
    }

    /// Returns true if repeating the operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Remote(e) => e.is_retryable(),
            SyncError::PhaseFatal(_)
            | SyncError::Busy { .. }
            | SyncError::Cancelled
            | SyncError::EditedDuringUpload { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::Remote(RemoteError::Timeout).is_retryable());
        assert!(SyncError::Remote(RemoteError::unavailable("offline")).is_retryable());
        assert!(!SyncError::Remote(RemoteError::rejected("bad")).is_retryable());
        assert!(SyncError::busy("scope farm").is_retryable());
        assert!(SyncError::EditedDuringUpload { id: "a".into() }.is_retryable());
        assert!(!SyncError::NotFound { id: "a".into() }.is_retryable());
        assert!(!SyncError::Stalled {
            id: "a".into(),
            attempts: 5
        }
        .is_retryable());
    }

    #[test]
    fn error_display() {
        let err = SyncError::Cancelled;
        assert_eq!(err.to_string(), "sync cancelled");

        let err = SyncError::PhaseFatal("remote unavailable: offline".into());
        assert_eq!(err.to_string(), "download failed: remote unavailable: offline");

        let err: SyncError = RemoteError::Timeout.into();
        assert!(err.to_string().contains("timed out"));
    }
}
