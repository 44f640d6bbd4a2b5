//! CLI error type.

use recsync_core::StoreError;
use recsync_engine::SyncError;
use thiserror::Error;

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Errors reported by CLI commands.
#[derive(Error, Debug)]
pub enum CliError {
    /// The payload argument is not valid JSON.
    #[error("invalid payload: {0}")]
    InvalidPayload(serde_json::Error),

    /// No record with the given id exists in the scope.
    #[error("no record {id} in scope {scope}")]
    UnknownRecord {
        /// Requested id.
        id: String,
        /// Requested scope.
        scope: String,
    },

    /// Unknown `--format` value.
    #[error("unsupported format: {0} (expected text or json)")]
    UnsupportedFormat(String),

    /// Reading or writing a store file failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A single-record upload failed.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// The sync run ended in an error.
    #[error("sync failed: {0}")]
    RunFailed(String),

    /// Output could not be encoded.
    #[error("output error: {0}")]
    Output(#[from] serde_json::Error),

    /// The async runtime could not be started.
    #[error("runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}
