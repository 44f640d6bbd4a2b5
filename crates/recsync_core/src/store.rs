//! Local store contract.

use crate::error::StoreResult;
use crate::record::Record;
use crate::types::{RecordId, Scope, SyncStatus};
use async_trait::async_trait;

/// The client's copy of records plus their per-record sync status.
///
/// # Invariants
///
/// - No network I/O happens behind this interface
/// - `get_pending` returns oldest edits first so staleness stays bounded
/// - Implementations must tolerate concurrent readers (UI observers) while
///   the engine writes
///
/// # Implementors
///
/// - [`crate::MemoryLocalStore`] - In-memory, optionally persisted as JSON
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Returns every record of `scope` whose status is not `SYNCED`, ordered
    /// by `updated_at` ascending.
    async fn get_pending(&self, scope: &Scope) -> StoreResult<Vec<Record>>;

    /// Returns every record of `scope`.
    async fn get_all(&self, scope: &Scope) -> StoreResult<Vec<Record>>;

    /// Looks up a single record.
    async fn get_by_id(&self, scope: &Scope, id: &RecordId) -> StoreResult<Option<Record>>;

    /// Inserts or replaces a record.
    async fn upsert(&self, record: Record) -> StoreResult<()>;

    /// Changes the status of an existing record.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::NotFound`] if the record does not exist.
    async fn update_status(&self, id: &RecordId, status: SyncStatus) -> StoreResult<()>;

    /// Replaces `expected` with `replacement` unless a business edit landed
    /// since `expected` was read.
    ///
    /// Returns false and writes nothing if the record is gone or is no
    /// longer the same version as `expected`. The default implementation
    /// reads then writes; stores able to compare and write atomically
    /// should override it.
    async fn replace_if_unchanged(
        &self,
        expected: &Record,
        replacement: Record,
    ) -> StoreResult<bool> {
        match self.get_by_id(&expected.scope, &expected.id).await? {
            Some(current) if current.is_same_version(expected) => {
                self.upsert(replacement).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
