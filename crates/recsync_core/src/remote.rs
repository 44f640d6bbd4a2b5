//! Remote store contract.

use crate::error::RemoteResult;
use crate::record::{Payload, RemoteRecord};
use crate::types::{RecordId, Scope};
use async_trait::async_trait;

/// The network-accessible authoritative collection.
///
/// This trait abstracts the transport, allowing for different implementations
/// (HTTP, gRPC, in-memory for testing, etc.). Every call may fail with a
/// retryable or non-retryable [`crate::RemoteError`].
///
/// # Invariants
///
/// - `create` accepts the client-generated id and echoes it back
/// - `create` is idempotent with respect to that id: repeating it must not
///   produce a second logical record
/// - `list` returns the full current remote set for the scope at the time
///   of the call (pagination is the implementation's concern)
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Lists every remote record of `scope`.
    async fn list(&self, scope: &Scope) -> RemoteResult<Vec<RemoteRecord>>;

    /// Creates a record under the client-generated `id`.
    async fn create(
        &self,
        scope: &Scope,
        id: &RecordId,
        payload: &Payload,
    ) -> RemoteResult<RemoteRecord>;

    /// Replaces the business fields of an existing record.
    async fn update(
        &self,
        scope: &Scope,
        id: &RecordId,
        payload: &Payload,
    ) -> RemoteResult<RemoteRecord>;
}
