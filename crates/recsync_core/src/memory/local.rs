//! In-memory local store.

use super::{read_json_list, write_json_list};
use crate::clock::Clock;
use crate::error::{StoreError, StoreResult};
use crate::record::{Payload, Record};
use crate::store::LocalStore;
use crate::types::{RecordId, Scope, SyncStatus};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;

/// An in-memory [`LocalStore`].
///
/// Records are keyed by id; ids are unique across scopes. Besides the
/// engine-facing contract it exposes the business-logic entry points
/// (`insert_local`, `edit`, `delete`) that move records through their
/// lifecycle.
///
/// # Thread Safety
///
/// Reads take a shared lock, so UI observers can read while a sync run
/// writes.
///
/// # Example
///
/// ```rust
/// use recsync_core::{MemoryLocalStore, Scope, SyncStatus, SystemClock};
/// use serde_json::json;
///
/// let store = MemoryLocalStore::new();
/// let record = store.insert_local(Scope::from("farm"), json!({"hives": 3}), &SystemClock);
/// assert_eq!(record.sync_status, SyncStatus::PendingCreate);
/// assert_eq!(store.pending_count(&Scope::from("farm")), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryLocalStore {
    records: RwLock<HashMap<RecordId, Record>>,
}

impl MemoryLocalStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `records`.
    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        let records = records.into_iter().map(|r| (r.id.clone(), r)).collect();
        Self {
            records: RwLock::new(records),
        }
    }

    /// Loads a store from a JSON file. A missing file yields an empty store.
    pub fn load(path: &Path) -> StoreResult<Self> {
        let records: Vec<Record> = read_json_list(path)?;
        Ok(Self::with_records(records))
    }

    /// Writes every record to a JSON file.
    pub fn save(&self, path: &Path) -> StoreResult<()> {
        write_json_list(path, &self.snapshot())
    }

    /// Creates a record offline as `PENDING_CREATE` with a fresh client id.
    pub fn insert_local(&self, scope: Scope, payload: Payload, clock: &dyn Clock) -> Record {
        let record = Record::new_local(scope, clock.new_id(), payload, clock.now());
        self.records
            .write()
            .insert(record.id.clone(), record.clone());
        record
    }

    /// Applies a business edit to an existing record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the record does not exist.
    pub fn edit(&self, id: &RecordId, payload: Payload, clock: &dyn Clock) -> StoreResult<Record> {
        let mut records = self.records.write();
        let record = records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound { id: id.clone() })?;
        record.edit(payload, clock.now());
        Ok(record.clone())
    }

    /// Removes a record. This is the only way a record leaves the store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the record does not exist.
    pub fn delete(&self, id: &RecordId) -> StoreResult<Record> {
        self.records
            .write()
            .remove(id)
            .ok_or_else(|| StoreError::NotFound { id: id.clone() })
    }

    /// Returns the number of records of `scope` not yet synced.
    #[must_use]
    pub fn pending_count(&self, scope: &Scope) -> usize {
        self.records
            .read()
            .values()
            .filter(|r| &r.scope == scope && r.is_pending())
            .count()
    }

    /// Returns a copy of a record regardless of scope.
    #[must_use]
    pub fn get(&self, id: &RecordId) -> Option<Record> {
        self.records.read().get(id).cloned()
    }

    /// Returns every record, ordered by scope then id.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Record> {
        let mut records: Vec<Record> = self.records.read().values().cloned().collect();
        records.sort_by(|a, b| (&a.scope, &a.id).cmp(&(&b.scope, &b.id)));
        records
    }

    /// Returns the total number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn scoped(&self, scope: &Scope, pending_only: bool) -> Vec<Record> {
        let mut records: Vec<Record> = self
            .records
            .read()
            .values()
            .filter(|r| &r.scope == scope && (!pending_only || r.is_pending()))
            .cloned()
            .collect();
        records.sort_by(|a, b| (a.updated_at, &a.id).cmp(&(b.updated_at, &b.id)));
        records
    }
}

#[async_trait]
impl LocalStore for MemoryLocalStore {
    async fn get_pending(&self, scope: &Scope) -> StoreResult<Vec<Record>> {
        Ok(self.scoped(scope, true))
    }

    async fn get_all(&self, scope: &Scope) -> StoreResult<Vec<Record>> {
        Ok(self.scoped(scope, false))
    }

    async fn get_by_id(&self, scope: &Scope, id: &RecordId) -> StoreResult<Option<Record>> {
        Ok(self
            .records
            .read()
            .get(id)
            .filter(|r| &r.scope == scope)
            .cloned())
    }

    async fn upsert(&self, record: Record) -> StoreResult<()> {
        self.records.write().insert(record.id.clone(), record);
        Ok(())
    }

    async fn update_status(&self, id: &RecordId, status: SyncStatus) -> StoreResult<()> {
        let mut records = self.records.write();
        let record = records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound { id: id.clone() })?;
        record.sync_status = status;
        Ok(())
    }

    async fn replace_if_unchanged(
        &self,
        expected: &Record,
        replacement: Record,
    ) -> StoreResult<bool> {
        let mut records = self.records.write();
        match records.get(&expected.id) {
            Some(current)
                if current.scope == expected.scope && current.is_same_version(expected) =>
            {
                records.insert(replacement.id.clone(), replacement);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timestamp;
    use serde_json::json;

    fn record(id: &str, scope: &str, at: u64, status: SyncStatus) -> Record {
        Record {
            id: id.into(),
            scope: scope.into(),
            payload: json!({"id": id}),
            updated_at: Timestamp::from_millis(at),
            sync_status: status,
            local_sync_timestamp: None,
        }
    }

    #[tokio::test]
    async fn pending_is_scoped_and_oldest_first() {
        let store = MemoryLocalStore::with_records([
            record("c", "s1", 30, SyncStatus::PendingUpdate),
            record("a", "s1", 10, SyncStatus::PendingCreate),
            record("b", "s1", 20, SyncStatus::Synced),
            record("d", "s2", 5, SyncStatus::PendingCreate),
        ]);

        let pending = store.get_pending(&"s1".into()).await.unwrap();
        let ids: Vec<&str> = pending.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);

        assert_eq!(store.get_all(&"s1".into()).await.unwrap().len(), 3);
        assert_eq!(store.pending_count(&"s2".into()), 1);
    }

    #[tokio::test]
    async fn get_by_id_respects_scope() {
        let store = MemoryLocalStore::with_records([record("a", "s1", 1, SyncStatus::Synced)]);
        assert!(store
            .get_by_id(&"s1".into(), &"a".into())
            .await
            .unwrap()
            .is_some());
        assert!(store
            .get_by_id(&"s2".into(), &"a".into())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn update_status_missing_record() {
        let store = MemoryLocalStore::new();
        let result = store.update_status(&"nope".into(), SyncStatus::Synced).await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn replace_if_unchanged_refuses_edited_record() {
        let store = MemoryLocalStore::with_records([record("a", "s1", 1, SyncStatus::PendingUpdate)]);
        let read = store.get(&"a".into()).unwrap();

        let mut synced = read.clone();
        synced.sync_status = SyncStatus::Synced;
        assert!(store.replace_if_unchanged(&read, synced).await.unwrap());
        assert_eq!(store.get(&"a".into()).unwrap().sync_status, SyncStatus::Synced);

        // A business edit after the read wins over the stale replacement
        let stale = store.get(&"a".into()).unwrap();
        store
            .edit(&"a".into(), json!({"v": 3}), &crate::SystemClock)
            .unwrap();
        let mut overwrite = stale.clone();
        overwrite.payload = json!({"v": 0});
        assert!(!store.replace_if_unchanged(&stale, overwrite).await.unwrap());
        let current = store.get(&"a".into()).unwrap();
        assert_eq!(current.payload, json!({"v": 3}));
        assert_eq!(current.sync_status, SyncStatus::PendingUpdate);

        // Gone records are not resurrected
        store.delete(&"a".into()).unwrap();
        assert!(!store.replace_if_unchanged(&current, current.clone()).await.unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn edit_and_delete() {
        let store = MemoryLocalStore::with_records([record("a", "s1", 1, SyncStatus::Synced)]);
        let edited = store
            .edit(&"a".into(), json!({"v": 2}), &crate::SystemClock)
            .unwrap();
        assert_eq!(edited.sync_status, SyncStatus::PendingUpdate);

        store.delete(&"a".into()).unwrap();
        assert!(store.is_empty());
        assert!(matches!(
            store.delete(&"a".into()),
            Err(StoreError::NotFound { .. })
        ));
    }
}
