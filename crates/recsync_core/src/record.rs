//! Local and remote record representations.

use crate::types::{RecordId, Scope, SyncStatus, Timestamp};
use serde::{Deserialize, Serialize};

/// Opaque business payload. The engine never interprets its fields.
pub type Payload = serde_json::Value;

/// A record as held by the local store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Stable, client-authoritative identifier.
    pub id: RecordId,
    /// Partition the record belongs to.
    pub scope: Scope,
    /// Business fields.
    pub payload: Payload,
    /// Last modification time, set by whichever side mutated the record.
    pub updated_at: Timestamp,
    /// Synchronization status.
    pub sync_status: SyncStatus,
    /// When the local copy last completed a successful reconciliation.
    ///
    /// Diagnostics only, never consulted by conflict resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_sync_timestamp: Option<Timestamp>,
}

impl Record {
    /// Creates a record authored locally, not yet known to the remote store.
    pub fn new_local(scope: Scope, id: RecordId, payload: Payload, now: Timestamp) -> Self {
        Self {
            id,
            scope,
            payload,
            updated_at: now,
            sync_status: SyncStatus::PendingCreate,
            local_sync_timestamp: None,
        }
    }

    /// Creates a local copy of a record introduced by another client.
    pub fn from_remote(remote: &RemoteRecord, now: Timestamp) -> Self {
        Self {
            id: remote.id.clone(),
            scope: remote.scope.clone(),
            payload: remote.payload.clone(),
            updated_at: remote.updated_at,
            sync_status: SyncStatus::Synced,
            local_sync_timestamp: Some(now),
        }
    }

    /// Applies a local business edit.
    ///
    /// A synced record becomes `PENDING_UPDATE`. A record that was never
    /// acknowledged remotely stays `PENDING_CREATE`, since it still has no
    /// remote counterpart to update.
    pub fn edit(&mut self, payload: Payload, now: Timestamp) {
        self.payload = payload;
        self.updated_at = now;
        if self.sync_status != SyncStatus::PendingCreate {
            self.sync_status = SyncStatus::PendingUpdate;
        }
    }

    /// Overwrites business fields with the remote copy (server wins).
    ///
    /// Keeps the record `SYNCED` and stamps the reconciliation time.
    pub fn apply_remote(&mut self, remote: &RemoteRecord, now: Timestamp) {
        self.payload = remote.payload.clone();
        self.updated_at = remote.updated_at;
        self.sync_status = SyncStatus::Synced;
        self.local_sync_timestamp = Some(now);
    }

    /// Returns true if the record carries local changes not yet uploaded.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.sync_status.is_pending()
    }

    /// Returns true if `other` carries the same edit of this record.
    #[must_use]
    pub fn is_same_version(&self, other: &Record) -> bool {
        self.updated_at == other.updated_at && self.payload == other.payload
    }

    /// Returns true if business fields and modification time equal the
    /// remote copy.
    #[must_use]
    pub fn matches_remote(&self, remote: &RemoteRecord) -> bool {
        self.payload == remote.payload && self.updated_at == remote.updated_at
    }
}

/// A record as held by the authoritative remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Identifier, echoed from the client on create.
    pub id: RecordId,
    /// Partition the record belongs to.
    pub scope: Scope,
    /// Business fields.
    pub payload: Payload,
    /// Last modification time as recorded by the remote store.
    pub updated_at: Timestamp,
}

impl RemoteRecord {
    /// Creates a remote record.
    pub fn new(scope: Scope, id: RecordId, payload: Payload, updated_at: Timestamp) -> Self {
        Self {
            id,
            scope,
            payload,
            updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn local() -> Record {
        Record::new_local(
            Scope::from("s"),
            RecordId::from("a"),
            json!({"name": "hive"}),
            Timestamp::from_millis(10),
        )
    }

    #[test]
    fn new_local_is_pending_create() {
        let record = local();
        assert_eq!(record.sync_status, SyncStatus::PendingCreate);
        assert!(record.is_pending());
        assert!(record.local_sync_timestamp.is_none());
    }

    #[test]
    fn edit_keeps_pending_create() {
        let mut record = local();
        record.edit(json!({"name": "hive 2"}), Timestamp::from_millis(20));
        assert_eq!(record.sync_status, SyncStatus::PendingCreate);
        assert_eq!(record.updated_at, Timestamp::from_millis(20));
    }

    #[test]
    fn edit_flips_synced_to_pending_update() {
        let mut record = local();
        record.sync_status = SyncStatus::Synced;
        record.edit(json!({"name": "hive 2"}), Timestamp::from_millis(20));
        assert_eq!(record.sync_status, SyncStatus::PendingUpdate);
    }

    #[test]
    fn apply_remote_overwrites_fields() {
        let mut record = local();
        record.sync_status = SyncStatus::Synced;
        let remote = RemoteRecord::new(
            Scope::from("s"),
            RecordId::from("a"),
            json!({"name": "server"}),
            Timestamp::from_millis(50),
        );

        record.apply_remote(&remote, Timestamp::from_millis(60));

        assert_eq!(record.payload, json!({"name": "server"}));
        assert_eq!(record.updated_at, Timestamp::from_millis(50));
        assert_eq!(record.local_sync_timestamp, Some(Timestamp::from_millis(60)));
        assert!(record.matches_remote(&remote));
    }

    #[test]
    fn record_json_shape() {
        let json = serde_json::to_value(local()).unwrap();
        assert_eq!(json["sync_status"], "PENDING_CREATE");
        assert_eq!(json["updated_at"], 10);
        assert!(json.get("local_sync_timestamp").is_none());
    }
}
