//! Conflict detection and resolution.
//!
//! Decides how one local record is reconciled with its freshly downloaded
//! remote counterpart. The default rule is a pure function of the two
//! records:
//!
//! 1. a local record with un-uploaded edits wins (`UserWins`),
//! 2. a `SYNCED` local copy newer than the remote wins (staleness guard),
//! 3. otherwise the remote copy is authoritative (`ServerWins`).
//!
//! `Merge` is never chosen by the default rule. It is available to callers
//! with domain knowledge through a custom [`ConflictResolver`].

use crate::record::{Payload, Record, RemoteRecord};
use crate::types::{SyncStatus, Timestamp};
use std::fmt;

/// Outcome of reconciling a local record with its remote counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    /// Remote business fields overwrite the local copy.
    ServerWins,
    /// Local copy is kept untouched; it will be uploaded by a later cycle.
    UserWins,
    /// Field-level reconciliation through [`ConflictResolver::merge`].
    Merge,
}

impl Resolution {
    /// Returns the canonical upper-case name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::ServerWins => "SERVER_WINS",
            Resolution::UserWins => "USER_WINS",
            Resolution::Merge => "MERGE",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Applies the default decision rule.
#[must_use]
pub fn resolve(local: &Record, remote: &RemoteRecord) -> Resolution {
    if local.sync_status.is_pending() {
        return Resolution::UserWins;
    }
    if local.updated_at > remote.updated_at {
        return Resolution::UserWins;
    }
    Resolution::ServerWins
}

/// Field-level merge of a local record with its remote counterpart.
///
/// Remote business fields win. When both payloads are JSON objects, keys
/// present only in the local payload are kept. The result is `SYNCED`,
/// carries the later of the two `updated_at` values and is stamped with
/// `now` as its reconciliation time.
#[must_use]
pub fn merge(local: &Record, remote: &RemoteRecord, now: Timestamp) -> Record {
    Record {
        id: local.id.clone(),
        scope: local.scope.clone(),
        payload: merge_payload(&local.payload, &remote.payload),
        updated_at: local.updated_at.max(remote.updated_at),
        sync_status: SyncStatus::Synced,
        local_sync_timestamp: Some(now),
    }
}

fn merge_payload(local: &Payload, remote: &Payload) -> Payload {
    match (local, remote) {
        (Payload::Object(local_fields), Payload::Object(remote_fields)) => {
            let mut merged = remote_fields.clone();
            for (key, value) in local_fields {
                if !merged.contains_key(key) {
                    merged.insert(key.clone(), value.clone());
                }
            }
            Payload::Object(merged)
        }
        _ => remote.clone(),
    }
}

/// Pluggable conflict resolution.
///
/// The engine consults `resolve` for every downloaded record that already
/// exists locally, and calls `merge` only when `resolve` returned
/// [`Resolution::Merge`].
pub trait ConflictResolver: Send + Sync {
    /// Decides how `local` and `remote` are reconciled.
    fn resolve(&self, local: &Record, remote: &RemoteRecord) -> Resolution {
        resolve(local, remote)
    }

    /// Produces the reconciled local record for [`Resolution::Merge`].
    fn merge(&self, local: &Record, remote: &RemoteRecord, now: Timestamp) -> Record {
        merge(local, remote, now)
    }
}

/// The default rule: pending local edits win, then the staleness guard,
/// then the server.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultResolver;

impl ConflictResolver for DefaultResolver {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RecordId, Scope};
    use serde_json::json;

    fn local(status: SyncStatus, at: u64) -> Record {
        Record {
            id: RecordId::from("a"),
            scope: Scope::from("s"),
            payload: json!({"name": "local", "note": "keep"}),
            updated_at: Timestamp::from_millis(at),
            sync_status: status,
            local_sync_timestamp: None,
        }
    }

    fn remote(at: u64) -> RemoteRecord {
        RemoteRecord::new(
            Scope::from("s"),
            RecordId::from("a"),
            json!({"name": "remote", "count": 2}),
            Timestamp::from_millis(at),
        )
    }

    #[test]
    fn pending_local_always_wins() {
        assert_eq!(
            resolve(&local(SyncStatus::PendingUpdate, 1), &remote(100)),
            Resolution::UserWins
        );
        assert_eq!(
            resolve(&local(SyncStatus::PendingCreate, 1), &remote(100)),
            Resolution::UserWins
        );
    }

    #[test]
    fn newer_synced_local_wins() {
        assert_eq!(
            resolve(&local(SyncStatus::Synced, 200), &remote(100)),
            Resolution::UserWins
        );
    }

    #[test]
    fn server_wins_otherwise() {
        assert_eq!(
            resolve(&local(SyncStatus::Synced, 100), &remote(100)),
            Resolution::ServerWins
        );
        assert_eq!(
            resolve(&local(SyncStatus::Synced, 50), &remote(100)),
            Resolution::ServerWins
        );
    }

    #[test]
    fn default_rule_never_merges() {
        let resolver = DefaultResolver;
        for status in [
            SyncStatus::Synced,
            SyncStatus::PendingCreate,
            SyncStatus::PendingUpdate,
        ] {
            for (l, r) in [(1, 2), (2, 1), (3, 3)] {
                assert_ne!(
                    resolver.resolve(&local(status, l), &remote(r)),
                    Resolution::Merge
                );
            }
        }
    }

    #[test]
    fn merge_keeps_remote_fields_and_local_extras() {
        let merged = merge(
            &local(SyncStatus::PendingUpdate, 300),
            &remote(100),
            Timestamp::from_millis(400),
        );

        assert_eq!(
            merged.payload,
            json!({"name": "remote", "count": 2, "note": "keep"})
        );
        assert_eq!(merged.updated_at, Timestamp::from_millis(300));
        assert_eq!(merged.sync_status, SyncStatus::Synced);
        assert_eq!(merged.local_sync_timestamp, Some(Timestamp::from_millis(400)));
    }

    #[test]
    fn merge_of_non_objects_takes_remote() {
        let mut l = local(SyncStatus::Synced, 1);
        l.payload = json!([1, 2]);
        let merged = merge(&l, &remote(5), Timestamp::from_millis(6));
        assert_eq!(merged.payload, remote(5).payload);
        assert_eq!(merged.updated_at, Timestamp::from_millis(5));
    }

    #[test]
    fn resolution_names() {
        assert_eq!(Resolution::ServerWins.to_string(), "SERVER_WINS");
        assert_eq!(Resolution::UserWins.as_str(), "USER_WINS");
        assert_eq!(Resolution::Merge.as_str(), "MERGE");
    }
}
