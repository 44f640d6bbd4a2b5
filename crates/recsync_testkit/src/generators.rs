//! Property-based test generators using proptest.
//!
//! Provides strategies for generating records and payloads that maintain
//! the model's invariants.

use proptest::prelude::*;
use recsync_core::{Payload, Record, RecordId, RemoteRecord, Scope, SyncStatus, Timestamp};
use serde_json::{Map, Value};

/// Strategy for generating record ids.
pub fn record_id_strategy() -> impl Strategy<Value = RecordId> {
    "[a-z][a-z0-9]{0,7}".prop_map(RecordId::from)
}

/// Strategy for generating scope names.
pub fn scope_strategy() -> impl Strategy<Value = Scope> {
    "[a-z]{1,8}".prop_map(Scope::from)
}

/// Strategy for generating sync statuses.
pub fn sync_status_strategy() -> impl Strategy<Value = SyncStatus> {
    prop_oneof![
        Just(SyncStatus::Synced),
        Just(SyncStatus::PendingCreate),
        Just(SyncStatus::PendingUpdate),
    ]
}

/// Strategy for generating timestamps.
pub fn timestamp_strategy() -> impl Strategy<Value = Timestamp> {
    (0u64..1_000_000).prop_map(Timestamp::from_millis)
}

/// Strategy for generating scalar JSON values.
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(Value::from),
        "[a-zA-Z0-9 ]{0,12}".prop_map(Value::String),
    ]
}

/// Strategy for generating flat JSON object payloads.
pub fn object_payload_strategy() -> impl Strategy<Value = Payload> {
    prop::collection::btree_map("[a-z]{1,6}", scalar_strategy(), 0..6)
        .prop_map(|fields| Value::Object(fields.into_iter().collect::<Map<String, Value>>()))
}

/// Strategy for generating payloads, mostly objects with the occasional
/// scalar.
pub fn payload_strategy() -> impl Strategy<Value = Payload> {
    prop_oneof![
        4 => object_payload_strategy(),
        1 => scalar_strategy(),
    ]
}

/// Strategy for generating local records of `scope`.
pub fn record_strategy(scope: &str) -> impl Strategy<Value = Record> {
    let scope = Scope::from(scope);
    (
        record_id_strategy(),
        payload_strategy(),
        timestamp_strategy(),
        sync_status_strategy(),
    )
        .prop_map(move |(id, payload, updated_at, sync_status)| Record {
            id,
            scope: scope.clone(),
            payload,
            updated_at,
            sync_status,
            local_sync_timestamp: None,
        })
}

/// Strategy for generating remote records of `scope`.
pub fn remote_record_strategy(scope: &str) -> impl Strategy<Value = RemoteRecord> {
    let scope = Scope::from(scope);
    (record_id_strategy(), payload_strategy(), timestamp_strategy()).prop_map(
        move |(id, payload, updated_at)| RemoteRecord::new(scope.clone(), id, payload, updated_at),
    )
}

/// Strategy for generating a local record and a remote counterpart with the
/// same id.
pub fn conflict_pair_strategy(scope: &str) -> impl Strategy<Value = (Record, RemoteRecord)> {
    (record_strategy(scope), payload_strategy(), timestamp_strategy()).prop_map(
        |(local, payload, updated_at)| {
            let remote =
                RemoteRecord::new(local.scope.clone(), local.id.clone(), payload, updated_at);
            (local, remote)
        },
    )
}

/// Strategy for generating a set of local records with distinct ids.
pub fn distinct_records_strategy(
    scope: &str,
    size: std::ops::Range<usize>,
) -> impl Strategy<Value = Vec<Record>> {
    prop::collection::vec(record_strategy(scope), size).prop_map(|records| {
        let mut seen = std::collections::HashSet::new();
        records
            .into_iter()
            .filter(|r| seen.insert(r.id.clone()))
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn records_keep_scope(record in record_strategy("farm")) {
            prop_assert_eq!(record.scope.as_str(), "farm");
        }

        #[test]
        fn conflict_pairs_share_id((local, remote) in conflict_pair_strategy("s")) {
            prop_assert_eq!(local.id, remote.id);
            prop_assert_eq!(local.scope, remote.scope);
        }

        #[test]
        fn distinct_records_have_unique_ids(records in distinct_records_strategy("s", 0..20)) {
            let ids: std::collections::HashSet<_> = records.iter().map(|r| r.id.clone()).collect();
            prop_assert_eq!(ids.len(), records.len());
        }
    }
}
