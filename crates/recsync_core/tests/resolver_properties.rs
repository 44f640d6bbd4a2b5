//! Property tests for the conflict resolver.

use proptest::prelude::*;
use recsync_core::{merge, resolve, Record, RemoteRecord, Resolution, SyncStatus, Timestamp};
use serde_json::json;

fn status_strategy() -> impl Strategy<Value = SyncStatus> {
    prop_oneof![
        Just(SyncStatus::Synced),
        Just(SyncStatus::PendingCreate),
        Just(SyncStatus::PendingUpdate),
    ]
}

fn pair(status: SyncStatus, local_at: u64, remote_at: u64) -> (Record, RemoteRecord) {
    let local = Record {
        id: "r".into(),
        scope: "s".into(),
        payload: json!({"side": "local"}),
        updated_at: Timestamp::from_millis(local_at),
        sync_status: status,
        local_sync_timestamp: None,
    };
    let remote = RemoteRecord::new(
        "s".into(),
        "r".into(),
        json!({"side": "remote"}),
        Timestamp::from_millis(remote_at),
    );
    (local, remote)
}

proptest! {
    #[test]
    fn pending_records_are_never_overwritten(
        status in status_strategy(),
        local_at in 0u64..1_000,
        remote_at in 0u64..1_000,
    ) {
        let (local, remote) = pair(status, local_at, remote_at);
        let resolution = resolve(&local, &remote);

        prop_assert_ne!(resolution, Resolution::Merge);
        if status.is_pending() {
            prop_assert_eq!(resolution, Resolution::UserWins);
        } else if local_at > remote_at {
            prop_assert_eq!(resolution, Resolution::UserWins);
        } else {
            prop_assert_eq!(resolution, Resolution::ServerWins);
        }
    }

    #[test]
    fn merge_never_moves_time_backwards(
        status in status_strategy(),
        local_at in 0u64..1_000,
        remote_at in 0u64..1_000,
    ) {
        let (local, remote) = pair(status, local_at, remote_at);
        let merged = merge(&local, &remote, Timestamp::from_millis(5_000));

        prop_assert!(merged.updated_at >= local.updated_at);
        prop_assert!(merged.updated_at >= remote.updated_at);
        prop_assert_eq!(merged.sync_status, SyncStatus::Synced);
        prop_assert_eq!(merged.payload, remote.payload);
    }
}
