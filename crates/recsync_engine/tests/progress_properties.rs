//! Property tests for run progress and convergence.

use proptest::prelude::*;
use recsync_testkit::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn progress_is_monotonic_with_one_terminal_event(
        records in distinct_records_strategy(TEST_SCOPE, 0..12),
        remote in prop::collection::vec(remote_record_strategy(TEST_SCOPE), 0..6),
        failing in prop::collection::vec(any::<bool>(), 12),
        list_fails in any::<bool>(),
    ) {
        let h = Harness::new();
        runtime().block_on(async {
            for (record, fail) in records.iter().zip(&failing) {
                h.local.upsert(record.clone()).await.unwrap();
                if *fail {
                    h.remote.fail_next_create(record.id.clone(), RemoteError::unavailable("flaky"));
                    h.remote.fail_next_update(record.id.clone(), RemoteError::rejected("invalid"));
                }
            }
            for record in &remote {
                h.remote.insert(record.clone());
            }
            if list_fails {
                h.remote.always_fail_list(RemoteError::unavailable("down"));
            }

            let events = h.sync_events().await;

            let (last, progress) = events.split_last().unwrap();
            prop_assert!(last.is_terminal());
            prop_assert_eq!(progress.first(), Some(&SyncState::Syncing(0)));
            let mut previous = 0;
            for state in progress {
                let SyncState::Syncing(p) = state else {
                    return Err(TestCaseError::fail(format!("unexpected event {state}")));
                };
                prop_assert!(*p >= previous);
                previous = *p;
            }
            prop_assert_eq!(list_fails, matches!(last, SyncState::Error(_)));
            Ok(())
        })?;
    }

    #[test]
    fn uncontested_creates_converge(
        records in distinct_records_strategy(TEST_SCOPE, 1..10),
        failing in prop::collection::vec(any::<bool>(), 10),
    ) {
        let h = Harness::new();
        runtime().block_on(async {
            let mut expected = 0;
            for (record, fail) in records.iter().zip(&failing) {
                let mut record = record.clone();
                record.sync_status = SyncStatus::PendingCreate;
                h.local.upsert(record.clone()).await.unwrap();
                if *fail {
                    h.remote.fail_next_create(record.id.clone(), RemoteError::unavailable("flaky"));
                } else {
                    expected += 1;
                }
            }

            prop_assert_eq!(h.sync().await, SyncState::Success(expected));
            for (record, fail) in records.iter().zip(&failing) {
                let status = h.status_of(record.id.as_str());
                if *fail {
                    prop_assert_eq!(status, SyncStatus::PendingCreate);
                } else {
                    prop_assert_eq!(status, SyncStatus::Synced);
                }
            }

            // A second run has nothing left but the failed creates
            prop_assert_eq!(h.sync().await, SyncState::Success(records.len() as u64 - expected));
            prop_assert_eq!(h.engine.pending_count(&h.scope).await.unwrap(), 0);
            Ok(())
        })?;
    }
}
