//! Test fixtures and engine helpers.
//!
//! Provides a controllable clock, record builders and a [`Harness`] that
//! wires a [`SyncEngine`] to in-memory stores.

use recsync_core::{
    Clock, ConflictResolver, MemoryLocalStore, MemoryRemoteStore, Payload, Record, RecordId,
    RemoteRecord, Scope, SyncStatus, Timestamp,
};
use recsync_engine::{RetryConfig, SyncConfig, SyncEngine, SyncReport, SyncState};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Scope used by [`Harness`].
pub const TEST_SCOPE: &str = "test";

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    /// Creates a clock reading `start` milliseconds.
    pub fn new(start: u64) -> Self {
        Self {
            millis: AtomicU64::new(start),
        }
    }

    /// Sets the current time.
    pub fn set(&self, millis: u64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    /// Moves the clock forward and returns the new time.
    pub fn advance(&self, millis: u64) -> Timestamp {
        Timestamp::from_millis(self.millis.fetch_add(millis, Ordering::SeqCst) + millis)
    }

    /// Moves the clock forward by one millisecond.
    pub fn tick(&self) -> Timestamp {
        self.advance(1)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(1_000)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.millis.load(Ordering::SeqCst))
    }
}

/// Builds a `PENDING_CREATE` record.
pub fn local_record(scope: &str, id: &str, payload: Payload, at: u64) -> Record {
    Record::new_local(
        Scope::from(scope),
        RecordId::from(id),
        payload,
        Timestamp::from_millis(at),
    )
}

/// Builds a `SYNCED` record.
pub fn synced_record(scope: &str, id: &str, payload: Payload, at: u64) -> Record {
    Record::from_remote(&remote_record(scope, id, payload, at), Timestamp::from_millis(at))
}

/// Builds a remote record.
pub fn remote_record(scope: &str, id: &str, payload: Payload, at: u64) -> RemoteRecord {
    RemoteRecord::new(
        Scope::from(scope),
        RecordId::from(id),
        payload,
        Timestamp::from_millis(at),
    )
}

/// Engine configuration suitable for tests: short timeouts, fast retries.
pub fn test_config() -> SyncConfig {
    SyncConfig::default()
        .with_request_timeout(Duration::from_secs(2))
        .with_retry(
            RetryConfig::new(3)
                .with_initial_delay(Duration::from_millis(1))
                .with_jitter(false),
        )
}

/// An engine wired to in-memory stores and a manual clock.
pub struct Harness {
    /// Shared clock of engine and remote store.
    pub clock: Arc<ManualClock>,
    /// Client-side store.
    pub local: Arc<MemoryLocalStore>,
    /// Authoritative store.
    pub remote: Arc<MemoryRemoteStore>,
    /// The engine under test.
    pub engine: Arc<SyncEngine>,
    /// Scope every helper operates on.
    pub scope: Scope,
}

impl Harness {
    /// Creates a harness with [`test_config`].
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// Creates a harness with a custom engine configuration.
    pub fn with_config(config: SyncConfig) -> Self {
        let clock = Arc::new(ManualClock::default());
        let local = Arc::new(MemoryLocalStore::new());
        let remote = Arc::new(MemoryRemoteStore::new(clock.clone()));
        let engine = Arc::new(SyncEngine::new(
            config,
            local.clone(),
            remote.clone(),
            clock.clone(),
        ));
        Self {
            clock,
            local,
            remote,
            engine,
            scope: Scope::from(TEST_SCOPE),
        }
    }

    /// Creates a harness whose engine uses `resolver`.
    pub fn with_resolver(resolver: Arc<dyn ConflictResolver>) -> Self {
        let harness = Self::new();
        harness.engine.set_conflict_resolver(resolver);
        harness
    }

    /// Adds a record created offline.
    pub async fn add_local(&self, id: &str, payload: Payload) -> Record {
        let now = self.clock.tick();
        let record = local_record(TEST_SCOPE, id, payload, now.as_millis());
        self.upsert(record.clone()).await;
        record
    }

    /// Adds a record present on both sides and in sync.
    pub async fn add_synced(&self, id: &str, payload: Payload) -> Record {
        let remote = self.add_remote(id, payload);
        let record = Record::from_remote(&remote, self.clock.now());
        self.upsert(record.clone()).await;
        record
    }

    /// Adds a record as another client would, remote side only.
    pub fn add_remote(&self, id: &str, payload: Payload) -> RemoteRecord {
        let now = self.clock.tick();
        let record = remote_record(TEST_SCOPE, id, payload, now.as_millis());
        self.remote.insert(record.clone());
        record
    }

    /// Applies a local business edit.
    pub fn edit(&self, id: &str, payload: Payload) -> Record {
        self.clock.tick();
        self.local
            .edit(&RecordId::from(id), payload, &*self.clock)
            .expect("record to edit exists")
    }

    /// Runs a sync of the test scope and returns its terminal event.
    pub async fn sync(&self) -> SyncState {
        self.engine.run_sync(self.scope.clone()).wait().await
    }

    /// Runs a sync of the test scope and returns every event.
    pub async fn sync_events(&self) -> Vec<SyncState> {
        self.engine.run_sync(self.scope.clone()).collect().await
    }

    /// Returns a local record.
    pub fn record(&self, id: &str) -> Record {
        self.local
            .get(&RecordId::from(id))
            .unwrap_or_else(|| panic!("local record {id} exists"))
    }

    /// Returns the sync status of a local record.
    pub fn status_of(&self, id: &str) -> SyncStatus {
        self.record(id).sync_status
    }

    /// Returns a remote record, if present.
    pub fn remote_record(&self, id: &str) -> Option<RemoteRecord> {
        self.remote.get(&RecordId::from(id))
    }

    /// Returns the report of the last finished run.
    pub fn report(&self) -> SyncReport {
        self.engine
            .last_report(&self.scope)
            .expect("a sync run has finished")
    }

    async fn upsert(&self, record: Record) {
        use recsync_core::LocalStore;
        self.local
            .upsert(record)
            .await
            .expect("memory store accepts writes");
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
