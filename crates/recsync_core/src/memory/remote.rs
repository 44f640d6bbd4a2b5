//! In-memory authoritative remote store.

use super::{read_json_list, write_json_list};
use crate::clock::Clock;
use crate::error::{RemoteError, RemoteResult, StoreResult};
use crate::record::{Payload, RemoteRecord};
use crate::remote::RemoteStore;
use crate::types::{RecordId, Scope};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Injected failures, consumed in order.
#[derive(Debug, Default)]
struct Faults {
    create_once: HashMap<RecordId, VecDeque<RemoteError>>,
    create_always: HashMap<RecordId, RemoteError>,
    update_once: HashMap<RecordId, VecDeque<RemoteError>>,
    update_always: HashMap<RecordId, RemoteError>,
    list_once: VecDeque<RemoteError>,
    list_always: Option<RemoteError>,
    /// Ids written but not yet visible to `list` (replication lag).
    hidden: HashSet<RecordId>,
    /// Versions `list` keeps serving after later writes (stale replicas).
    stale: HashMap<RecordId, RemoteRecord>,
    /// Ids whose create responses echo a different id.
    reassign: HashMap<RecordId, RecordId>,
}

impl Faults {
    fn take(
        once: &mut HashMap<RecordId, VecDeque<RemoteError>>,
        always: &HashMap<RecordId, RemoteError>,
        id: &RecordId,
    ) -> Option<RemoteError> {
        if let Some(err) = once.get_mut(id).and_then(VecDeque::pop_front) {
            return Some(err);
        }
        always.get(id).cloned()
    }
}

/// An in-memory [`RemoteStore`] with failure injection.
///
/// Behaves like an authoritative server: it stamps `updated_at` from its own
/// clock, treats `create` as idempotent on the client id, and rejects
/// updates of unknown records. Tests (and the CLI) can script failures,
/// latency and list lag.
pub struct MemoryRemoteStore {
    clock: Arc<dyn Clock>,
    records: RwLock<BTreeMap<RecordId, RemoteRecord>>,
    faults: Mutex<Faults>,
    latency: Mutex<Option<Duration>>,
    list_calls: AtomicU64,
    create_calls: AtomicU64,
    update_calls: AtomicU64,
}

impl MemoryRemoteStore {
    /// Creates an empty remote store stamping writes with `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            records: RwLock::new(BTreeMap::new()),
            faults: Mutex::new(Faults::default()),
            latency: Mutex::new(None),
            list_calls: AtomicU64::new(0),
            create_calls: AtomicU64::new(0),
            update_calls: AtomicU64::new(0),
        }
    }

    /// Creates a remote store holding `records`.
    pub fn with_records(clock: Arc<dyn Clock>, records: impl IntoIterator<Item = RemoteRecord>) -> Self {
        let store = Self::new(clock);
        {
            let mut map = store.records.write();
            for record in records {
                map.insert(record.id.clone(), record);
            }
        }
        store
    }

    /// Loads a remote store from a JSON file. A missing file yields an
    /// empty store.
    pub fn load(clock: Arc<dyn Clock>, path: &Path) -> StoreResult<Self> {
        let records: Vec<RemoteRecord> = read_json_list(path)?;
        Ok(Self::with_records(clock, records))
    }

    /// Writes every record to a JSON file.
    pub fn save(&self, path: &Path) -> StoreResult<()> {
        write_json_list(path, &self.records())
    }

    /// Writes a record directly, as another client would.
    pub fn insert(&self, record: RemoteRecord) {
        self.records.write().insert(record.id.clone(), record);
    }

    /// Returns a stored record.
    #[must_use]
    pub fn get(&self, id: &RecordId) -> Option<RemoteRecord> {
        self.records.read().get(id).cloned()
    }

    /// Returns every stored record, ordered by id.
    #[must_use]
    pub fn records(&self) -> Vec<RemoteRecord> {
        self.records.read().values().cloned().collect()
    }

    /// Returns the number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if no records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Fails the next `create` of `id` with `error`.
    pub fn fail_next_create(&self, id: impl Into<RecordId>, error: RemoteError) {
        self.faults
            .lock()
            .create_once
            .entry(id.into())
            .or_default()
            .push_back(error);
    }

    /// Fails every `create` of `id` with `error`.
    pub fn always_fail_create(&self, id: impl Into<RecordId>, error: RemoteError) {
        self.faults.lock().create_always.insert(id.into(), error);
    }

    /// Fails the next `update` of `id` with `error`.
    pub fn fail_next_update(&self, id: impl Into<RecordId>, error: RemoteError) {
        self.faults
            .lock()
            .update_once
            .entry(id.into())
            .or_default()
            .push_back(error);
    }

    /// Fails every `update` of `id` with `error`.
    pub fn always_fail_update(&self, id: impl Into<RecordId>, error: RemoteError) {
        self.faults.lock().update_always.insert(id.into(), error);
    }

    /// Fails the next `list` with `error`.
    pub fn fail_next_list(&self, error: RemoteError) {
        self.faults.lock().list_once.push_back(error);
    }

    /// Fails every `list` with `error`.
    pub fn always_fail_list(&self, error: RemoteError) {
        self.faults.lock().list_always = Some(error);
    }

    /// Hides `id` from `list` results until [`Self::clear_faults`].
    pub fn hide_from_list(&self, id: impl Into<RecordId>) {
        self.faults.lock().hidden.insert(id.into());
    }

    /// Freezes the version of `id` that `list` returns at what is stored
    /// now, so later writes are not visible to `list` until
    /// [`Self::clear_faults`]. Does nothing if `id` is not stored.
    pub fn serve_stale(&self, id: impl Into<RecordId>) {
        let id = id.into();
        if let Some(current) = self.get(&id) {
            self.faults.lock().stale.insert(id, current);
        }
    }

    /// Makes `create` of `id` respond with `assigned` instead of echoing.
    pub fn reassign_id_on_create(&self, id: impl Into<RecordId>, assigned: impl Into<RecordId>) {
        self.faults.lock().reassign.insert(id.into(), assigned.into());
    }

    /// Removes every injected failure and list lag.
    pub fn clear_faults(&self) {
        *self.faults.lock() = Faults::default();
    }

    /// Delays every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    /// Number of `list` calls received.
    pub fn list_calls(&self) -> u64 {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of `create` calls received.
    pub fn create_calls(&self) -> u64 {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Number of `update` calls received.
    pub fn update_calls(&self) -> u64 {
        self.update_calls.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl std::fmt::Debug for MemoryRemoteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRemoteStore")
            .field("records", &self.len())
            .field("list_calls", &self.list_calls())
            .field("create_calls", &self.create_calls())
            .field("update_calls", &self.update_calls())
            .finish()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn list(&self, scope: &Scope) -> RemoteResult<Vec<RemoteRecord>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let (hidden, stale) = {
            let mut faults = self.faults.lock();
            if let Some(err) = faults.list_once.pop_front() {
                return Err(err);
            }
            if let Some(err) = faults.list_always.clone() {
                return Err(err);
            }
            (faults.hidden.clone(), faults.stale.clone())
        };

        Ok(self
            .records
            .read()
            .values()
            .filter(|r| &r.scope == scope && !hidden.contains(&r.id))
            .map(|r| stale.get(&r.id).unwrap_or(r).clone())
            .collect())
    }

    async fn create(
        &self,
        scope: &Scope,
        id: &RecordId,
        payload: &Payload,
    ) -> RemoteResult<RemoteRecord> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let reassigned = {
            let mut faults = self.faults.lock();
            let faults = &mut *faults;
            if let Some(err) = Faults::take(&mut faults.create_once, &faults.create_always, id) {
                return Err(err);
            }
            faults.reassign.get(id).cloned()
        };

        let mut records = self.records.write();
        if let Some(existing) = records.get(id) {
            if &existing.scope != scope {
                return Err(RemoteError::from_status(
                    409,
                    format!("id {id} already exists in scope {}", existing.scope),
                ));
            }
            debug!(%scope, %id, "duplicate create, returning stored record");
            return Ok(existing.clone());
        }

        let stored_id = reassigned.unwrap_or_else(|| id.clone());
        let record = RemoteRecord::new(
            scope.clone(),
            stored_id.clone(),
            payload.clone(),
            self.clock.now(),
        );
        records.insert(stored_id, record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        scope: &Scope,
        id: &RecordId,
        payload: &Payload,
    ) -> RemoteResult<RemoteRecord> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        {
            let mut faults = self.faults.lock();
            let faults = &mut *faults;
            if let Some(err) = Faults::take(&mut faults.update_once, &faults.update_always, id) {
                return Err(err);
            }
        }

        let mut records = self.records.write();
        let record = records
            .get_mut(id)
            .ok_or_else(|| RemoteError::NotFound { id: id.clone() })?;
        if &record.scope != scope {
            return Err(RemoteError::from_status(
                409,
                format!("id {id} belongs to scope {}", record.scope),
            ));
        }
        record.payload = payload.clone();
        record.updated_at = self.clock.now();
        Ok(record.clone())
    }
}
