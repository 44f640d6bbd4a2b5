//! The sync coordinator.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::flight::{FlightHandle, FlightRegistry, Join};
use crate::progress::SyncProgress;
use crate::state::{
    DownloadOutcome, Phase, RecordOutcome, SkipReason, SyncReport, SyncState, SyncStats,
};
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use recsync_core::{
    Clock, ConflictResolver, DefaultResolver, LocalStore, Record, RecordId, RemoteError,
    RemoteRecord, RemoteResult, RemoteStore, Resolution, Scope, SyncStatus, Timestamp,
};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Non-retryable failure history of one version of a record.
#[derive(Debug, Clone)]
struct FailureEntry {
    scope: Scope,
    /// `updated_at` of the rejected version. A later edit voids the entry.
    updated_at: Timestamp,
    attempts: u32,
}

/// What the upload phase hands over to the later phases.
#[derive(Debug, Default)]
struct UploadSummary {
    uploaded: u64,
    failed: u64,
    stalled: Vec<RecordId>,
    /// Acknowledged remotely but not marked locally.
    unmarked: Vec<Record>,
}

/// The sync engine reconciles a [`LocalStore`] with a [`RemoteStore`].
///
/// Every run executes three phases strictly in order:
///
/// 1. **Upload**: pending local records are created or updated remotely.
/// 2. **Download**: the remote set is fetched and reconciled record by
///    record through the [`ConflictResolver`].
/// 3. **Cleanup**: pending records already confirmed by the remote set are
///    marked `SYNCED`.
///
/// Per-record failures never abort a run; only failing to fetch the remote
/// set does. Successful per-record work is never rolled back.
///
/// # Example
///
/// ```rust
/// use recsync_core::{MemoryLocalStore, MemoryRemoteStore, SystemClock};
/// use recsync_engine::{SyncConfig, SyncEngine, SyncState};
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let clock = Arc::new(SystemClock);
/// let local = Arc::new(MemoryLocalStore::new());
/// let remote = Arc::new(MemoryRemoteStore::new(clock.clone()));
/// let engine = Arc::new(SyncEngine::new(SyncConfig::default(), local, remote, clock));
///
/// let state = engine.run_sync("farm").wait().await;
/// assert_eq!(state, SyncState::Success(0));
/// # }
/// ```
pub struct SyncEngine {
    config: SyncConfig,
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
    clock: Arc<dyn Clock>,
    resolver: RwLock<Arc<dyn ConflictResolver>>,
    flights: Arc<FlightRegistry>,
    states: RwLock<HashMap<Scope, SyncState>>,
    reports: RwLock<HashMap<Scope, SyncReport>>,
    stats: RwLock<SyncStats>,
    failures: Mutex<HashMap<RecordId, FailureEntry>>,
}

impl SyncEngine {
    /// Creates a new sync engine using the default conflict rule.
    pub fn new(
        config: SyncConfig,
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let flights = Arc::new(FlightRegistry::new(config.event_buffer.max(8)));
        Self {
            config,
            local,
            remote,
            clock,
            resolver: RwLock::new(Arc::new(DefaultResolver)),
            flights,
            states: RwLock::new(HashMap::new()),
            reports: RwLock::new(HashMap::new()),
            stats: RwLock::new(SyncStats::default()),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Replaces the conflict resolver.
    pub fn with_resolver(self, resolver: Arc<dyn ConflictResolver>) -> Self {
        *self.resolver.write() = resolver;
        self
    }

    /// Replaces the conflict resolver used by subsequent runs.
    pub fn set_conflict_resolver(&self, resolver: Arc<dyn ConflictResolver>) {
        *self.resolver.write() = resolver;
    }

    /// Gets the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Gets the current state of `scope`.
    ///
    /// `Idle` until the first run starts, then the latest event of the most
    /// recent run.
    pub fn status(&self, scope: &Scope) -> SyncState {
        if let Some(latest) = self.flights.latest(scope) {
            return latest;
        }
        self.states
            .read()
            .get(scope)
            .cloned()
            .unwrap_or(SyncState::Idle)
    }

    /// Returns true if a run for `scope` is in flight.
    pub fn is_syncing(&self, scope: &Scope) -> bool {
        self.flights.is_running(scope)
    }

    /// Gets the report of the most recent finished run of `scope`.
    pub fn last_report(&self, scope: &Scope) -> Option<SyncReport> {
        self.reports.read().get(scope).cloned()
    }

    /// Gets cumulative statistics.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Number of records of `scope` still waiting for upload.
    pub async fn pending_count(&self, scope: &Scope) -> SyncResult<usize> {
        Ok(self.local.get_pending(scope).await?.len())
    }

    /// Records of `scope` that reached the non-retryable failure cap.
    ///
    /// A record edited since its last rejection is uploaded again by the
    /// next run and drops out of this list once that run starts.
    pub fn stalled(&self, scope: &Scope) -> Vec<RecordId> {
        let cap = self.config.max_record_attempts;
        if cap == 0 {
            return Vec::new();
        }
        let mut ids: Vec<RecordId> = self
            .failures
            .lock()
            .iter()
            .filter(|(_, entry)| &entry.scope == scope && entry.attempts >= cap)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Forgets the failure history of every record of `scope`, so stalled
    /// records are uploaded again by the next run.
    pub fn clear_stalled(&self, scope: &Scope) {
        self.failures.lock().retain(|_, entry| &entry.scope != scope);
    }

    /// Requests cancellation of the run in flight for `scope`.
    ///
    /// Honored at the next phase boundary. Returns false if nothing is running.
    pub fn cancel(&self, scope: &Scope) -> bool {
        let cancelled = self.flights.cancel(scope);
        if cancelled {
            info!(%scope, "sync cancellation requested");
        }
        cancelled
    }

    /// Starts a sync run for `scope` and returns its progress stream.
    ///
    /// If a run for the scope is already in flight no second run is
    /// started; the returned stream follows the in-flight run instead.
    pub fn run_sync(self: &Arc<Self>, scope: impl Into<Scope>) -> SyncProgress {
        let scope = scope.into();
        match self.flights.join_or_start(&scope) {
            Join::Attached(progress) => {
                debug!(%scope, "sync already in flight, attaching");
                self.stats.write().coalesced += 1;
                progress
            }
            Join::Started(handle, progress) => {
                let engine = Arc::clone(self);
                tokio::spawn(async move {
                    engine.execute(scope, handle).await;
                });
                progress
            }
        }
    }

    /// Uploads a single pending record now.
    ///
    /// Follows the upload phase semantics: on success the record is
    /// `SYNCED`, on failure it keeps its status. A `SYNCED` record is a
    /// no-op. Stalled records are attempted anyway and un-stalled on success.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Busy`] if an attempt for the record is in flight
    /// - [`SyncError::NotFound`] if the record does not exist in `scope`
    /// - [`SyncError::EditedDuringUpload`] if the record changed while the
    ///   upload was in flight; it stays pending
    /// - [`SyncError::Remote`] / [`SyncError::Store`] if the upload failed
    pub async fn sync_one(&self, scope: &Scope, id: &RecordId) -> SyncResult<()> {
        let _claim = self
            .flights
            .claim_record(id)
            .ok_or_else(|| SyncError::busy(format!("record {id}")))?;

        let record = self
            .local
            .get_by_id(scope, id)
            .await?
            .ok_or_else(|| SyncError::NotFound { id: id.clone() })?;

        if !record.is_pending() {
            debug!(%scope, %id, "record already synced");
            return Ok(());
        }

        match self.push_record(scope, &record).await {
            RecordOutcome::Synced => Ok(()),
            RecordOutcome::Skipped(SkipReason::NotFound) => {
                Err(SyncError::NotFound { id: id.clone() })
            }
            RecordOutcome::Skipped(SkipReason::EditedInFlight) => {
                Err(SyncError::EditedDuringUpload { id: id.clone() })
            }
            RecordOutcome::Skipped(reason) => {
                debug!(%scope, %id, ?reason, "record left pending");
                Ok(())
            }
            RecordOutcome::Failed(e) => Err(e),
        }
    }

    async fn execute(&self, scope: Scope, handle: FlightHandle) {
        let start = Instant::now();
        let mut report = SyncReport::new(scope.clone());
        info!(%scope, "sync run started");

        let outcome = self.run_phases(&scope, &handle, &mut report).await;
        report.duration = start.elapsed();

        let terminal = match outcome {
            Ok(()) => {
                report.completed = true;
                info!(
                    %scope,
                    uploaded = report.uploaded,
                    downloaded = report.downloaded,
                    failed = report.failed,
                    cleaned = report.cleaned,
                    elapsed_ms = report.duration.as_millis() as u64,
                    "sync run completed"
                );
                SyncState::Success(report.total())
            }
            Err(e) => {
                error!(%scope, error = %e, "sync run failed");
                SyncState::Error(e.to_string())
            }
        };

        self.record_run(&report, &terminal);
        self.states.write().insert(scope, terminal.clone());
        handle.finish(terminal);
    }

    async fn run_phases(
        &self,
        scope: &Scope,
        handle: &FlightHandle,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        Self::check_cancelled(handle)?;
        let upload = self.upload_phase(scope).await;
        report.uploaded = upload.uploaded;
        report.failed += upload.failed;
        report.stalled = upload.stalled;
        self.publish(handle, scope, SyncState::Syncing(Phase::Upload.completed_progress()));

        Self::check_cancelled(handle)?;
        let remote_set = self.download_phase(scope, report).await?;
        self.publish(handle, scope, SyncState::Syncing(Phase::Download.completed_progress()));

        Self::check_cancelled(handle)?;
        self.cleanup_phase(scope, &remote_set, upload.unmarked, report)
            .await;
        self.publish(handle, scope, SyncState::Syncing(Phase::Cleanup.completed_progress()));

        Ok(())
    }

    fn check_cancelled(handle: &FlightHandle) -> SyncResult<()> {
        if handle.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn publish(&self, handle: &FlightHandle, scope: &Scope, state: SyncState) {
        debug!(%scope, %state, "sync progress");
        handle.publish(state);
    }

    fn record_run(&self, report: &SyncReport, terminal: &SyncState) {
        let mut stats = self.stats.write();
        stats.records_uploaded += report.uploaded;
        stats.records_downloaded += report.downloaded;
        stats.record_failures += report.failed;
        match terminal {
            SyncState::Error(message) => {
                stats.cycles_failed += 1;
                stats.last_error = Some(message.clone());
            }
            _ => {
                stats.cycles_completed += 1;
                stats.last_sync_time = Some(Instant::now());
                stats.last_error = None;
            }
        }
        drop(stats);
        self.reports
            .write()
            .insert(report.scope.clone(), report.clone());
    }

    // ── Phase 1: upload ──────────────────────────────────────────

    async fn upload_phase(&self, scope: &Scope) -> UploadSummary {
        let mut summary = UploadSummary::default();

        let pending = match self.local.get_pending(scope).await {
            Ok(pending) => pending,
            Err(e) => {
                error!(%scope, error = %e, "could not read pending records, skipping upload");
                summary.failed += 1;
                return summary;
            }
        };
        debug!(%scope, count = pending.len(), "uploading pending records");

        let concurrency = self.config.upload_concurrency.max(1);
        let mut outcomes = Vec::with_capacity(pending.len());
        for batch in pending.chunks(concurrency) {
            let results = join_all(batch.iter().map(|r| self.upload_record(scope, r))).await;
            outcomes.extend(batch.iter().cloned().zip(results));
        }

        for (record, outcome) in outcomes {
            match outcome {
                RecordOutcome::Synced => summary.uploaded += 1,
                RecordOutcome::Skipped(SkipReason::Stalled) => summary.stalled.push(record.id),
                RecordOutcome::Skipped(_) => {}
                RecordOutcome::Failed(SyncError::Store(e)) => {
                    // The remote holds it; cleanup retries the local mark
                    warn!(%scope, id = %record.id, error = %e, "uploaded record not marked synced");
                    summary.failed += 1;
                    summary.unmarked.push(record);
                }
                RecordOutcome::Failed(_) => summary.failed += 1,
            }
        }

        if !summary.stalled.is_empty() {
            warn!(%scope, stalled = summary.stalled.len(), "stalled records skipped");
        }
        summary
    }

    async fn upload_record(&self, scope: &Scope, record: &Record) -> RecordOutcome {
        self.forget_superseded_failures(record);
        if let Err(e) = self.check_stalled(&record.id) {
            debug!(%scope, id = %record.id, error = %e, "skipping stalled record");
            return RecordOutcome::Skipped(SkipReason::Stalled);
        }
        let Some(_claim) = self.flights.claim_record(&record.id) else {
            debug!(%scope, id = %record.id, "upload already in flight, skipping");
            return RecordOutcome::Skipped(SkipReason::InFlight);
        };
        self.push_record(scope, record).await
    }

    /// Sends one record to the remote store and marks it on success.
    async fn push_record(&self, scope: &Scope, record: &Record) -> RecordOutcome {
        let id = &record.id;
        let result = match record.sync_status {
            SyncStatus::Synced => return RecordOutcome::Skipped(SkipReason::AlreadySynced),
            SyncStatus::PendingCreate => self
                .call_remote(self.remote.create(scope, id, &record.payload))
                .await
                .and_then(|created| {
                    if &created.id == id {
                        Ok(created)
                    } else {
                        Err(RemoteError::IdMismatch {
                            expected: id.clone(),
                            actual: created.id,
                        })
                    }
                }),
            SyncStatus::PendingUpdate => {
                self.call_remote(self.remote.update(scope, id, &record.payload))
                    .await
            }
        };

        match result {
            Ok(_) => {
                self.failures.lock().remove(id);
                self.mark_synced(scope, record).await
            }
            Err(e) => {
                self.note_failure(scope, record, &e);
                warn!(
                    %scope,
                    %id,
                    status = %record.sync_status,
                    retryable = e.is_retryable(),
                    error = %e,
                    "upload failed, record stays pending"
                );
                RecordOutcome::Failed(SyncError::Remote(e))
            }
        }
    }

    /// Marks an acknowledged record `SYNCED` unless it changed meanwhile.
    async fn mark_synced(&self, scope: &Scope, uploaded: &Record) -> RecordOutcome {
        let id = &uploaded.id;
        let current = match self.local.get_by_id(scope, id).await {
            Ok(Some(current)) => current,
            Ok(None) => {
                debug!(%scope, %id, "record deleted during upload");
                return RecordOutcome::Skipped(SkipReason::NotFound);
            }
            Err(e) => return RecordOutcome::Failed(e.into()),
        };

        if !current.is_same_version(uploaded) {
            debug!(%scope, %id, "record edited during upload, keeping it pending");
            // The remote counterpart exists now
            if current.sync_status == SyncStatus::PendingCreate {
                if let Err(e) = self
                    .local
                    .update_status(id, SyncStatus::PendingUpdate)
                    .await
                {
                    return RecordOutcome::Failed(e.into());
                }
            }
            return RecordOutcome::Skipped(SkipReason::EditedInFlight);
        }

        match self.local.update_status(id, SyncStatus::Synced).await {
            Ok(()) => {
                debug!(%scope, %id, "record synced");
                RecordOutcome::Synced
            }
            Err(e) => RecordOutcome::Failed(e.into()),
        }
    }

    fn note_failure(&self, scope: &Scope, record: &Record, error: &RemoteError) {
        if error.is_retryable() {
            return;
        }
        let id = &record.id;
        let cap = self.config.max_record_attempts;
        let mut failures = self.failures.lock();
        let entry = failures.entry(id.clone()).or_insert_with(|| FailureEntry {
            scope: scope.clone(),
            updated_at: record.updated_at,
            attempts: 0,
        });
        if entry.updated_at != record.updated_at {
            // A different version; count from scratch
            entry.updated_at = record.updated_at;
            entry.attempts = 0;
        }
        entry.attempts += 1;
        if cap > 0 && entry.attempts == cap {
            warn!(
                %scope,
                %id,
                attempts = entry.attempts,
                "record stalled, excluded from sync runs until fixed"
            );
        }
    }

    /// Drops the failure history of `record` if it was edited since its
    /// last rejection.
    fn forget_superseded_failures(&self, record: &Record) {
        let mut failures = self.failures.lock();
        let superseded = failures
            .get(&record.id)
            .is_some_and(|entry| entry.updated_at != record.updated_at);
        if superseded {
            debug!(id = %record.id, "record edited since last rejection, failure count reset");
            failures.remove(&record.id);
        }
    }

    /// Fails with [`SyncError::Stalled`] if `id` reached the failure cap.
    pub fn check_stalled(&self, id: &RecordId) -> SyncResult<()> {
        let cap = self.config.max_record_attempts;
        if cap == 0 {
            return Ok(());
        }
        match self.failures.lock().get(id) {
            Some(entry) if entry.attempts >= cap => Err(SyncError::Stalled {
                id: id.clone(),
                attempts: entry.attempts,
            }),
            _ => Ok(()),
        }
    }

    async fn call_remote<T>(&self, call: impl Future<Output = RemoteResult<T>>) -> RemoteResult<T> {
        match tokio::time::timeout(self.config.request_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout),
        }
    }

    // ── Phase 2: download ────────────────────────────────────────

    async fn download_phase(
        &self,
        scope: &Scope,
        report: &mut SyncReport,
    ) -> SyncResult<Vec<RemoteRecord>> {
        let remote_set = self
            .fetch_remote_set(scope)
            .await
            .map_err(|e| SyncError::PhaseFatal(e.to_string()))?;
        debug!(%scope, count = remote_set.len(), "reconciling remote records");

        let resolver = self.resolver.read().clone();
        for remote in &remote_set {
            match self.download_record(scope, remote, resolver.as_ref()).await {
                Ok(outcome) => {
                    if outcome.counts() {
                        report.downloaded += 1;
                    }
                }
                Err(e) => {
                    warn!(%scope, id = %remote.id, error = %e, "skipping downloaded record");
                    report.failed += 1;
                }
            }
        }

        Ok(remote_set)
    }

    async fn fetch_remote_set(&self, scope: &Scope) -> RemoteResult<Vec<RemoteRecord>> {
        let retry = &self.config.retry;
        let max_attempts = retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            if attempt > 0 {
                tokio::time::sleep(retry.delay_before_retry(attempt)).await;
                self.stats.write().retries += 1;
            }

            match self.call_remote(self.remote.list(scope)).await {
                Ok(records) => return Ok(records),
                Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                    warn!(%scope, attempt, error = %e, "remote list failed, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn download_record(
        &self,
        scope: &Scope,
        remote: &RemoteRecord,
        resolver: &dyn ConflictResolver,
    ) -> SyncResult<DownloadOutcome> {
        if &remote.scope != scope {
            return Err(SyncError::ScopeMismatch {
                id: remote.id.clone(),
                expected: scope.clone(),
                actual: remote.scope.clone(),
            });
        }

        let Some(local) = self.local.get_by_id(scope, &remote.id).await? else {
            self.local
                .upsert(Record::from_remote(remote, self.clock.now()))
                .await?;
            debug!(%scope, id = %remote.id, "inserted remote record");
            return Ok(DownloadOutcome::Inserted);
        };

        let resolution = resolver.resolve(&local, remote);
        match resolution {
            Resolution::UserWins => {
                debug!(%scope, id = %remote.id, %resolution, "keeping local copy");
                Ok(DownloadOutcome::Kept)
            }
            Resolution::ServerWins => {
                if local.sync_status == SyncStatus::Synced && local.matches_remote(remote) {
                    return Ok(DownloadOutcome::Unchanged);
                }
                let fields_changed = local.payload != remote.payload;
                let mut updated = local.clone();
                updated.apply_remote(remote, self.clock.now());
                if !self.local.replace_if_unchanged(&local, updated).await? {
                    debug!(%scope, id = %remote.id, "record edited during download, keeping local copy");
                    return Ok(DownloadOutcome::Kept);
                }
                debug!(%scope, id = %remote.id, %resolution, fields_changed, "applied remote copy");
                Ok(if fields_changed {
                    DownloadOutcome::Overwritten
                } else {
                    DownloadOutcome::Refreshed
                })
            }
            Resolution::Merge => {
                let merged = resolver.merge(&local, remote, self.clock.now());
                let fields_changed = merged.payload != local.payload;
                if !self.local.replace_if_unchanged(&local, merged).await? {
                    debug!(%scope, id = %remote.id, "record edited during download, keeping local copy");
                    return Ok(DownloadOutcome::Kept);
                }
                debug!(%scope, id = %remote.id, %resolution, fields_changed, "merged record");
                Ok(DownloadOutcome::Merged(fields_changed))
            }
        }
    }

    // ── Phase 3: cleanup ─────────────────────────────────────────

    async fn cleanup_phase(
        &self,
        scope: &Scope,
        remote_set: &[RemoteRecord],
        unmarked: Vec<Record>,
        report: &mut SyncReport,
    ) {
        // Acknowledged uploads whose local mark failed in phase 1
        for uploaded in unmarked {
            match self.mark_synced(scope, &uploaded).await {
                RecordOutcome::Synced => {
                    report.uploaded += 1;
                    report.failed = report.failed.saturating_sub(1);
                }
                RecordOutcome::Failed(e) => {
                    warn!(%scope, id = %uploaded.id, error = %e, "cleanup could not mark record");
                }
                RecordOutcome::Skipped(_) => {}
            }
        }

        let records = match self.local.get_all(scope).await {
            Ok(records) => records,
            Err(e) => {
                warn!(%scope, error = %e, "cleanup could not read local records");
                return;
            }
        };

        // Failure history of records deleted locally
        let present: HashSet<&RecordId> = records.iter().map(|r| &r.id).collect();
        self.failures
            .lock()
            .retain(|id, entry| &entry.scope != scope || present.contains(id));

        let confirmed: HashMap<&RecordId, &RemoteRecord> =
            remote_set.iter().map(|r| (&r.id, r)).collect();

        for record in records.into_iter().filter(Record::is_pending) {
            let Some(remote) = confirmed.get(&record.id) else {
                continue;
            };
            if remote.payload != record.payload {
                continue;
            }

            let id = &record.id;
            let mut converged = record.clone();
            converged.apply_remote(remote, self.clock.now());
            match self.local.replace_if_unchanged(&record, converged).await {
                Ok(true) => {
                    self.failures.lock().remove(id);
                    report.cleaned += 1;
                    debug!(%scope, %id, "pending record already confirmed remotely");
                }
                Ok(false) => debug!(%scope, %id, "record edited during cleanup, left pending"),
                Err(e) => warn!(%scope, %id, error = %e, "cleanup could not mark record"),
            }
        }
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recsync_core::{MemoryLocalStore, MemoryRemoteStore, SystemClock, Timestamp};
    use serde_json::json;
    use std::time::Duration;

    fn engine(
        config: SyncConfig,
    ) -> (Arc<SyncEngine>, Arc<MemoryLocalStore>, Arc<MemoryRemoteStore>) {
        let clock = Arc::new(SystemClock);
        let local = Arc::new(MemoryLocalStore::new());
        let remote = Arc::new(MemoryRemoteStore::new(clock.clone()));
        let engine = Arc::new(SyncEngine::new(
            config,
            local.clone(),
            remote.clone(),
            clock,
        ));
        (engine, local, remote)
    }

    fn pending(id: &str, at: u64) -> Record {
        Record::new_local(
            Scope::from("s"),
            RecordId::from(id),
            json!({"id": id}),
            Timestamp::from_millis(at),
        )
    }

    #[tokio::test]
    async fn initial_state() {
        let (engine, _, _) = engine(SyncConfig::default());
        let scope = Scope::from("s");
        assert_eq!(engine.status(&scope), SyncState::Idle);
        assert!(!engine.is_syncing(&scope));
        assert!(engine.last_report(&scope).is_none());
        assert_eq!(engine.stats().cycles_completed, 0);
    }

    #[tokio::test]
    async fn run_emits_phases_in_order() {
        let (engine, local, _) = engine(SyncConfig::default());
        local.upsert(pending("a", 1)).await.unwrap();

        let events = engine.run_sync("s").collect().await;
        assert_eq!(
            events,
            vec![
                SyncState::Syncing(0),
                SyncState::Syncing(33),
                SyncState::Syncing(66),
                SyncState::Syncing(100),
                SyncState::Success(1),
            ]
        );
        assert_eq!(engine.status(&Scope::from("s")), SyncState::Success(1));
        assert_eq!(engine.stats().cycles_completed, 1);
    }

    #[tokio::test]
    async fn id_mismatch_is_not_retryable() {
        let (engine, local, remote) = engine(SyncConfig::default());
        local.upsert(pending("a", 1)).await.unwrap();
        remote.reassign_id_on_create("a", "server-7");

        let err = engine
            .sync_one(&Scope::from("s"), &RecordId::from("a"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::Remote(RemoteError::IdMismatch { .. })
        ));
        assert!(!err.is_retryable());
        assert_eq!(
            local.get(&RecordId::from("a")).unwrap().sync_status,
            SyncStatus::PendingCreate
        );
    }

    #[tokio::test]
    async fn slow_remote_times_out() {
        let config = SyncConfig::default().with_request_timeout(Duration::from_millis(20));
        let (engine, local, remote) = engine(config);
        local.upsert(pending("a", 1)).await.unwrap();
        remote.set_latency(Some(Duration::from_millis(500)));

        let err = engine
            .sync_one(&Scope::from("s"), &RecordId::from("a"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Remote(RemoteError::Timeout)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn sync_one_busy_while_record_claimed() {
        let (engine, local, _) = engine(SyncConfig::default());
        local.upsert(pending("a", 1)).await.unwrap();

        let _claim = engine.flights.claim_record(&RecordId::from("a")).unwrap();
        let err = engine
            .sync_one(&Scope::from("s"), &RecordId::from("a"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Busy { .. }));
    }
}
