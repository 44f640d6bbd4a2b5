//! Sync command implementation.

use super::Format;
use crate::error::{CliError, CliResult};
use recsync_core::{MemoryLocalStore, MemoryRemoteStore, RecordId, Scope, SystemClock};
use recsync_engine::{SyncConfig, SyncEngine, SyncReport, SyncState};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Options of the sync command.
#[derive(Debug)]
pub struct SyncOptions {
    /// Local store file.
    pub local: PathBuf,
    /// Remote store file.
    pub remote: PathBuf,
    /// Scope to reconcile.
    pub scope: Scope,
    /// Upload only this record.
    pub id: Option<String>,
    /// Timeout of each remote call.
    pub timeout: Duration,
    /// Output format (text, json).
    pub format: String,
}

/// Outcome of a sync command.
#[derive(Debug, Serialize)]
pub struct SyncSummary {
    /// Scope that was reconciled.
    pub scope: String,
    /// Terminal state, e.g. `SUCCESS(2)`.
    pub state: String,
    /// Records uploaded.
    pub uploaded: u64,
    /// Records downloaded.
    pub downloaded: u64,
    /// Per-record failures.
    pub failed: u64,
    /// Pending records confirmed by the remote set.
    pub cleaned: u64,
    /// Records skipped after repeated rejections.
    pub stalled: Vec<String>,
    /// Records still waiting for upload.
    pub pending: usize,
    /// Wall time of the run in milliseconds.
    pub duration_ms: u64,
}

impl SyncSummary {
    fn new(scope: &Scope, state: &SyncState, report: Option<&SyncReport>, pending: usize) -> Self {
        let mut summary = Self {
            scope: scope.to_string(),
            state: state.to_string(),
            uploaded: 0,
            downloaded: 0,
            failed: 0,
            cleaned: 0,
            stalled: Vec::new(),
            pending,
            duration_ms: 0,
        };
        if let Some(report) = report {
            summary.uploaded = report.uploaded;
            summary.downloaded = report.downloaded;
            summary.failed = report.failed;
            summary.cleaned = report.cleaned;
            summary.stalled = report.stalled.iter().map(ToString::to_string).collect();
            summary.duration_ms = u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX);
        }
        summary
    }
}

/// Runs the sync command.
///
/// Both store files are written back even if the run fails, since records
/// reconciled before the failure stay reconciled.
pub fn run(options: &SyncOptions) -> CliResult<()> {
    let format = Format::parse(&options.format)?;
    let clock = Arc::new(SystemClock);
    let local = Arc::new(MemoryLocalStore::load(&options.local)?);
    let remote = Arc::new(MemoryRemoteStore::load(clock.clone(), &options.remote)?);
    let config = SyncConfig::default().with_request_timeout(options.timeout);
    let engine = Arc::new(SyncEngine::new(
        config,
        local.clone(),
        remote.clone(),
        clock,
    ));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let outcome = runtime.block_on(async {
        match &options.id {
            Some(id) => sync_record(&engine, &local, &options.scope, id).await,
            None => Ok(sync_scope(&engine, &options.scope, format).await),
        }
    });

    local.save(&options.local)?;
    remote.save(&options.remote)?;

    let state = outcome?;
    let pending = local.pending_count(&options.scope);
    let summary = SyncSummary::new(
        &options.scope,
        &state,
        engine.last_report(&options.scope).as_ref(),
        pending,
    );
    print_summary(&summary, format)?;

    match state {
        SyncState::Error(message) => Err(CliError::RunFailed(message)),
        _ => Ok(()),
    }
}

async fn sync_scope(engine: &Arc<SyncEngine>, scope: &Scope, format: Format) -> SyncState {
    let mut progress = engine.run_sync(scope.clone());
    let mut last = SyncState::Idle;
    while let Some(state) = progress.next().await {
        if format == Format::Text && state.is_active() {
            println!("{state}");
        }
        last = state;
    }
    info!(%scope, %last, "sync finished");
    last
}

async fn sync_record(
    engine: &SyncEngine,
    local: &MemoryLocalStore,
    scope: &Scope,
    id: &str,
) -> CliResult<SyncState> {
    let id = RecordId::from(id);
    let was_pending = local.get(&id).is_some_and(|r| r.is_pending());
    engine.sync_one(scope, &id).await?;
    info!(%scope, %id, "record synced");
    Ok(SyncState::Success(u64::from(was_pending)))
}

fn print_summary(summary: &SyncSummary, format: Format) -> CliResult<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(summary)?),
        Format::Text => {
            println!("{}", summary.state);
            println!("  uploaded:   {}", summary.uploaded);
            println!("  downloaded: {}", summary.downloaded);
            println!("  failed:     {}", summary.failed);
            println!("  cleaned:    {}", summary.cleaned);
            if !summary.stalled.is_empty() {
                println!("  stalled:    {}", summary.stalled.join(", "));
            }
            println!("{} items pending", summary.pending);
        }
    }
    Ok(())
}
