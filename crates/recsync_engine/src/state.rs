//! Sync run state machine and bookkeeping types.

use crate::error::SyncError;
use recsync_core::{RecordId, Scope};
use std::fmt;
use std::time::{Duration, Instant};

/// Externally observable state of a scope's sync run.
///
/// A run walks `Idle → Syncing(0) → Syncing(33) → Syncing(66) →
/// Syncing(100)` and ends in exactly one of `Success` or `Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    /// No run has happened for the scope yet.
    Idle,
    /// A run is in progress; the value is a percentage.
    Syncing(u8),
    /// The run completed; the value is `uploaded + downloaded`.
    Success(u64),
    /// The run aborted.
    Error(String),
}

impl SyncState {
    /// Returns true if a run is in progress.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncState::Syncing(_))
    }

    /// Returns true for `Success` and `Error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncState::Success(_) | SyncState::Error(_))
    }

    /// Returns the progress percentage, if the state carries one.
    pub fn progress(&self) -> Option<u8> {
        match self {
            SyncState::Syncing(p) => Some(*p),
            SyncState::Success(_) => Some(100),
            _ => None,
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::Idle => write!(f, "IDLE"),
            SyncState::Syncing(p) => write!(f, "SYNCING({p}%)"),
            SyncState::Success(n) => write!(f, "SUCCESS({n})"),
            SyncState::Error(msg) => write!(f, "ERROR({msg})"),
        }
    }
}

/// The three phases of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    /// Local → Remote.
    Upload,
    /// Remote → Local.
    Download,
    /// Convergence sweep.
    Cleanup,
}

impl Phase {
    /// Progress reported once the phase has finished.
    pub fn completed_progress(self) -> u8 {
        match self {
            Phase::Upload => 33,
            Phase::Download => 66,
            Phase::Cleanup => 100,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Upload => write!(f, "upload"),
            Phase::Download => write!(f, "download"),
            Phase::Cleanup => write!(f, "cleanup"),
        }
    }
}

/// Why a record was passed over during upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Already `SYNCED`, nothing to upload.
    AlreadySynced,
    /// Deleted locally before it could be marked.
    NotFound,
    /// Edited locally while its upload was in flight; stays pending.
    EditedInFlight,
    /// Another attempt for the same record is in flight.
    InFlight,
    /// Reached the non-retryable failure cap.
    Stalled,
}

/// Result of one per-record upload step.
#[derive(Debug)]
pub enum RecordOutcome {
    /// Remote acknowledged the record and it is now `SYNCED` locally.
    Synced,
    /// Nothing was uploaded, or the acknowledgement could not be applied.
    Skipped(SkipReason),
    /// The step failed; the record keeps its pending status.
    Failed(SyncError),
}

impl RecordOutcome {
    /// Returns true if the record converged to `SYNCED`.
    pub fn is_synced(&self) -> bool {
        matches!(self, RecordOutcome::Synced)
    }
}

/// Per-record result of the download phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DownloadOutcome {
    /// New remote record inserted locally.
    Inserted,
    /// Server won and business fields changed.
    Overwritten,
    /// Server won, only sync metadata changed.
    Refreshed,
    /// Local copy already identical.
    Unchanged,
    /// Local copy kept (user wins).
    Kept,
    /// Merge subroutine applied; the flag tells whether fields changed.
    Merged(bool),
}

impl DownloadOutcome {
    /// Returns true if the outcome counts as a downloaded record.
    pub(crate) fn counts(self) -> bool {
        matches!(
            self,
            DownloadOutcome::Inserted | DownloadOutcome::Overwritten | DownloadOutcome::Merged(true)
        )
    }
}

/// Summary of one sync run.
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// Scope the run operated on.
    pub scope: Scope,
    /// Records converged to `SYNCED` by the upload step.
    pub uploaded: u64,
    /// Records inserted or changed by the download phase.
    pub downloaded: u64,
    /// Per-record failures across all phases.
    pub failed: u64,
    /// Pending records the cleanup phase found already confirmed remotely.
    pub cleaned: u64,
    /// Records skipped because they are stalled.
    pub stalled: Vec<RecordId>,
    /// Whether the run reached `Success`.
    pub completed: bool,
    /// Wall time of the run.
    pub duration: Duration,
}

impl SyncReport {
    pub(crate) fn new(scope: Scope) -> Self {
        Self {
            scope,
            uploaded: 0,
            downloaded: 0,
            failed: 0,
            cleaned: 0,
            stalled: Vec::new(),
            completed: false,
            duration: Duration::ZERO,
        }
    }

    /// The count reported by the terminal `Success` event.
    pub fn total(&self) -> u64 {
        self.uploaded + self.downloaded
    }
}

/// Cumulative statistics of an engine.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Runs that reached `Success`.
    pub cycles_completed: u64,
    /// Runs that ended in `Error`.
    pub cycles_failed: u64,
    /// Requests coalesced onto an in-flight run.
    pub coalesced: u64,
    /// Total records uploaded.
    pub records_uploaded: u64,
    /// Total records downloaded.
    pub records_downloaded: u64,
    /// Total per-record failures.
    pub record_failures: u64,
    /// Retries of the remote list fetch.
    pub retries: u64,
    /// End of the last successful run.
    pub last_sync_time: Option<Instant>,
    /// Message of the last failed run.
    pub last_error: Option<String>,
}
