//! Single-flight bookkeeping.
//!
//! At most one run per scope and at most one upload attempt per record may
//! be in flight. Locks here are held only for map lookups, never across an
//! await.

use crate::progress::SyncProgress;
use crate::state::SyncState;
use parking_lot::Mutex;
use recsync_core::{RecordId, Scope};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

struct Flight {
    events: broadcast::Sender<SyncState>,
    latest: SyncState,
    cancelled: Arc<AtomicBool>,
}

/// Outcome of asking for a run.
pub(crate) enum Join {
    /// No run was in flight; the caller owns the new run.
    Started(FlightHandle, SyncProgress),
    /// A run was already in flight; the caller follows it.
    Attached(SyncProgress),
}

/// Registry of in-flight runs and record uploads.
pub(crate) struct FlightRegistry {
    runs: Mutex<HashMap<Scope, Flight>>,
    records: Mutex<HashSet<RecordId>>,
    buffer: usize,
}

impl FlightRegistry {
    pub(crate) fn new(buffer: usize) -> Self {
        Self {
            runs: Mutex::new(HashMap::new()),
            records: Mutex::new(HashSet::new()),
            buffer,
        }
    }

    /// Starts a run for `scope`, or attaches to the one in flight.
    ///
    /// A new run is announced with `Syncing(0)` before this returns.
    pub(crate) fn join_or_start(self: &Arc<Self>, scope: &Scope) -> Join {
        let mut runs = self.runs.lock();
        if let Some(flight) = runs.get(scope) {
            let progress = SyncProgress::new(Some(flight.latest.clone()), flight.events.subscribe());
            return Join::Attached(progress);
        }

        let (events, rx) = broadcast::channel(self.buffer);
        let started = SyncState::Syncing(0);
        let _ = events.send(started.clone());
        let cancelled = Arc::new(AtomicBool::new(false));
        runs.insert(
            scope.clone(),
            Flight {
                events,
                latest: started,
                cancelled: Arc::clone(&cancelled),
            },
        );

        let handle = FlightHandle {
            registry: Arc::clone(self),
            scope: scope.clone(),
            cancelled,
            finished: false,
        };
        Join::Started(handle, SyncProgress::new(None, rx))
    }

    /// Returns true if a run for `scope` is in flight.
    pub(crate) fn is_running(&self, scope: &Scope) -> bool {
        self.runs.lock().contains_key(scope)
    }

    /// Latest state of the in-flight run for `scope`.
    pub(crate) fn latest(&self, scope: &Scope) -> Option<SyncState> {
        self.runs.lock().get(scope).map(|f| f.latest.clone())
    }

    /// Requests cancellation of the in-flight run for `scope`.
    pub(crate) fn cancel(&self, scope: &Scope) -> bool {
        match self.runs.lock().get(scope) {
            Some(flight) => {
                flight.cancelled.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Claims `id` for an upload attempt. Returns `None` if already claimed.
    pub(crate) fn claim_record(self: &Arc<Self>, id: &RecordId) -> Option<RecordClaim> {
        if self.records.lock().insert(id.clone()) {
            Some(RecordClaim {
                registry: Arc::clone(self),
                id: id.clone(),
            })
        } else {
            None
        }
    }

    fn publish(&self, scope: &Scope, state: SyncState) {
        if let Some(flight) = self.runs.lock().get_mut(scope) {
            flight.latest = state.clone();
            // No subscribers is fine
            let _ = flight.events.send(state);
        }
    }

    fn finish(&self, scope: &Scope, state: SyncState) {
        // Removed before the terminal send so late joiners start a new run
        // instead of attaching to a finished one.
        let mut runs = self.runs.lock();
        if let Some(flight) = runs.remove(scope) {
            let _ = flight.events.send(state);
        }
    }
}

/// Ownership of an in-flight run. Dropping it without [`FlightHandle::finish`]
/// ends the run with an error event.
pub(crate) struct FlightHandle {
    registry: Arc<FlightRegistry>,
    scope: Scope,
    cancelled: Arc<AtomicBool>,
    finished: bool,
}

impl FlightHandle {
    pub(crate) fn publish(&self, state: SyncState) {
        self.registry.publish(&self.scope, state);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub(crate) fn finish(mut self, state: SyncState) {
        self.finished = true;
        self.registry.finish(&self.scope, state);
    }
}

impl Drop for FlightHandle {
    fn drop(&mut self) {
        if !self.finished {
            self.registry
                .finish(&self.scope, SyncState::Error("sync run aborted".into()));
        }
    }
}

/// Ownership of a record's upload slot, released on drop.
pub(crate) struct RecordClaim {
    registry: Arc<FlightRegistry>,
    id: RecordId,
}

impl Drop for RecordClaim {
    fn drop(&mut self) {
        self.registry.records.lock().remove(&self.id);
    }
}
