//! Progress stream of a sync run.

use crate::state::SyncState;
use futures::stream::{self, Stream};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

const ABORTED: &str = "sync run aborted";

/// Subscription to one sync run.
///
/// Yields non-decreasing `Syncing` values followed by exactly one terminal
/// event (`Success` or `Error`), then ends. A caller attached to a run that
/// was already in flight starts from the run's latest state.
#[derive(Debug)]
pub struct SyncProgress {
    first: Option<SyncState>,
    rx: broadcast::Receiver<SyncState>,
    done: bool,
}

impl SyncProgress {
    pub(crate) fn new(first: Option<SyncState>, rx: broadcast::Receiver<SyncState>) -> Self {
        Self {
            first,
            rx,
            done: false,
        }
    }

    /// Waits for the next event. Returns `None` after the terminal event.
    pub async fn next(&mut self) -> Option<SyncState> {
        if self.done {
            return None;
        }
        if let Some(state) = self.first.take() {
            self.done = state.is_terminal();
            return Some(state);
        }

        loop {
            match self.rx.recv().await {
                Ok(state) => {
                    self.done = state.is_terminal();
                    return Some(state);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "progress subscriber lagged");
                }
                Err(RecvError::Closed) => {
                    // Run task went away without a terminal event
                    self.done = true;
                    return Some(SyncState::Error(ABORTED.into()));
                }
            }
        }
    }

    /// Drains the run and returns its terminal event.
    pub async fn wait(mut self) -> SyncState {
        let mut last = SyncState::Error(ABORTED.into());
        while let Some(state) = self.next().await {
            last = state;
        }
        last
    }

    /// Drains the run and returns every event received.
    pub async fn collect(mut self) -> Vec<SyncState> {
        let mut events = Vec::new();
        while let Some(state) = self.next().await {
            events.push(state);
        }
        events
    }

    /// Converts the subscription into a [`Stream`].
    pub fn into_stream(self) -> impl Stream<Item = SyncState> + Send + 'static {
        stream::unfold(self, |mut progress| async move {
            progress.next().await.map(|state| (state, progress))
        })
    }
}
