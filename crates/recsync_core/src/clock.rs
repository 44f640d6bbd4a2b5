//! Time and identifier source.

use crate::types::{RecordId, Timestamp};

/// Supplies timestamps and client-generated identifiers.
///
/// Injected into the engine and the stores so tests can control time.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Timestamp;

    /// Generates a new client-authoritative record id.
    fn new_id(&self) -> RecordId {
        RecordId::generate()
    }
}

/// Wall-clock time and random UUID v4 ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}
