//! Core type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Partition key under which a sync run operates (tenant, producer, ...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(String);

impl Scope {
    /// Creates a new scope.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the scope name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Scope {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Scope {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Stable record identifier.
///
/// Ids are client-authoritative: a record created offline gets its id from
/// the local [`crate::Clock`] and the remote store must echo it back on
/// create. Ids are never remapped.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Wraps an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random identifier (UUID v4).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<Uuid> for RecordId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid.to_string())
    }
}

/// Milliseconds since the UNIX epoch.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Creates a timestamp from raw milliseconds.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Returns the current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self(u64::try_from(millis).unwrap_or(u64::MAX))
    }

    /// Returns the raw millisecond value.
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Returns this timestamp moved forward by `delta`.
    #[must_use]
    pub fn saturating_add(self, delta: Duration) -> Self {
        let millis = u64::try_from(delta.as_millis()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(millis))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Synchronization status of a local record.
///
/// There is deliberately no pending-delete state: deletions never enter the
/// reconciliation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    /// Local copy is confirmed identical to the remote copy as of the last
    /// reconciliation.
    Synced,
    /// Created locally, never acknowledged by the remote store.
    PendingCreate,
    /// Has a remote counterpart but carries local edits not yet uploaded.
    PendingUpdate,
}

impl SyncStatus {
    /// Returns true for either pending state.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        !matches!(self, SyncStatus::Synced)
    }

    /// Returns the canonical upper-case name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Synced => "SYNCED",
            SyncStatus::PendingCreate => "PENDING_CREATE",
            SyncStatus::PendingUpdate => "PENDING_UPDATE",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SYNCED" => Ok(SyncStatus::Synced),
            "PENDING_CREATE" => Ok(SyncStatus::PendingCreate),
            "PENDING_UPDATE" => Ok(SyncStatus::PendingUpdate),
            other => Err(format!("unknown sync status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let a = RecordId::generate();
        let b = RecordId::generate();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(a.as_str()).is_ok());
    }

    #[test]
    fn timestamp_ordering() {
        let t1 = Timestamp::from_millis(10);
        let t2 = t1.saturating_add(Duration::from_millis(5));
        assert!(t1 < t2);
        assert_eq!(t2.as_millis(), 15);
        assert_eq!(
            Timestamp::from_millis(u64::MAX).saturating_add(Duration::from_secs(1)),
            Timestamp::from_millis(u64::MAX)
        );
    }

    #[test]
    fn status_names() {
        for status in [
            SyncStatus::Synced,
            SyncStatus::PendingCreate,
            SyncStatus::PendingUpdate,
        ] {
            assert_eq!(status.as_str().parse::<SyncStatus>().unwrap(), status);
        }
        assert!("PENDING_DELETE".parse::<SyncStatus>().is_err());
    }

    #[test]
    fn status_serializes_upper_case() {
        let json = serde_json::to_string(&SyncStatus::PendingCreate).unwrap();
        assert_eq!(json, "\"PENDING_CREATE\"");
        assert!(!SyncStatus::Synced.is_pending());
        assert!(SyncStatus::PendingUpdate.is_pending());
    }

    #[test]
    fn scope_display() {
        let scope = Scope::from("producer-7");
        assert_eq!(format!("{scope}"), "producer-7");
    }
}
