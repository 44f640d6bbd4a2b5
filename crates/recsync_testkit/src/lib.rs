//! # recsync Testkit
//!
//! Test utilities for recsync.
//!
//! This crate provides:
//! - A manually driven clock
//! - Record builders
//! - A harness wiring an engine to in-memory stores
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use recsync_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn uploads_offline_record() {
//!     let h = Harness::new();
//!     h.add_local("a", json!({"n": 1})).await;
//!     assert_eq!(h.sync().await, SyncState::Success(1));
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use recsync_core::{
        LocalStore, MemoryLocalStore, MemoryRemoteStore, Record, RecordId, RemoteError,
        RemoteRecord, RemoteStore, Scope, SyncStatus, Timestamp,
    };
    pub use recsync_engine::{SyncConfig, SyncEngine, SyncError, SyncState};
    pub use serde_json::json;
}

pub use fixtures::*;
pub use generators::*;
