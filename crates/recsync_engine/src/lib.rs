//! # recsync Engine
//!
//! Sync coordinator for the offline-first record synchronization engine.
//!
//! This crate provides:
//! - The three-phase sync run (upload → download → cleanup)
//! - Single-flight per scope and per record
//! - A progress stream per run
//! - Per-call timeouts and retry with exponential backoff
//! - Stall detection for records the remote keeps rejecting
//!
//! ## Architecture
//!
//! The engine implements a **push-then-pull** synchronization model:
//! 1. Upload pending local records (creates and updates)
//! 2. Download the authoritative remote set and reconcile record by record
//! 3. Mark pending records the remote already confirms as synced
//!
//! ## Key Invariants
//!
//! - Phases run strictly in order
//! - At most one run per scope is in flight
//! - Progress never decreases and each run emits exactly one terminal event
//! - A per-record failure never aborts a run
//! - Work done before a fatal failure is never rolled back

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod flight;
mod progress;
mod state;

pub use config::{RetryConfig, SyncConfig};
pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use progress::SyncProgress;
pub use state::{Phase, RecordOutcome, SkipReason, SyncReport, SyncState, SyncStats};

pub use recsync_core::{
    ConflictResolver, DefaultResolver, LocalStore, Record, RecordId, RemoteRecord, RemoteStore,
    Resolution, Scope, SyncStatus,
};
