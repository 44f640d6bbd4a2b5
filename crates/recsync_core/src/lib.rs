//! # recsync core
//!
//! Shared vocabulary for the offline-first record synchronization engine.
//!
//! This crate provides:
//! - The record and sync status model
//! - The [`LocalStore`] contract (client copy + per-record sync status)
//! - The [`RemoteStore`] contract (authoritative collection)
//! - The [`Clock`] contract (timestamps and client-generated ids)
//! - Conflict resolution between a local record and its remote counterpart
//! - In-memory implementations of both stores
//!
//! ## Record lifecycle
//!
//! ```text
//! new_local ──► PENDING_CREATE ──create ok──► SYNCED ──edit──► PENDING_UPDATE
//!                     ▲   │                      ▲                  │
//!                     └───┘ create failed        └────update ok─────┘
//! ```
//!
//! The engine never deletes records. Deletion is an explicit local operation
//! outside the reconciliation loop.
//!
//! ## Key Invariants
//!
//! - A record is always in exactly one [`SyncStatus`]
//! - `PENDING_CREATE` records have never been acknowledged remotely
//! - `PENDING_UPDATE` records have a remote counterpart
//! - Record ids are client-authoritative and survive the create round-trip

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
pub mod conflict;
mod error;
pub mod memory;
mod record;
mod remote;
mod store;
mod types;

pub use clock::{Clock, SystemClock};
pub use conflict::{merge, resolve, ConflictResolver, DefaultResolver, Resolution};
pub use error::{RemoteError, RemoteResult, StoreError, StoreResult};
pub use memory::{MemoryLocalStore, MemoryRemoteStore};
pub use record::{Payload, Record, RemoteRecord};
pub use remote::RemoteStore;
pub use store::LocalStore;
pub use types::{RecordId, Scope, SyncStatus, Timestamp};

/// Version of the recsync core crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
