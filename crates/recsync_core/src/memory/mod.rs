//! In-memory store implementations.
//!
//! Both stores keep their data behind `parking_lot` locks and can be
//! snapshotted to and restored from JSON files, which is how the CLI
//! persists state between invocations.

mod local;
mod remote;

pub use local::MemoryLocalStore;
pub use remote::MemoryRemoteStore;

use crate::error::StoreResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Reads a JSON array from `path`, returning an empty list if the file does
/// not exist yet.
fn read_json_list<T: DeserializeOwned>(path: &Path) -> StoreResult<Vec<T>> {
    match std::fs::read(path) {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Writes `items` as pretty-printed JSON, replacing the file atomically.
fn write_json_list<T: Serialize>(path: &Path, items: &[T]) -> StoreResult<()> {
    let bytes = serde_json::to_vec_pretty(items)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
