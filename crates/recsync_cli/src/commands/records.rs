//! Offline record commands: add, edit, delete, list, pending.

use super::Format;
use crate::error::{CliError, CliResult};
use recsync_core::{MemoryLocalStore, Payload, Record, RecordId, Scope, SystemClock};
use std::path::Path;
use tracing::{debug, warn};

fn parse_payload(raw: &str) -> CliResult<Payload> {
    serde_json::from_str(raw).map_err(CliError::InvalidPayload)
}

fn find(store: &MemoryLocalStore, scope: &Scope, id: &str) -> CliResult<Record> {
    store
        .get(&RecordId::from(id))
        .filter(|r| &r.scope == scope)
        .ok_or_else(|| CliError::UnknownRecord {
            id: id.to_string(),
            scope: scope.to_string(),
        })
}

/// Creates a record offline and prints its id.
pub fn add(path: &Path, scope: &Scope, payload: &str) -> CliResult<()> {
    let payload = parse_payload(payload)?;
    let store = MemoryLocalStore::load(path)?;
    let record = store.insert_local(scope.clone(), payload, &SystemClock);
    store.save(path)?;
    debug!(%scope, id = %record.id, "record created");
    println!("{}", record.id);
    Ok(())
}

/// Replaces the payload of a record.
pub fn edit(path: &Path, scope: &Scope, id: &str, payload: &str) -> CliResult<()> {
    let payload = parse_payload(payload)?;
    let store = MemoryLocalStore::load(path)?;
    let record = find(&store, scope, id)?;
    let record = store.edit(&record.id, payload, &SystemClock)?;
    store.save(path)?;
    println!("{} {}", record.id, record.sync_status);
    Ok(())
}

/// Removes a record from the local store.
pub fn delete(path: &Path, scope: &Scope, id: &str) -> CliResult<()> {
    let store = MemoryLocalStore::load(path)?;
    let record = find(&store, scope, id)?;
    if record.is_pending() {
        warn!(%scope, %id, status = %record.sync_status, "deleting a record with unsynced changes");
    }
    store.delete(&record.id)?;
    store.save(path)?;
    println!("deleted {}", record.id);
    Ok(())
}

/// Prints the records of a scope.
pub fn list(path: &Path, scope: &Scope, pending_only: bool, format: &str) -> CliResult<()> {
    let format = Format::parse(format)?;
    let store = MemoryLocalStore::load(path)?;
    let records: Vec<Record> = store
        .snapshot()
        .into_iter()
        .filter(|r| &r.scope == scope && (!pending_only || r.is_pending()))
        .collect();

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        Format::Text => {
            for record in &records {
                println!(
                    "{:<38} {:<15} {:>15} {}",
                    record.id.as_str(),
                    record.sync_status.as_str(),
                    record.updated_at.as_millis(),
                    record.payload
                );
            }
            println!("{} records", records.len());
        }
    }
    Ok(())
}

/// Prints how many records are waiting for upload.
pub fn pending(path: &Path, scope: &Scope) -> CliResult<()> {
    let store = MemoryLocalStore::load(path)?;
    println!("{} items pending", store.pending_count(scope));
    Ok(())
}
