//! End-to-end tests of the `recsync` binary against JSON store files.

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn local(&self) -> PathBuf {
        self.dir.path().join("local.json")
    }

    fn remote(&self) -> PathBuf {
        self.dir.path().join("remote.json")
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_recsync"))
            .arg("--local")
            .arg(self.local())
            .args(args)
            .output()
            .unwrap()
    }

    fn ok(&self, args: &[&str]) -> String {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "recsync {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8(output.stdout).unwrap()
    }

    fn sync(&self, extra: &[&str]) -> String {
        let remote = self.remote();
        let mut args = vec!["sync", "--remote", remote.to_str().unwrap()];
        args.extend_from_slice(extra);
        self.ok(&args)
    }
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn add_then_count_pending() {
    let ws = Workspace::new();
    let id = ws.ok(&["add", "--payload", r#"{"hives": 3}"#]);
    assert!(!id.trim().is_empty());

    assert_eq!(ws.ok(&["pending"]).trim(), "1 items pending");

    let records = read_json(&ws.local());
    assert_eq!(records[0]["id"], id.trim());
    assert_eq!(records[0]["sync_status"], "PENDING_CREATE");
}

#[test]
fn sync_uploads_and_persists_both_sides() {
    let ws = Workspace::new();
    ws.ok(&["add", "--payload", r#"{"n": 1}"#]);
    ws.ok(&["add", "--payload", r#"{"n": 2}"#]);

    let out = ws.sync(&[]);
    assert!(out.contains("SYNCING(33%)"), "{out}");
    assert!(out.contains("SUCCESS(2)"), "{out}");
    assert!(out.contains("0 items pending"), "{out}");

    let remote = read_json(&ws.remote());
    assert_eq!(remote.as_array().unwrap().len(), 2);
    assert_eq!(ws.ok(&["pending"]).trim(), "0 items pending");

    // Nothing left to do
    assert!(ws.sync(&[]).contains("SUCCESS(0)"));
}

#[test]
fn sync_json_summary() {
    let ws = Workspace::new();
    ws.ok(&["add", "--payload", r#"{"n": 1}"#]);

    let summary: Value = serde_json::from_str(&ws.sync(&["--format", "json"])).unwrap();
    assert_eq!(summary["state"], "SUCCESS(1)");
    assert_eq!(summary["uploaded"], 1);
    assert_eq!(summary["downloaded"], 0);
    assert_eq!(summary["pending"], 0);
    assert_eq!(summary["scope"], "default");
}

#[test]
fn edits_of_synced_records_are_uploaded() {
    let ws = Workspace::new();
    let id = ws.ok(&["add", "--payload", r#"{"v": 1}"#]);
    let id = id.trim();
    ws.sync(&[]);

    let out = ws.ok(&["edit", "--id", id, "--payload", r#"{"v": 2}"#]);
    assert!(out.contains("PENDING_UPDATE"), "{out}");

    ws.sync(&["--id", id]);
    let remote = read_json(&ws.remote());
    assert_eq!(remote[0]["payload"]["v"], 2);
    assert_eq!(ws.ok(&["pending"]).trim(), "0 items pending");
}

#[test]
fn remote_records_are_downloaded_per_scope() {
    let ws = Workspace::new();
    ws.ok(&["--scope", "north", "add", "--payload", r#"{"n": 1}"#]);
    ws.ok(&["--scope", "south", "add", "--payload", r#"{"n": 2}"#]);

    // Another client uploads both scopes
    let other = TempDir::new().unwrap();
    let other_local = other.path().join("local.json");
    std::fs::copy(ws.local(), &other_local).unwrap();
    for scope in ["north", "south"] {
        let out = Command::new(env!("CARGO_BIN_EXE_recsync"))
            .args(["--local", other_local.to_str().unwrap(), "--scope", scope])
            .args(["sync", "--remote", ws.remote().to_str().unwrap()])
            .output()
            .unwrap();
        assert!(out.status.success());
    }

    std::fs::remove_file(ws.local()).unwrap();
    let out = ws.sync(&["--scope", "north"]);
    assert!(out.contains("SUCCESS(1)"), "{out}");

    let listed: Value =
        serde_json::from_str(&ws.ok(&["--scope", "north", "list", "--format", "json"])).unwrap();
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["sync_status"], "SYNCED");

    let south: Value =
        serde_json::from_str(&ws.ok(&["--scope", "south", "list", "--format", "json"])).unwrap();
    assert!(south.as_array().unwrap().is_empty());
}

#[test]
fn delete_removes_local_record() {
    let ws = Workspace::new();
    let id = ws.ok(&["add", "--payload", "1"]);
    let out = ws.ok(&["delete", "--id", id.trim()]);
    assert!(out.starts_with("deleted"));
    assert!(ws.ok(&["list"]).contains("0 records"));
}

#[test]
fn invalid_input_is_rejected() {
    let ws = Workspace::new();
    assert!(!ws.run(&["add", "--payload", "{not json"]).status.success());
    assert!(!ws
        .run(&["edit", "--id", "missing", "--payload", "1"])
        .status
        .success());
    assert!(!ws.run(&["list", "--format", "xml"]).status.success());

    let remote = ws.remote();
    let unknown = ws.run(&["sync", "--remote", remote.to_str().unwrap(), "--id", "missing"]);
    assert!(!unknown.status.success());
}

#[test]
fn version() {
    let ws = Workspace::new();
    let out = ws.ok(&["version"]);
    assert!(out.starts_with("recsync CLI v"));
}
