//! CLI Integration Tests
//!
//! These tests run the built `patricia` binary end-to-end against a store
//! file in a temporary directory.
//!
//! Run with:
//! ```bash
//! cargo test --test cli_integration
//! ```

use std::process::Command;
use tempfile::tempdir;

/// Run patricia and return (stdout, stderr, success)
fn run_patricia(args: &[&str], db_path: &str) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_patricia"))
        .args(["-d", db_path, "-f", "json"])
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute patricia");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

fn json(stdout: &str) -> serde_json::Value {
    serde_json::from_str(stdout.trim()).expect("stdout should be JSON")
}

// ============================================================================
// Store Initialization
// ============================================================================

#[test]
fn test_cli_init_creates_store() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("trie.patricia");
    let db_str = db_path.to_str().unwrap();

    let (stdout, _stderr, success) = run_patricia(&["init"], db_str);

    assert!(success, "init should succeed");
    assert_eq!(json(&stdout)["status"], "ok");
    assert!(db_path.exists(), "store file should be created");

    let (stdout, _, success) = run_patricia(&["root"], db_str);
    assert!(success);
    assert_eq!(json(&stdout)["root"], "0".repeat(64));
}

// ============================================================================
// Key/Value Commands
// ============================================================================

#[test]
fn test_cli_put_get() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("trie.patricia");
    let db_str = db_path.to_str().unwrap();

    run_patricia(&["init"], db_str);
    let (_, _, success) = run_patricia(&["put", "user:alice", "admin"], db_str);
    assert!(success, "put should succeed");
    run_patricia(&["put", "user:bob", "guest"], db_str);

    let (stdout, _, success) = run_patricia(&["get", "user:alice"], db_str);
    assert!(success, "get should succeed");
    assert_eq!(json(&stdout)["value"], "admin");

    let (stdout, _, _) = run_patricia(&["get", "user:bob"], db_str);
    assert_eq!(json(&stdout)["value"], "guest");
}

#[test]
fn test_cli_get_missing_key() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("trie.patricia");
    let db_str = db_path.to_str().unwrap();

    run_patricia(&["init"], db_str);
    run_patricia(&["put", "present", "1"], db_str);

    let (stdout, _, success) = run_patricia(&["get", "absent"], db_str);
    assert!(!success, "get of a missing key should fail");
    assert_eq!(json(&stdout)["status"], "error");
}

#[test]
fn test_cli_delete_restores_root() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("trie.patricia");
    let db_str = db_path.to_str().unwrap();

    run_patricia(&["init"], db_str);
    let (stdout, _, _) = run_patricia(&["put", "k:1", "one"], db_str);
    let first_root = json(&stdout)["root"].clone();

    run_patricia(&["put", "k:2", "two"], db_str);
    let (stdout, _, success) = run_patricia(&["delete", "k:2"], db_str);
    assert!(success, "delete should succeed");
    assert_eq!(json(&stdout)["root"], first_root);

    let (_, _, success) = run_patricia(&["get", "k:2"], db_str);
    assert!(!success, "deleted key should be gone");

    let (_, _, success) = run_patricia(&["delete", "k:2"], db_str);
    assert!(!success, "deleting twice should fail");
}

#[test]
fn test_cli_delete_missing_key_exit_code() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("trie.patricia");
    let db_str = db_path.to_str().unwrap();

    run_patricia(&["init"], db_str);
    run_patricia(&["put", "k:1", "one"], db_str);
    let (stdout, _, _) = run_patricia(&["root"], db_str);
    let before = json(&stdout)["root"].clone();

    let output = Command::new(env!("CARGO_BIN_EXE_patricia"))
        .args(["-d", db_str, "delete", "k:9"])
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute patricia");
    assert_eq!(output.status.code(), Some(1));

    let (stdout, _, success) = run_patricia(&["root"], db_str);
    assert!(success, "store should reopen after a failed delete");
    assert_eq!(json(&stdout)["root"], before);
}

#[test]
fn test_cli_insert_after_delete() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("trie.patricia");
    let db_str = db_path.to_str().unwrap();

    run_patricia(&["init"], db_str);
    run_patricia(&["put", "a1", "v"], db_str);
    run_patricia(&["put", "a3", "w"], db_str);
    run_patricia(&["delete", "a3"], db_str);
    run_patricia(&["put", "a2", "w"], db_str);

    let (stdout, _, success) = run_patricia(&["get", "a2"], db_str);
    assert!(success, "a2 should be readable");
    assert_eq!(json(&stdout)["value"], "w");

    let (_, _, success) = run_patricia(&["get", "a3"], db_str);
    assert!(!success, "a3 stays deleted");

    let (stdout, _, _) = run_patricia(&["list"], db_str);
    let listed = json(&stdout);
    assert_eq!(listed["count"], 2);
    assert_eq!(listed["entries"][0]["key"], "a1");
    assert_eq!(listed["entries"][1]["key"], "a2");
}

#[test]
fn test_cli_list_prefix() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("trie.patricia");
    let db_str = db_path.to_str().unwrap();

    run_patricia(&["init"], db_str);
    run_patricia(&["put", "t:first", "1"], db_str);
    run_patricia(&["put", "t:second", "2"], db_str);
    run_patricia(&["put", "e:edge", "3"], db_str);

    let (stdout, _, success) = run_patricia(&["list", "t:"], db_str);
    assert!(success, "list should succeed");
    let listed = json(&stdout);
    assert_eq!(listed["count"], 2);
    assert_eq!(listed["entries"][0]["key"], "t:first");
    assert_eq!(listed["entries"][1]["key"], "t:second");

    let (stdout, _, _) = run_patricia(&["list"], db_str);
    assert_eq!(json(&stdout)["count"], 3);
}

// ============================================================================
// Node Inspection
// ============================================================================

#[test]
fn test_cli_show_root_node() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("trie.patricia");
    let db_str = db_path.to_str().unwrap();

    run_patricia(&["init"], db_str);
    run_patricia(&["put", "ab", "1"], db_str);
    let (stdout, _, _) = run_patricia(&["put", "ac", "2"], db_str);
    let root = json(&stdout)["root"].as_str().unwrap().to_string();

    let (stdout, _, success) = run_patricia(&["show", &root], db_str);
    assert!(success, "show should succeed");
    let node = json(&stdout);
    assert_eq!(node["kind"], "extension");
    assert_eq!(node["path"], "61");
    assert_eq!(node["hash"], root.as_str());

    let branch = node["value"].as_str().unwrap().to_string();
    let (stdout, _, _) = run_patricia(&["show", &branch], db_str);
    let node = json(&stdout);
    assert_eq!(node["kind"], "branch");
    assert_eq!(node["slots"].as_object().unwrap().len(), 2);
}

#[test]
fn test_cli_show_rejects_bad_digest() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("trie.patricia");
    let db_str = db_path.to_str().unwrap();

    run_patricia(&["init"], db_str);
    let (_, _, success) = run_patricia(&["show", "not-hex"], db_str);
    assert!(!success);
}
