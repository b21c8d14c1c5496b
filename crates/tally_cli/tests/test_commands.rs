//! CLI integration tests
//!
//! Every workspace here points at an address nothing listens on, so the
//! commands run in their offline mode.

use assert_fs::TempDir;
use predicates::prelude::*;
use std::fs;
use tally_test_helpers::prelude::*;

/// Seed `.tally/state.json` with a cached session for `tester@x.com`
fn with_cached_session(workspace: &TempDir) {
    let state = serde_json::json!({
        "offlineSession": {
            "user": { "name": "Test User", "email": "tester@x.com" },
            "expires": "2099-01-01T00:00:00Z",
            "timestamp": 1_760_000_000_000_i64
        }
    });
    fs::write(
        workspace.path().join(".tally/state.json"),
        serde_json::to_string(&state).unwrap(),
    )
    .unwrap();
}

fn read_state(workspace: &TempDir) -> serde_json::Value {
    let content = fs::read_to_string(workspace.path().join(".tally/state.json")).unwrap();
    serde_json::from_str(&content).unwrap()
}

#[test]
fn test_tally_help() {
    tally_command()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Tally"));
}

#[test]
fn test_tally_version() {
    tally_command()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.1.0"));
}

#[test]
fn test_tally_init() {
    let temp = temp_dir();

    tally_command()
        .current_dir(temp.path())
        .arg("init")
        .assert()
        .success()
        .stderr(predicate::str::contains("Workspace initialized"));

    assert!(temp.path().join(".tally/config.toml").exists());
    let gitignore = fs::read_to_string(temp.path().join(".gitignore")).unwrap();
    assert!(gitignore.contains(".tally/state.json"));
}

#[test]
fn test_tally_init_already_initialized() {
    let temp = temp_dir();

    tally_command()
        .current_dir(temp.path())
        .arg("init")
        .assert()
        .success();

    tally_command()
        .current_dir(temp.path())
        .arg("init")
        .assert()
        .success()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_invalid_command() {
    tally_command()
        .arg("nonexistent")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_score_out_of_range() {
    let workspace = init_workspace();

    tally_command()
        .current_dir(workspace.path())
        .args(["rate", "1234", "5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Score out of range"));
}

#[test]
fn test_session_offline_without_cache_is_pending() {
    let workspace = init_workspace();

    tally_command()
        .current_dir(workspace.path())
        .arg("session")
        .assert()
        .success()
        .stdout(predicate::str::contains("Sign-in pending"));
}

#[test]
fn test_session_offline_uses_cache() {
    let workspace = init_workspace();
    with_cached_session(&workspace);

    tally_command()
        .current_dir(workspace.path())
        .arg("session")
        .assert()
        .success()
        .stdout(predicate::str::contains("Signed in as Test User <tester@x.com>"))
        .stderr(predicate::str::contains("Offline"));
}

#[test]
fn test_rate_offline_without_session_fails() {
    let workspace = init_workspace();

    tally_command()
        .current_dir(workspace.path())
        .args(["rate", "1234", "2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("sign-in pending"));
}

#[test]
fn test_rate_offline_is_queued() {
    let workspace = init_workspace();
    with_cached_session(&workspace);

    tally_command()
        .current_dir(workspace.path())
        .args(["rate", "1234", "-1"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Saved locally"));

    let state = read_state(&workspace);
    let queued = state["pending_tester@x.com"].as_array().unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0]["mutation"]["customerNumber"], "1234");
    assert_eq!(state["connectionState"], "false");

    tally_command()
        .current_dir(workspace.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("tester@x.com: 1 queued"));
}

#[test]
fn test_rate_rejects_non_numeric_reference() {
    let workspace = init_workspace();
    with_cached_session(&workspace);

    tally_command()
        .current_dir(workspace.path())
        .args(["rate", "12a", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Please enter numbers only"));

    let state = read_state(&workspace);
    assert!(state.get("pending_tester@x.com").is_none());
}

#[test]
fn test_leaderboard_requires_admin() {
    let workspace = init_workspace();
    with_cached_session(&workspace);

    tally_command()
        .current_dir(workspace.path())
        .arg("leaderboard")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not an admin"));
}

#[test]
fn test_ratings_offline_json_error() {
    let workspace = init_workspace();
    with_cached_session(&workspace);

    tally_command()
        .current_dir(workspace.path())
        .args(["ratings", "--json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"OFFLINE\""));
}

#[test]
fn test_profile_name_offline() {
    let workspace = init_workspace();
    with_cached_session(&workspace);

    tally_command()
        .current_dir(workspace.path())
        .args(["profile", "--name", "Solo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("full name"));

    tally_command()
        .current_dir(workspace.path())
        .args(["profile", "--name", "Test User"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Name:  Test User"))
        .stderr(predicate::str::contains("Saved locally"));
}

#[test]
fn test_sync_offline_keeps_queue() {
    let workspace = init_workspace();
    with_cached_session(&workspace);

    tally_command()
        .current_dir(workspace.path())
        .args(["rate", "42", "0"])
        .assert()
        .success();

    tally_command()
        .current_dir(workspace.path())
        .arg("sync")
        .assert()
        .success()
        .stderr(predicate::str::contains("1 writes remain queued"));
}
