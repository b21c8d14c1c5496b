//! Workspace initialization utilities for tests
//!
//! Provides temporary directories holding a `.tally/` folder so the CLI and
//! the local store can be exercised without touching the user's state.

use assert_fs::TempDir;
use std::fs;

/// Base URL nothing listens on; connections are refused immediately
pub const UNREACHABLE_URL: &str = "http://127.0.0.1:9/api";

/// Create a temporary directory for testing
///
/// The directory will be automatically cleaned up when the `TempDir` is dropped.
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

/// A workspace whose config points at an unreachable backend
///
/// The signed-in user is `tester@x.com`; `boss@x.com` is the admin.
///
/// # Example
///
/// ```rust
/// use tally_test_helpers::workspace::init_workspace;
///
/// let workspace = init_workspace();
/// assert!(workspace.path().join(".tally/config.toml").exists());
/// ```
pub fn init_workspace() -> TempDir {
    workspace_with_config(&format!(
        r#"[remote]
base_url = "{}"
request_timeout_secs = 1

[connectivity]
probe_timeout_ms = 500

[identity]
name = "Test User"
email = "tester@x.com"

[admin]
emails = ["boss@x.com"]
"#,
        UNREACHABLE_URL
    ))
}

/// A workspace with the given `.tally/config.toml` content
pub fn workspace_with_config(config: &str) -> TempDir {
    let temp = temp_dir();
    let tally_dir = temp.path().join(".tally");
    fs::create_dir_all(&tally_dir).expect("Failed to create .tally directory");
    fs::write(tally_dir.join("config.toml"), config).expect("Failed to write config.toml");
    temp
}
