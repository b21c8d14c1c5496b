//! CLI command builders for tests

use assert_cmd::Command;

/// Get a Command for the `tally` binary with clean environment
///
/// This command is pre-configured with:
/// - `RUST_LOG=error` to suppress INFO/DEBUG logs in tests
/// - `TALLY_WORKSPACE` removed so the working directory decides the workspace
#[allow(deprecated)]
pub fn tally_command() -> Command {
    let mut cmd = Command::cargo_bin("tally").expect("Failed to find tally binary");
    cmd.env("RUST_LOG", "error");
    cmd.env_remove("TALLY_WORKSPACE");
    cmd
}
