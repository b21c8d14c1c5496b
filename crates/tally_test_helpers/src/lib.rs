//! Shared test utilities for Tally test suites
//!
//! # Modules
//!
//! - [`workspace`]: temporary workspaces with a `.tally/config.toml`
//! - [`cli`]: `tally` command builders with a clean environment
//! - [`logging`]: test logging configuration
//! - [`fixtures`]: rating and completion record builders
//!
//! # Example
//!
//! ```rust
//! use tally_test_helpers::prelude::*;
//!
//! let ratings = vec![
//!     rating(1, "a@x.com", 2, at(2026, 10, 19, 9)),
//!     rating(2, "a@x.com", -1, at(2026, 9, 14, 9)),
//! ];
//! assert_eq!(ratings.len(), 2);
//! ```

pub mod cli;
pub mod fixtures;
pub mod logging;
pub mod workspace;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cli::tally_command;
    pub use crate::fixtures::{at, completion, penalty, rating, rating_named};
    pub use crate::logging::{init_test_logging, suppress_logs};
    pub use crate::workspace::{init_workspace, temp_dir, workspace_with_config, UNREACHABLE_URL};
}
