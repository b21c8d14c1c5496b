//! # Tally Sync
//!
//! Offline-tolerant plumbing between the rating UI and the persistence
//! boundary.
//!
//! ## Architecture
//!
//! - **Local store**: durable key/value state shared by every component
//! - **Session cache**: the last confirmed identity, valid for 7 days offline
//! - **Mutation queue**: per-identity list of writes made while offline
//! - **Connectivity monitor**: debounced reachability checks with a persisted flag
//! - **Reconciler**: replays queued writes in order when connectivity returns
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tally_sync::{SyncConfig, SyncEngine};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = SyncConfig {
//!         base_url: "http://localhost:3000/api".to_string(),
//!         ..Default::default()
//!     };
//!
//!     let mut engine = SyncEngine::new(config)?;
//!     engine.start();
//!     // ... submit ratings through engine.client() ...
//!     engine.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod connectivity;
pub mod engine;
pub mod queue;
pub mod reconciler;
pub mod remote;
pub mod session;
pub mod store;

pub use client::{
    DecisionReport, ProfileSource, ProfileView, QueueReason, RatingClient, Submission,
};
pub use config::SyncConfig;
pub use connectivity::{
    Connectivity, ConnectivityMonitor, Debouncer, HttpProbe, MonitorHandle, Probe, Signal,
};
pub use engine::SyncEngine;
pub use queue::{Mutation, MutationQueue, PendingMutation};
pub use reconciler::{SyncReconciler, SyncReport};
pub use remote::{HttpRemote, Remote};
pub use session::{CachedSession, SessionCache, SessionStatus};
pub use store::LocalStore;

/// Common result type for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur during sync operations
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("unexpected response shape from {endpoint}: {message}")]
    Shape { endpoint: String, message: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("offline: {0} needs a connection")]
    Offline(&'static str),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] anyhow::Error),

    #[error(transparent)]
    Core(#[from] tally_common::TallyError),
}

impl SyncError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::Server { status: 404, .. })
    }
}
