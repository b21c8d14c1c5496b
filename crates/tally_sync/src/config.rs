//! Configuration for the sync engine

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use crate::session::MAX_TTL_DAYS;
use tally_config::Config;

/// Configuration for the sync engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Persistence boundary base URL, e.g. `http://localhost:3000/api`
    pub base_url: String,

    /// Timeout for ordinary requests
    pub request_timeout: Duration,

    /// Timeout for the reachability probe (default: 3 seconds)
    pub probe_timeout: Duration,

    /// Quiet period after a platform signal before probing (default: 2 seconds)
    pub debounce: Duration,

    /// Periodic re-verification interval (default: 30 seconds)
    pub recheck_interval: Duration,

    /// How long a cached session stays usable offline (default: 7 days)
    pub session_ttl_days: u64,

    /// Local state file
    pub store_path: PathBuf,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".to_string(),
            request_timeout: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(3),
            debounce: Duration::from_secs(2),
            recheck_interval: Duration::from_secs(30),
            session_ttl_days: 7,
            store_path: PathBuf::from(".tally/state.json"),
        }
    }
}

impl SyncConfig {
    /// Derive sync settings from a loaded workspace config
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.remote.base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(config.remote.request_timeout_secs),
            probe_timeout: config.connectivity.probe_timeout(),
            debounce: config.connectivity.debounce(),
            recheck_interval: config.connectivity.recheck_interval(),
            session_ttl_days: config.session.ttl_days,
            store_path: config.store_path(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            anyhow::bail!("base_url must start with http:// or https://");
        }
        if self.probe_timeout.is_zero() {
            anyhow::bail!("probe timeout must be greater than zero");
        }
        if self.recheck_interval.is_zero() {
            anyhow::bail!("recheck interval must be greater than zero");
        }
        if self.session_ttl_days == 0 || self.session_ttl_days > MAX_TTL_DAYS {
            anyhow::bail!("session ttl_days must be between 1 and {}", MAX_TTL_DAYS);
        }
        Ok(())
    }

    pub fn healthcheck_url(&self) -> String {
        format!("{}/healthcheck", self.base_url)
    }
}
