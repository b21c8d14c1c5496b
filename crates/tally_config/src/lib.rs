//! Configuration management for Tally
//!
//! This crate handles loading `.tally/config.toml`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tally_common::{Identity, Result, TallyError};

/// Directory holding config and local state, relative to the workspace root
pub const TALLY_DIR: &str = ".tally";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Workspace root path (set programmatically, not in TOML)
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub connectivity: ConnectivityConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub store: StoreConfig,

    /// Signed-in user
    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Persistence boundary ([remote])
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:3000/api".to_string()
}
fn default_request_timeout() -> u64 {
    10
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Connectivity monitor ([connectivity])
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "default_recheck_interval")]
    pub recheck_interval_secs: u64,
}

fn default_probe_timeout_ms() -> u64 {
    3000
}
fn default_debounce_ms() -> u64 {
    2000
}
fn default_recheck_interval() -> u64 {
    30
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: default_probe_timeout_ms(),
            debounce_ms: default_debounce_ms(),
            recheck_interval_secs: default_recheck_interval(),
        }
    }
}

/// Offline session cache ([session])
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_ttl_days")]
    pub ttl_days: u64,
}

fn default_ttl_days() -> u64 {
    7
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_days: default_ttl_days(),
        }
    }
}

/// Local durable state ([store])
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Relative paths resolve against the workspace root
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(TALLY_DIR).join("state.json")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// Identity configuration ([identity])
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IdentityConfig {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub image: Option<String>,
}

/// Admin configuration ([admin])
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AdminConfig {
    #[serde(default)]
    pub emails: Vec<String>,
}

impl ConnectivityConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn recheck_interval(&self) -> Duration {
        Duration::from_secs(self.recheck_interval_secs)
    }
}

impl Config {
    /// Load configuration from workspace root
    pub fn load(workspace_root: &Path) -> Result<Self> {
        let config_path = Self::path_in(workspace_root);

        if !config_path.exists() {
            return Ok(Self {
                root: workspace_root.to_path_buf(),
                ..Self::default()
            });
        }

        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| TallyError::ConfigError(format!("Failed to read config: {}", e)))?;

        Self::from_toml_str(&content, workspace_root)
    }

    pub fn from_toml_str(content: &str, workspace_root: &Path) -> Result<Self> {
        let mut config: Config = toml::from_str(content)
            .map_err(|e| TallyError::ConfigError(format!("Failed to parse config: {}", e)))?;

        config.root = workspace_root.to_path_buf();
        Ok(config)
    }

    /// Location of the config file under a workspace root
    pub fn path_in(workspace_root: &Path) -> PathBuf {
        workspace_root.join(TALLY_DIR).join("config.toml")
    }

    /// Absolute location of the local state file
    pub fn store_path(&self) -> PathBuf {
        if self.store.path.is_absolute() {
            self.store.path.clone()
        } else {
            self.root.join(&self.store.path)
        }
    }

    /// The configured signed-in user, if any
    pub fn identity(&self) -> Option<Identity> {
        let email = self.identity.email.trim();
        if email.is_empty() {
            return None;
        }
        let name = self.identity.name.trim();
        Some(Identity {
            name: (!name.is_empty()).then(|| name.to_string()),
            email: email.to_string(),
            image: self.identity.image.clone(),
        })
    }

    pub fn is_admin(&self, email: &str) -> bool {
        self.admin
            .emails
            .iter()
            .any(|admin| admin.eq_ignore_ascii_case(email))
    }
}

/// Starter config written by `tally init`
pub const DEFAULT_CONFIG_TOML: &str = r#"# Tally Configuration

[remote]
base_url = "http://localhost:3000/api"
request_timeout_secs = 10

[connectivity]
probe_timeout_ms = 3000
debounce_ms = 2000
recheck_interval_secs = 30

[session]
ttl_days = 7

[store]
path = ".tally/state.json"

[identity]
name = ""
email = ""

[admin]
emails = []
"#;
