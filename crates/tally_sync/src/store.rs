//! Durable client-local key/value store
//!
//! One JSON document on disk holding every local key: the connectivity
//! flag, the cached session, per-identity queues and profile caches.
//! State is loaded once by [`LocalStore::open`], written through on every
//! mutation and flushed explicitly on shutdown.
//!
//! Persistence failures are logged and swallowed: the in-memory state stays
//! authoritative for the rest of the process but will not survive a restart.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Well-known keys
pub mod keys {
    pub const CONNECTION_STATE: &str = "connectionState";
    pub const OFFLINE_SESSION: &str = "offlineSession";
    pub const DAILY_TRACKER: &str = "dailyTracker";

    const PENDING_PREFIX: &str = "pending_";
    const PROFILE_PREFIX: &str = "profile_";

    pub fn pending(email: &str) -> String {
        format!("{}{}", PENDING_PREFIX, email)
    }

    pub fn profile(email: &str) -> String {
        format!("{}{}", PROFILE_PREFIX, email)
    }

    pub fn pending_owner(key: &str) -> Option<&str> {
        key.strip_prefix(PENDING_PREFIX)
    }

    pub fn pending_prefix() -> &'static str {
        PENDING_PREFIX
    }
}

#[derive(Debug, Default)]
struct StoreState {
    path: Option<PathBuf>,
    entries: BTreeMap<String, Value>,
}

/// Shared handle to the local store; clones see the same state
#[derive(Debug, Clone, Default)]
pub struct LocalStore {
    inner: Arc<Mutex<StoreState>>,
}

impl LocalStore {
    /// Load the store at `path`; a missing or unreadable file starts empty
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read(&path) {
            Ok(data) => match serde_json::from_slice::<BTreeMap<String, Value>>(&data) {
                Ok(entries) => {
                    tracing::debug!("Loaded {} local keys from {:?}", entries.len(), path);
                    entries
                }
                Err(e) => {
                    tracing::warn!("Local state at {:?} is corrupt, starting fresh: {}", path, e);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                tracing::warn!("Failed to read local state {:?}: {}", path, e);
                BTreeMap::new()
            }
        };

        Self {
            inner: Arc::new(Mutex::new(StoreState {
                path: Some(path),
                entries,
            })),
        }
    }

    /// A store that never touches the disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        // A panic mid-update leaves plain data behind; keep using it
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.lock().path.clone()
    }

    /// Read a key; a value of the wrong shape reads as absent
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let state = self.lock();
        let value = state.entries.get(key)?.clone();
        drop(state);

        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("Ignoring malformed local value for {}: {}", key, e);
                None
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().entries.contains_key(key)
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) {
        let value = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("Failed to serialize local value for {}: {}", key, e);
                return;
            }
        };

        let mut state = self.lock();
        state.entries.insert(key.to_string(), value);
        persist(&state);
    }

    pub fn remove(&self, key: &str) {
        let mut state = self.lock();
        if state.entries.remove(key).is_some() {
            persist(&state);
        }
    }

    /// Read-modify-write of one key under a single lock
    ///
    /// Returning `None` from `f`'s output slot removes the key.
    pub fn update<T, R>(&self, key: &str, f: impl FnOnce(&mut Option<T>) -> R) -> R
    where
        T: Serialize + DeserializeOwned,
    {
        let mut state = self.lock();
        let mut current: Option<T> = state
            .entries
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok());

        let result = f(&mut current);

        match current.map(|v| serde_json::to_value(&v)) {
            Some(Ok(value)) => {
                state.entries.insert(key.to_string(), value);
            }
            Some(Err(e)) => {
                tracing::error!("Failed to serialize local value for {}: {}", key, e);
                return result;
            }
            None => {
                state.entries.remove(key);
            }
        }
        persist(&state);
        result
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.lock()
            .entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Write the current state to disk, reporting failure
    pub fn flush(&self) -> std::io::Result<()> {
        let state = self.lock();
        match &state.path {
            Some(path) => write_atomically(path, &state.entries),
            None => Ok(()),
        }
    }
}

fn persist(state: &StoreState) {
    if let Some(path) = &state.path {
        if let Err(e) = write_atomically(path, &state.entries) {
            tracing::error!("Failed to persist local state to {:?}: {}", path, e);
        }
    }
}

fn write_atomically(path: &Path, entries: &BTreeMap<String, Value>) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_vec_pretty(entries)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)
}
