//! Key/value persistence backends.
//!
//! Every piece of client state (favorites, rate-limit window, preferences)
//! lives under its own key as a JSON string and is rewritten wholesale on
//! change. Reads never fail the caller: absent or unreadable values come back
//! as `None` / the type's default.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::{Serialize, de::DeserializeOwned};
use std::{collections::HashMap, fmt::Debug, fs, path::PathBuf};
use tracing::{debug, warn};

pub const FAVORITES_KEY: &str = "weather-favorites";
pub const RATE_LIMIT_KEY: &str = "weather-api-calls";
pub const LOCATION_PERMISSION_KEY: &str = "weather-location-permission";
pub const UNIT_KEY: &str = "weather-unit";
pub const THEME_KEY: &str = "weather-theme";

pub trait KeyValueStore: Send + Sync + Debug {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Reads and parses `key`, treating absence and parse failures alike.
pub fn load_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = store.get(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "Discarding unreadable stored value");
            None
        }
    }
}

pub fn save_json<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) {
    match serde_json::to_string(value) {
        Ok(json) => store.set(key, &json),
        Err(e) => warn!(key, error = %e, "Failed to serialize value for storage"),
    }
}

/// In-process store, used by tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries.lock().insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.lock().remove(key);
    }
}

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted in the platform data directory.
    pub fn open_default() -> Result<Self> {
        let dirs = crate::config::project_dirs()?;
        Ok(Self::new(dirs.data_dir()))
    }

    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create data directory: {}", self.dir.display()))?;

        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Some(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read stored value");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) {
        match self.write(key, value) {
            Ok(()) => debug!(key, "Persisted value"),
            Err(e) => warn!(key, error = %e, "Failed to persist value"),
        }
    }

    fn remove(&self, key: &str) {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove stored value"),
        }
    }
}
