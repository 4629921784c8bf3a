use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

use crate::{
    provider::openweather::DEFAULT_BASE_URL,
    rate_limit::{DEFAULT_MAX_CALLS, DEFAULT_WINDOW_SECS, RateLimitPolicy},
};

pub const API_KEY_ENV: &str = "OPENWEATHERMAP_API_KEY";
pub const DEFAULT_CITY: &str = "San Francisco";

/// Rate limiting of provider calls. Off unless explicitly enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub max_calls: u32,
    pub window_secs: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { enabled: false, max_calls: DEFAULT_MAX_CALLS, window_secs: DEFAULT_WINDOW_SECS }
    }
}

impl RateLimitConfig {
    pub fn policy(&self) -> RateLimitPolicy {
        RateLimitPolicy {
            max_calls: self.max_calls,
            window: chrono::Duration::seconds(self.window_secs.max(1)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub debounce_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { debounce_ms: 300 }
    }
}

/// Where "my location" is, for hosts without a positioning service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub timeout_secs: u64,
    pub high_accuracy: bool,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self { lat: None, lon: None, timeout_secs: 10, high_accuracy: true }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// default_city = "San Francisco"
///
/// [rate_limit]
/// enabled = true
/// max_calls = 10
/// window_secs = 3600
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub default_city: String,
    pub request_timeout_secs: u64,
    pub rate_limit: RateLimitConfig,
    pub search: SearchConfig,
    pub location: LocationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            default_city: DEFAULT_CITY.to_string(),
            request_timeout_secs: 10,
            rate_limit: RateLimitConfig::default(),
            search: SearchConfig::default(),
            location: LocationConfig::default(),
        }
    }
}

impl Config {
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.api_key = Some(api_key.trim().to_string());
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search.debounce_ms)
    }

    /// Overrides the stored key with `OPENWEATHERMAP_API_KEY` when present.
    pub fn with_env_overrides(mut self) -> Self {
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => self.set_api_key(key),
            _ => {}
        }
        self
    }

    /// Load config from disk, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        Self::load_from(&path).map(Self::with_env_overrides)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }
}

pub fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "weatherdash", "weatherdash")
        .ok_or_else(|| anyhow!("Could not determine platform config directory"))
}
