//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (ROAMSYNC_*)
//! 2. TOML config file (if ROAMSYNC_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// What a reconciliation pass does with local actions whose replay failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailedActionPolicy {
    /// Keep failed actions for the next pass; move them to the dead-letter
    /// list after `max_replay_attempts` failures.
    #[default]
    Retain,
    /// Clear the whole local log at the end of every pass.
    Discard,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (ROAMSYNC_*)
/// 2. TOML config file (if ROAMSYNC_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the local SQLite database.
    ///
    /// Set via ROAMSYNC_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Base URL of the remote data backend (e.g. `https://project.example.co`).
    ///
    /// Set via ROAMSYNC_BACKEND_URL environment variable.
    #[serde(default)]
    pub backend_url: Option<String>,

    /// API key sent to the remote backend.
    ///
    /// Set via ROAMSYNC_API_KEY environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Id of the signed-in user that queued actions belong to.
    ///
    /// Set via ROAMSYNC_USER_ID environment variable.
    #[serde(default)]
    pub user_id: Option<String>,

    /// Remote request timeout in milliseconds.
    ///
    /// Set via ROAMSYNC_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// TTL for reference/catalog data (missions, places).
    ///
    /// Set via ROAMSYNC_CATALOG_TTL_MS environment variable.
    #[serde(default = "default_catalog_ttl_ms")]
    pub catalog_ttl_ms: u64,

    /// TTL for user-progress snapshots.
    ///
    /// Set via ROAMSYNC_PROGRESS_TTL_MS environment variable.
    #[serde(default = "default_progress_ttl_ms")]
    pub progress_ttl_ms: u64,

    /// Handling of actions whose replay failed.
    ///
    /// Set via ROAMSYNC_FAILED_ACTIONS environment variable (`retain` or `discard`).
    #[serde(default)]
    pub failed_actions: FailedActionPolicy,

    /// Failed passes an action survives before it is dead-lettered.
    ///
    /// Set via ROAMSYNC_MAX_REPLAY_ATTEMPTS environment variable.
    #[serde(default = "default_max_replay_attempts")]
    pub max_replay_attempts: u32,

    /// Seconds between expired-cache sweeps; 0 disables the sweep.
    ///
    /// Set via ROAMSYNC_CACHE_SWEEP_INTERVAL_SECS environment variable.
    #[serde(default = "default_cache_sweep_interval_secs")]
    pub cache_sweep_interval_secs: u64,

    /// Connectivity assumed at startup until the host reports otherwise.
    ///
    /// Set via ROAMSYNC_ASSUME_ONLINE environment variable.
    #[serde(default = "default_true")]
    pub assume_online: bool,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./roamsync.sqlite")
}

fn default_timeout_ms() -> u64 {
    15_000
}

fn default_catalog_ttl_ms() -> u64 {
    24 * 60 * 60 * 1000
}

fn default_progress_ttl_ms() -> u64 {
    30 * 60 * 1000
}

fn default_max_replay_attempts() -> u32 {
    3
}

fn default_cache_sweep_interval_secs() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            backend_url: None,
            api_key: None,
            user_id: None,
            timeout_ms: default_timeout_ms(),
            catalog_ttl_ms: default_catalog_ttl_ms(),
            progress_ttl_ms: default_progress_ttl_ms(),
            failed_actions: FailedActionPolicy::default(),
            max_replay_attempts: default_max_replay_attempts(),
            cache_sweep_interval_secs: default_cache_sweep_interval_secs(),
            assume_online: true,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn catalog_ttl(&self) -> Duration {
        Duration::from_millis(self.catalog_ttl_ms)
    }

    pub fn progress_ttl(&self) -> Duration {
        Duration::from_millis(self.progress_ttl_ms)
    }

    /// Sweep interval, or None when the sweep is disabled.
    pub fn cache_sweep_interval(&self) -> Option<Duration> {
        (self.cache_sweep_interval_secs > 0).then(|| Duration::from_secs(self.cache_sweep_interval_secs))
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `ROAMSYNC_`
    /// 2. TOML file from `ROAMSYNC_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("ROAMSYNC_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("ROAMSYNC_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Backend URL, required before any remote call can be made.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the backend URL is not set.
    pub fn require_backend_url(&self) -> Result<&str, ConfigError> {
        self.backend_url.as_deref().ok_or_else(|| ConfigError::Missing {
            field: "backend_url".into(),
            hint: "Set ROAMSYNC_BACKEND_URL environment variable".into(),
        })
    }

    /// User id that scopes the action queue and its remote mirror.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the user id is not set.
    pub fn require_user_id(&self) -> Result<&str, ConfigError> {
        self.user_id.as_deref().ok_or_else(|| ConfigError::Missing {
            field: "user_id".into(),
            hint: "Set ROAMSYNC_USER_ID environment variable".into(),
        })
    }
}
