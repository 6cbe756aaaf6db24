//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/nbstore/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/nbstore/` (~/.config/nbstore/)
//! - Data: `$XDG_DATA_HOME/nbstore/` (~/.local/share/nbstore/)
//! - State/Logs: `$XDG_STATE_HOME/nbstore/` (~/.local/state/nbstore/)

use crate::db::UnseenDefaults;
use crate::error::{Error, Result};
use crate::training::BatchPolicy;
use crate::types::CounterDescriptions;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Store location and counter descriptions
    #[serde(default)]
    pub store: StoreConfig,

    /// Batch training behavior
    #[serde(default)]
    pub training: TrainingConfig,

    /// Read-side defaults
    #[serde(default)]
    pub query: QueryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Store configuration
#[derive(Debug, Deserialize, Default)]
pub struct StoreConfig {
    /// Override for the database file (defaults to the XDG data dir)
    pub path: Option<PathBuf>,

    /// Descriptions written to the counters when the store is created
    #[serde(default)]
    pub global_description: String,
    #[serde(default)]
    pub positive_description: String,
    #[serde(default)]
    pub negative_description: String,
}

/// Training configuration
#[derive(Debug, Deserialize, Default)]
pub struct TrainingConfig {
    /// `best_effort` (default) or `fail_fast`
    #[serde(default)]
    pub batch_policy: BatchPolicy,
}

/// Query configuration
#[derive(Debug, Deserialize)]
pub struct QueryConfig {
    /// Count reported for a token never seen under positive
    #[serde(default = "default_unseen_positive")]
    pub unseen_positive: f64,

    /// Count reported for a token never seen under negative
    #[serde(default = "default_unseen_negative")]
    pub unseen_negative: f64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            unseen_positive: default_unseen_positive(),
            unseen_negative: default_unseen_negative(),
        }
    }
}

impl QueryConfig {
    pub fn unseen_defaults(&self) -> UnseenDefaults {
        UnseenDefaults {
            positive: self.unseen_positive,
            negative: self.unseen_negative,
        }
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("query.unseen_positive", self.unseen_positive),
            ("query.unseen_negative", self.unseen_negative),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::Config(format!(
                    "{} must be a positive number, got {}",
                    key, value
                )));
            }
        }
        Ok(())
    }
}

fn default_unseen_positive() -> f64 {
    0.5
}

fn default_unseen_negative() -> f64 {
    1.0
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.query.validate()?;

        Ok(config)
    }

    /// Database file to use: `[store] path` if set, else the XDG default
    pub fn database_path(&self) -> PathBuf {
        self.store
            .path
            .clone()
            .unwrap_or_else(Self::default_database_path)
    }

    /// Counter descriptions from `[store]`
    pub fn descriptions(&self) -> CounterDescriptions {
        CounterDescriptions {
            global: self.store.global_description.clone(),
            positive: self.store.positive_description.clone(),
            negative: self.store.negative_description.clone(),
        }
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/nbstore/config.toml` (~/.config/nbstore/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("nbstore").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    ///
    /// `$XDG_DATA_HOME/nbstore/` (~/.local/share/nbstore/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("nbstore")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/nbstore/` (~/.local/state/nbstore/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("nbstore")
    }

    /// Returns the default database file path
    ///
    /// `$XDG_DATA_HOME/nbstore/counts.db` (~/.local/share/nbstore/counts.db)
    pub fn default_database_path() -> PathBuf {
        Self::data_dir().join("counts.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/nbstore/nbstore.log` (~/.local/state/nbstore/nbstore.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("nbstore.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path behavior
    /// before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_DATA_HOME").is_err() {
            std::env::set_var("XDG_DATA_HOME", home.join(".local/share"));
        }

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}
