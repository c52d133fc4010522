//! Configuration loading for feedhub.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/feedhub/config.toml.

use config::{Config, Environment, File};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::TypesError;

/// Block compression used for the record and index column families.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    /// No compression
    None,
    /// LZ4 (fast, moderate ratio)
    Lz4,
    /// Zstandard (default)
    #[default]
    Zstd,
}

/// Tuning knobs for the embedded store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Maximum number of concurrent background flush/compaction jobs
    #[serde(default = "default_max_background_jobs")]
    pub max_background_jobs: i32,

    /// Block compression for record and index data
    #[serde(default)]
    pub compression: Compression,
}

fn default_max_background_jobs() -> i32 {
    2
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            max_background_jobs: default_max_background_jobs(),
            compression: Compression::default(),
        }
    }
}

impl StorageSettings {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_background_jobs < 1 {
            return Err(format!(
                "max_background_jobs must be >= 1, got {}",
                self.max_background_jobs
            ));
        }
        Ok(())
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path to the store directory
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Embedded store tuning
    #[serde(default)]
    pub storage: StorageSettings,
}

fn default_db_path() -> String {
    ProjectDirs::from("", "", "feedhub")
        .map(|p| p.data_local_dir().join("db"))
        .unwrap_or_else(|| PathBuf::from("./data"))
        .to_string_lossy()
        .to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_level: default_log_level(),
            storage: StorageSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/feedhub/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (FEEDHUB_*)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, TypesError> {
        let config_dir = ProjectDirs::from("", "", "feedhub")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("db_path", default_db_path())
            .map_err(|e| TypesError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| TypesError::Config(e.to_string()))?
            .set_default(
                "storage.max_background_jobs",
                default_max_background_jobs() as i64,
            )
            .map_err(|e| TypesError::Config(e.to_string()))?
            .set_default("storage.compression", "zstd")
            .map_err(|e| TypesError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // FEEDHUB_DB_PATH, FEEDHUB_LOG_LEVEL, FEEDHUB_STORAGE__COMPRESSION, ...
        builder = builder.add_source(
            Environment::with_prefix("FEEDHUB")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| TypesError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| TypesError::Config(e.to_string()))?;

        settings.storage.validate().map_err(TypesError::Config)?;
        Ok(settings)
    }

    /// Expand ~ in db_path to the actual home directory
    pub fn expanded_db_path(&self) -> PathBuf {
        if let Some(rest) = self.db_path.strip_prefix("~/") {
            if let Some(dirs) = BaseDirs::new() {
                return dirs.home_dir().join(rest);
            }
        }
        PathBuf::from(&self.db_path)
    }
}
