//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::format::RED_NAN;
use crate::reader::{FailBehavior, ReadOptions};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub reader: ReaderConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Range reader configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ReaderConfig {
    /// Value written where a time query finds no stored data
    #[serde(default = "default_sentinel")]
    pub sentinel: i32,

    /// Log failed reads at error level
    #[serde(default = "default_report_failures")]
    pub report_failures: bool,
}

fn default_sentinel() -> i32 {
    RED_NAN
}

fn default_report_failures() -> bool {
    true
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            sentinel: default_sentinel(),
            report_failures: default_report_failures(),
        }
    }
}

impl ReaderConfig {
    pub fn read_options(&self) -> ReadOptions {
        ReadOptions {
            sentinel: self.sentinel,
            on_fail: if self.report_failures {
                FailBehavior::Report
            } else {
                FailBehavior::Silent
            },
        }
    }
}

impl From<&ReaderConfig> for ReadOptions {
    fn from(config: &ReaderConfig) -> Self {
        config.read_options()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("mefts").join("config.toml")),
            Some(PathBuf::from("/etc/mefts/config.toml")),
            Some(PathBuf::from("./mefts.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        // Fall back to environment-only config
        tracing::debug!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Reader overrides
        if let Some(sentinel) = lookup("MEFTS_SENTINEL") {
            match sentinel.parse() {
                Ok(v) => self.reader.sentinel = v,
                Err(_) => tracing::warn!("Ignoring MEFTS_SENTINEL={:?}: not an i32", sentinel),
            }
        }
        if let Some(report) = lookup("MEFTS_REPORT_FAILURES") {
            if let Ok(v) = report.parse() {
                self.reader.report_failures = v;
            }
        }

        // Logging overrides
        if let Some(level) = lookup("MEFTS_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("MEFTS_LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Some(file) = lookup("MEFTS_LOG_FILE") {
            self.logging.file = Some(file);
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# mefts Configuration
#
# Environment variables override these settings:
# - MEFTS_SENTINEL
# - MEFTS_REPORT_FAILURES
# - MEFTS_LOG_LEVEL
# - MEFTS_LOG_FORMAT
# - MEFTS_LOG_FILE

[reader]
# Value written where a time query finds no stored data (i32::MIN)
sentinel = -2147483648

# Log failed reads at error level
report_failures = true

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/mefts/mefts.log"
"#
    .to_string()
}
