//! Application configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Default tracing filter when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "warn,deepthink=info";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable holds an unusable value
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::InvalidValue {
                key: "log format".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is unset
    pub default_filter: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_filter: DEFAULT_LOG_FILTER.to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding one persisted session per subject
    pub memory_dir: PathBuf,
    /// Directory receiving the final summary reports
    pub results_dir: PathBuf,
    /// Default directory for session exports
    pub exports_dir: PathBuf,
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            memory_dir: PathBuf::from("memory"),
            results_dir: PathBuf::from("results"),
            exports_dir: PathBuf::from("exports"),
            log: LogConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `DEEPTHINK_*` environment variables,
    /// falling back to defaults for anything unset
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`] with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup("DEEPTHINK_MEMORY_DIR") {
            config.memory_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("DEEPTHINK_RESULTS_DIR") {
            config.results_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("DEEPTHINK_EXPORTS_DIR") {
            config.exports_dir = PathBuf::from(dir);
        }
        if let Some(format) = lookup("DEEPTHINK_LOG_FORMAT") {
            config.log.format = format.parse()?;
        }

        Ok(config)
    }
}
