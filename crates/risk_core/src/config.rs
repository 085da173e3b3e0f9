//! Service configuration
//!
//! Resolution order: built-in defaults, then an optional TOML file, then
//! `PET_RISK_*` environment variables.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_CONFIG: &str = "PET_RISK_CONFIG";
pub const ENV_MODELS_DIR: &str = "PET_RISK_MODELS_DIR";
pub const ENV_SERVICE_VERSION: &str = "PET_RISK_SERVICE_VERSION";
pub const ENV_LOG_LEVEL: &str = "PET_RISK_LOG_LEVEL";
pub const ENV_JSON_LOGS: &str = "PET_RISK_JSON_LOGS";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {var}: {value}")]
    InvalidEnv { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Directory holding versioned artifact sets
    pub models_dir: PathBuf,
    /// Reported in every prediction response
    pub service_version: String,
    pub log_level: String,
    pub json_logs: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("models"),
            service_version: "1.0.0".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl ServiceConfig {
    /// Defaults, then `PET_RISK_CONFIG` if set, then environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match env::var_os(ENV_CONFIG) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(|var| env::var(var).ok())?;
        Ok(config)
    }

    /// Load from a TOML file; absent keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply overrides from a variable lookup.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(dir) = lookup(ENV_MODELS_DIR) {
            self.models_dir = PathBuf::from(dir);
        }
        if let Some(version) = lookup(ENV_SERVICE_VERSION) {
            self.service_version = version;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
        if let Some(value) = lookup(ENV_JSON_LOGS) {
            self.json_logs = parse_flag(&value).ok_or(ConfigError::InvalidEnv {
                var: ENV_JSON_LOGS,
                value,
            })?;
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
