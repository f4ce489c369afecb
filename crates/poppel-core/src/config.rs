//! Library and CLI configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/poppel/config.toml)
//! 3. Environment variables (POPPEL_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::persistence::JsonStyle;

/// Environment variable prefix
const ENV_PREFIX: &str = "POPPEL";

/// Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Log filter level for the poppel crates (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log to this file instead of stderr
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Write attribute documents indented
    #[serde(default)]
    pub pretty_attributes: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_file: None,
            pretty_attributes: false,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (POPPEL_LOG_LEVEL, POPPEL_LOG_FILE,
    ///    POPPEL_PRETTY_ATTRIBUTES)
    /// 2. Config file (~/.config/poppel/config.toml or POPPEL_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_LOG_LEVEL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.log_level = val;
            }
        }

        // Empty string clears it
        if let Ok(val) = std::env::var(format!("{}_LOG_FILE", ENV_PREFIX)) {
            self.log_file = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }

        if let Ok(val) = std::env::var(format!("{}_PRETTY_ATTRIBUTES", ENV_PREFIX)) {
            self.pretty_attributes = val.eq_ignore_ascii_case("true") || val == "1";
        }
    }

    /// Layout used when writing attribute documents
    pub fn json_style(&self) -> JsonStyle {
        if self.pretty_attributes {
            JsonStyle::Pretty
        } else {
            JsonStyle::Compact
        }
    }

    /// Get the config file path
    ///
    /// Can be overridden with POPPEL_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("poppel")
            .join("config.toml")
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}
