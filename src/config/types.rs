//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use super::defaults::{default_bot_name, default_log_level, default_trigger};
use super::network::NetworkConfig;
use super::validation::{self, ValidationError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {}", format_errors(.0))]
    Invalid(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Root of the TOML configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub log: LogConfig,
    /// One entry per session.
    #[serde(default, rename = "network")]
    pub networks: Vec<NetworkConfig>,
}

impl Config {
    /// Read, parse and validate a config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate config text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        validation::validate(&config).map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    /// Look up a network block by name.
    pub fn network(&self, name: &str) -> Option<&NetworkConfig> {
        self.networks.iter().find(|n| n.name == name)
    }
}

/// Process-wide bot settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_bot_name")]
    pub name: String,
    /// Fallback command trigger for networks and channels without one.
    #[serde(default = "default_trigger")]
    pub trigger: String,
    /// Log every wire line on the `subhuti::raw` target.
    #[serde(default)]
    pub raw_logging: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
            trigger: default_trigger(),
            raw_logging: false,
        }
    }
}

impl BotConfig {
    /// The trigger as a character. Validation guarantees exactly one.
    pub fn trigger_char(&self) -> char {
        self.trigger.chars().next().unwrap_or('?')
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of the human-readable format.
    #[serde(default)]
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
