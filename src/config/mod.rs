//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Top-level config structs (Config, BotConfig, LogConfig) and loading
//! - [`network`]: Per-session settings (NetworkConfig, ChannelConfig)
//! - [`validation`]: Startup checks on a loaded config

mod defaults;
mod network;
mod types;
mod validation;

pub use network::{ChannelConfig, NetworkConfig};
pub use types::{BotConfig, Config, ConfigError, LogConfig};
pub use validation::{ValidationError, validate};
