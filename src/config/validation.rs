//! Configuration validation.
//!
//! Validates configuration at load time to catch common errors early.

use super::Config;
use std::collections::HashSet;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("network.name is required")]
    MissingNetworkName,
    #[error("network '{0}' is defined more than once")]
    DuplicateNetwork(String),
    #[error("network '{0}': server is required")]
    MissingServer(String),
    #[error("network '{0}': nick '{1}' is not a valid nickname")]
    InvalidNick(String, String),
    #[error("trigger '{0}' must be exactly one character")]
    InvalidTrigger(String),
    #[error("network '{0}': max_line_len must be at least 512")]
    LineLimitTooSmall(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    check_trigger(&config.bot.trigger, &mut errors);

    for net in &config.networks {
        if net.name.is_empty() {
            errors.push(ValidationError::MissingNetworkName);
        } else if !seen.insert(net.name.as_str()) {
            errors.push(ValidationError::DuplicateNetwork(net.name.clone()));
        }
        if net.server.is_empty() {
            errors.push(ValidationError::MissingServer(net.name.clone()));
        }
        if !subhuti_proto::prefix::is_valid_nick(&net.nick) {
            errors.push(ValidationError::InvalidNick(
                net.name.clone(),
                net.nick.clone(),
            ));
        }
        if net.max_line_len < 512 {
            errors.push(ValidationError::LineLimitTooSmall(net.name.clone()));
        }
        if let Some(trigger) = &net.trigger {
            check_trigger(trigger, &mut errors);
        }
        for chan in &net.channels {
            if let Some(trigger) = &chan.trigger {
                check_trigger(trigger, &mut errors);
            }
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn check_trigger(trigger: &str, errors: &mut Vec<ValidationError>) {
    if trigger.chars().count() != 1 {
        errors.push(ValidationError::InvalidTrigger(trigger.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r##"
[bot]
name = "subhuti"
trigger = "?"

[log]
level = "debug"

[[network]]
name = "libera"
server = "irc.libera.chat"
port = 6697
tls = true
nick = "Subhuti"
password = "hunter2"

[[network.channel]]
name = "#rust"
trigger = "!"

[[network.channel]]
name = "#c"
"##;

    #[test]
    fn sample_loads() {
        let config = Config::from_toml(SAMPLE).unwrap();
        assert_eq!(config.log.level, "debug");
        let net = config.network("libera").unwrap();
        assert!(net.tls);
        assert!(net.auto_reconnect);
        assert_eq!(net.username, "subhuti");
        assert_eq!(net.password.as_deref(), Some("hunter2"));
        assert_eq!(net.channels.len(), 2);
        assert_eq!(net.channels[0].trigger.as_deref(), Some("!"));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.networks.len(), 1);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Config::load("/nonexistent/subhuti.toml").unwrap_err();
        assert!(matches!(err, super::super::ConfigError::Io(_)));
    }

    #[test]
    fn collects_every_problem() {
        let text = r##"
[bot]
trigger = "!!"

[[network]]
name = "a"
server = ""
nick = "9lives"

[[network]]
name = "a"
server = "irc.example.net"
nick = "ok"
max_line_len = 100
"##;
        let config: Config = toml::from_str(text).unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::InvalidTrigger("!!".into())));
        assert!(errors.contains(&ValidationError::MissingServer("a".into())));
        assert!(errors.contains(&ValidationError::InvalidNick("a".into(), "9lives".into())));
        assert!(errors.contains(&ValidationError::DuplicateNetwork("a".into())));
        assert!(errors.contains(&ValidationError::LineLimitTooSmall("a".into())));
    }
}
