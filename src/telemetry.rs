//! Logging setup, log targets and span helpers.

use std::time::{Duration, Instant};

use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// Target for wire traffic (`-->` inbound, `<--` outbound).
pub const RAW_TARGET: &str = "subhuti::raw";

/// Target for per-channel activity lines.
pub const CHANNEL_TARGET: &str = "subhuti::channel";

/// Handlers slower than this are reported at debug level.
const SLOW_HANDLER: Duration = Duration::from_millis(250);

/// Install the global subscriber. `RUST_LOG` overrides `config.level`.
///
/// Returns an error if a subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json {
        builder
            .json()
            .try_init()
            .map_err(|e| anyhow::anyhow!("{e}"))?;
    } else {
        builder.try_init().map_err(|e| anyhow::anyhow!("{e}"))?;
    }
    Ok(())
}

/// Log one wire line on [`RAW_TARGET`].
#[inline]
pub fn raw(network: &str, direction: &'static str, line: &str) {
    tracing::trace!(target: RAW_TARGET, network = %network, "{}\t{}", direction, line);
}

/// Guard for timing protocol handler execution.
///
/// Reports slow handlers when dropped.
pub struct CommandTimer {
    command: String,
    start: Instant,
}

impl CommandTimer {
    /// Start timing a command.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            start: Instant::now(),
        }
    }
}

impl Drop for CommandTimer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        if elapsed >= SLOW_HANDLER {
            tracing::debug!(
                command = %self.command,
                elapsed_ms = elapsed.as_millis() as u64,
                "slow handler"
            );
        }
    }
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, debug_span, info_span};

    /// Span covering everything a session does.
    pub fn session(network: &str) -> Span {
        info_span!("session", network = %network)
    }

    /// Span for one connection attempt.
    pub fn connect(network: &str, addr: &str, attempt: u64) -> Span {
        info_span!("connect", network = %network, addr = %addr, attempt = attempt)
    }

    /// Span for one dispatched protocol command.
    pub fn command(name: &str, source: Option<&str>, target: Option<&str>) -> Span {
        match (source, target) {
            (Some(source), Some(target)) => {
                debug_span!("command", name = %name, source = %source, target = %target)
            }
            (Some(source), None) => debug_span!("command", name = %name, source = %source),
            _ => debug_span!("command", name = %name),
        }
    }
}
