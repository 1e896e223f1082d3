//! Per-network (per-session) settings.

use serde::Deserialize;
use std::time::Duration;

use super::defaults::{
    default_max_line_len, default_ping_interval_ms, default_port, default_realname,
    default_reconnect_delay_ms, default_true, default_username,
};

/// Connection and identity settings for one session.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Label used in logs, events and status output.
    pub name: String,
    pub server: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub tls: bool,
    pub nick: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_realname")]
    pub realname: String,
    /// Sent as `PASS` before `NICK`.
    pub password: Option<String>,
    #[serde(default = "default_true")]
    pub auto_connect: bool,
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,
    /// Upper bound on a single inbound line, terminator excluded.
    #[serde(default = "default_max_line_len")]
    pub max_line_len: usize,
    /// Overrides the bot-wide trigger on this network.
    pub trigger: Option<String>,
    /// Channels joined after every successful registration, in order.
    #[serde(default, rename = "channel")]
    pub channels: Vec<ChannelConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    pub name: String,
    /// Overrides the network trigger in this channel.
    pub trigger: Option<String>,
}

impl NetworkConfig {
    /// Minimal settings, everything else at its default.
    pub fn new(name: &str, server: &str, port: u16, nick: &str) -> Self {
        Self {
            name: name.to_string(),
            server: server.to_string(),
            port,
            tls: false,
            nick: nick.to_string(),
            username: default_username(),
            realname: default_realname(),
            password: None,
            auto_connect: true,
            auto_reconnect: true,
            reconnect_delay_ms: default_reconnect_delay_ms(),
            ping_interval_ms: default_ping_interval_ms(),
            max_line_len: default_max_line_len(),
            trigger: None,
            channels: Vec::new(),
        }
    }

    /// `host:port` for dialing.
    pub fn address(&self) -> String {
        format!("{}:{}", self.server, self.port)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    /// Resolve the trigger for `channel`: the channel's own, then the
    /// network's, then `fallback`. `None` means a private conversation.
    pub fn trigger_for(&self, channel: Option<&str>, fallback: char) -> char {
        let per_channel = channel.and_then(|name| {
            self.channels
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(name))
                .and_then(|c| c.trigger.as_deref())
        });
        per_channel
            .or(self.trigger.as_deref())
            .and_then(|t| t.chars().next())
            .unwrap_or(fallback)
    }
}
