//! Session state readable from outside the command task.
//!
//! Written only by the session's own tasks; everything here is a small
//! value behind a `parking_lot` lock so status queries never wait on the
//! dispatch loop.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use subhuti_proto::Message;
use tracing::info;

use crate::config::{BotConfig, NetworkConfig};
use crate::error::HandlerError;
use crate::roster::ChannelSummary;
use crate::telemetry;

use super::lag;
use super::outbound::Outbound;

/// Connection lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Disconnected,
    /// Socket open, registration not yet sent.
    Connected,
    /// Registration sent.
    Registered,
    /// Auto-join sent, reader and keepalive running.
    Running,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connected => "Connected",
            Self::Registered => "Registered",
            Self::Running => "Running",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity the server reported in `RPL_YOURHOST`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServerInfo {
    pub host: String,
    pub version: String,
}

pub struct SessionShared {
    settings: NetworkConfig,
    default_trigger: char,
    raw_logging: bool,
    /// Origin for lag probe timestamps.
    epoch: Instant,
    stopping: AtomicBool,
    state: RwLock<SessionState>,
    nick: RwLock<String>,
    server: RwLock<ServerInfo>,
    user_mode: RwLock<String>,
    visible_host: RwLock<Option<String>>,
    lag: RwLock<Option<Duration>>,
    channels: RwLock<Vec<ChannelSummary>>,
}

impl SessionShared {
    pub fn new(settings: NetworkConfig, bot: &BotConfig) -> Self {
        let nick = settings.nick.clone();
        Self {
            settings,
            default_trigger: bot.trigger_char(),
            raw_logging: bot.raw_logging,
            epoch: Instant::now(),
            stopping: AtomicBool::new(false),
            state: RwLock::new(SessionState::Disconnected),
            nick: RwLock::new(nick),
            server: RwLock::new(ServerInfo::default()),
            user_mode: RwLock::new(String::new()),
            visible_host: RwLock::new(None),
            lag: RwLock::new(None),
            channels: RwLock::new(Vec::new()),
        }
    }

    pub fn network(&self) -> &str {
        &self.settings.name
    }

    pub fn settings(&self) -> &NetworkConfig {
        &self.settings
    }

    /// Trigger character for `channel`, or for private messages.
    pub fn trigger_for(&self, channel: Option<&str>) -> char {
        self.settings.trigger_for(channel, self.default_trigger)
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub(crate) fn set_state(&self, state: SessionState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        if previous != state {
            info!(network = %self.network(), from = %previous, to = %state, "session state");
        }
    }

    pub fn nick(&self) -> String {
        self.nick.read().clone()
    }

    /// Case-insensitive comparison against our own nick.
    pub fn is_me(&self, nick: &str) -> bool {
        self.nick.read().eq_ignore_ascii_case(nick)
    }

    pub(crate) fn set_nick(&self, nick: &str) {
        *self.nick.write() = nick.to_owned();
    }

    /// Back to the configured nick, for a fresh registration.
    pub(crate) fn reset_nick(&self) {
        self.set_nick(&self.settings.nick);
    }

    pub fn server(&self) -> ServerInfo {
        self.server.read().clone()
    }

    pub(crate) fn set_server(&self, host: &str, version: &str) {
        *self.server.write() = ServerInfo {
            host: host.to_owned(),
            version: version.to_owned(),
        };
    }

    /// Where keepalive pings go: the host the server announced, else the
    /// configured address.
    pub fn keepalive_target(&self) -> String {
        let server = self.server.read();
        if server.host.is_empty() {
            self.settings.server.clone()
        } else {
            server.host.clone()
        }
    }

    pub fn user_mode(&self) -> String {
        self.user_mode.read().clone()
    }

    pub(crate) fn set_user_mode(&self, mode: &str) {
        *self.user_mode.write() = mode.to_owned();
    }

    pub fn visible_host(&self) -> Option<String> {
        self.visible_host.read().clone()
    }

    pub(crate) fn set_visible_host(&self, host: &str) {
        *self.visible_host.write() = Some(host.to_owned());
    }

    pub fn lag(&self) -> Option<Duration> {
        *self.lag.read()
    }

    /// Nanoseconds since this session was created.
    pub fn clock(&self) -> u128 {
        self.epoch.elapsed().as_nanos()
    }

    /// Queue `PING :LAGCHECK <now>`.
    pub async fn send_lag_probe(&self, outbound: &Outbound) -> Result<(), HandlerError> {
        let payload = lag::probe_payload(self.clock());
        outbound.send(Message::ping(&payload)).await
    }

    /// If `payload` answers one of our probes, record and return the lag.
    pub(crate) fn complete_lag_probe(&self, payload: &str) -> Option<Duration> {
        let sent = lag::parse_probe(payload)?;
        let lag = lag::elapsed(sent, self.clock());
        *self.lag.write() = Some(lag);
        info!(network = %self.network(), lag = ?lag, "lag measured");
        Some(lag)
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    pub(crate) fn mark_stopping(&self) {
        self.stopping.store(true, Ordering::Release);
    }

    /// Reconnect is allowed: configured and not shutting down.
    pub fn should_reconnect(&self) -> bool {
        self.settings.auto_reconnect && !self.is_stopping()
    }

    /// Last published roster snapshot.
    pub fn channel_summaries(&self) -> Vec<ChannelSummary> {
        self.channels.read().clone()
    }

    pub(crate) fn set_channel_summaries(&self, summaries: Vec<ChannelSummary>) {
        *self.channels.write() = summaries;
    }

    /// Wire logging, when enabled in config.
    #[inline]
    pub(crate) fn raw(&self, direction: &'static str, line: &str) {
        if self.raw_logging {
            telemetry::raw(self.network(), direction, line);
        }
    }
}
