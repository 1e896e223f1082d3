//! Connection manager.
//!
//! A [`Session`] is one connection to one server. It runs as a small set
//! of tasks that only talk over channels:
//!
//! - connector: dial, TLS, registration and auto-join, with retry
//! - reader: framed socket reads, one per connection
//! - line task: message grammar, one per session
//! - command task: protocol handlers, roster owner, lifecycle decisions
//! - writer and keepalive: one each per connection
//!
//! The handle only sends requests to the command task; nothing outside
//! that task touches the roster.

mod connect;
mod driver;
mod lag;
pub mod outbound;
mod shared;
mod status;
mod tasks;

pub use lag::PROBE_MARKER;
pub use outbound::Outbound;
pub use shared::{ServerInfo, SessionShared, SessionState};
pub use status::render_status;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug};

use crate::bus::EventBus;
use crate::config::{BotConfig, NetworkConfig};
use crate::error::SessionError;
use crate::interpreter::{CommandRegistry, Interpreter, ParserChain};
use crate::roster::ChannelSummary;
use crate::telemetry::spans;

use self::driver::{Control, SessionDriver};

/// Handle to a running session.
pub struct Session {
    shared: Arc<SessionShared>,
    control: mpsc::UnboundedSender<Control>,
    commands: CommandRegistry,
    parsers: ParserChain,
    line_stop: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Session {
    /// Start the session's tasks. The session stays disconnected until
    /// [`Session::connect`] is called.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(settings: NetworkConfig, bot: &BotConfig, bus: EventBus) -> Self {
        Self::with_tables(
            settings,
            bot,
            bus,
            CommandRegistry::with_builtins(),
            ParserChain::with_builtins(),
        )
    }

    /// Like [`Session::spawn`], with caller-supplied command and parser
    /// tables.
    pub fn with_tables(
        settings: NetworkConfig,
        bot: &BotConfig,
        bus: EventBus,
        commands: CommandRegistry,
        parsers: ParserChain,
    ) -> Self {
        let shared = Arc::new(SessionShared::new(settings, bot));
        let span = spans::session(shared.network());

        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (lines_tx, lines_rx) = mpsc::channel(1);
        let (parsed_tx, parsed_rx) = mpsc::channel(1);
        let line_stop = CancellationToken::new();

        let line_task = tokio::spawn(
            tasks::run_line_processor(
                Arc::clone(&shared),
                lines_rx,
                parsed_tx,
                line_stop.clone(),
            )
            .instrument(span.clone()),
        );

        let interpreter = Interpreter::new(commands.clone(), parsers.clone());
        let driver = SessionDriver::new(
            Arc::clone(&shared),
            bus,
            interpreter,
            control_tx.clone(),
            lines_tx,
        );
        let command_task = tokio::spawn(driver.run(control_rx, parsed_rx).instrument(span));

        Self {
            shared,
            control: control_tx,
            commands,
            parsers,
            line_stop,
            tasks: Mutex::new(vec![command_task, line_task]),
        }
    }

    fn request(&self, ctl: Control) -> Result<(), SessionError> {
        self.control.send(ctl).map_err(|_| SessionError::Stopped)
    }

    pub fn network(&self) -> &str {
        self.shared.network()
    }

    pub fn settings(&self) -> &NetworkConfig {
        self.shared.settings()
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    pub fn nick(&self) -> String {
        self.shared.nick()
    }

    pub fn server(&self) -> ServerInfo {
        self.shared.server()
    }

    pub fn lag(&self) -> Option<Duration> {
        self.shared.lag()
    }

    /// Channels as of the last processed line.
    pub fn channels(&self) -> Vec<ChannelSummary> {
        self.shared.channel_summaries()
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    pub fn parsers(&self) -> &ParserChain {
        &self.parsers
    }

    /// Start connecting. A no-op while connected or connecting.
    pub fn connect(&self) -> Result<(), SessionError> {
        self.request(Control::Connect)
    }

    /// Send QUIT and close. No reconnect is scheduled.
    pub fn disconnect(&self, reason: &str) -> Result<(), SessionError> {
        self.request(Control::Disconnect {
            reason: reason.to_owned(),
        })
    }

    /// Disconnect, then connect again.
    pub fn reconnect(&self) -> Result<(), SessionError> {
        self.disconnect("Reconnecting")?;
        self.connect()
    }

    pub fn join(&self, channel: &str) -> Result<(), SessionError> {
        self.request(Control::Join(channel.to_owned()))
    }

    pub fn part(&self, channel: &str, reason: Option<&str>) -> Result<(), SessionError> {
        self.request(Control::Part {
            channel: channel.to_owned(),
            reason: reason.map(str::to_owned),
        })
    }

    /// Send one protocol line as-is. A trailing CR LF is ignored; lines that
    /// are malformed or carry a line break inside are logged and dropped.
    pub fn send_raw(&self, line: &str) -> Result<(), SessionError> {
        self.request(Control::SendRaw(line.to_owned()))
    }

    /// PRIVMSG `text` to a channel or nick; channel sends are echoed into
    /// the channel's activity log. Text is split at every CR or LF and goes
    /// out line by line.
    pub fn send_to_target(&self, target: &str, text: &str) -> Result<(), SessionError> {
        self.request(Control::SendToTarget {
            target: target.to_owned(),
            text: text.to_owned(),
        })
    }

    /// Measure round-trip time; read the result with [`Session::lag`].
    pub fn lag_probe(&self) -> Result<(), SessionError> {
        self.request(Control::LagProbe)
    }

    /// Multi-line status report.
    pub async fn status(&self) -> Result<String, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.request(Control::Status(tx))?;
        rx.await.map_err(|_| SessionError::Stopped)
    }

    /// Stop the session: QUIT if connected, then wait for every task.
    pub async fn stop(&self) {
        self.shared.mark_stopping();

        let (tx, rx) = oneshot::channel();
        if self.request(Control::Stop(tx)).is_ok() {
            let _ = rx.await;
        }
        self.line_stop.cancel();

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            let _ = task.await;
        }
        debug!(network = %self.network(), "session stopped");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.tasks.get_mut().is_empty() {
            self.shared.mark_stopping();
            let (tx, _) = oneshot::channel();
            let _ = self.control.send(Control::Stop(tx));
            self.line_stop.cancel();
        }
    }
}
