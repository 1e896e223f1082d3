//! The command task: sole owner of the roster and the only place protocol
//! handlers run.

use std::sync::Arc;
use std::time::Duration;

use subhuti_proto::Message;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::bus::{Event, EventBus};
use crate::dispatch::{Context, Dispatcher};
use crate::error::{HandlerError, SessionError};
use crate::interpreter::Interpreter;
use crate::roster::{Direction, Roster};

use super::connect::{Link, run_connector};
use super::outbound::{self, Outbound, run_writer, text_lines};
use super::shared::{SessionShared, SessionState};
use super::status::render_status;
use super::tasks::{ParsedLine, RawLine, run_keepalive, run_reader};

/// Outbound queue depth per connection.
const OUTBOUND_CAPACITY: usize = 64;

/// Requests to the command task, from the session handle and from the
/// session's own tasks.
pub(crate) enum Control {
    Connect,
    Connected { conn_id: u64, link: Link },
    ConnectFailed { conn_id: u64, error: SessionError },
    ConnectionLost { conn_id: u64, error: SessionError },
    Disconnect { reason: String },
    Join(String),
    Part { channel: String, reason: Option<String> },
    SendRaw(String),
    SendToTarget { target: String, text: String },
    LagProbe,
    Status(oneshot::Sender<String>),
    Stop(oneshot::Sender<()>),
}

/// How long a QUIT may take to drain before the writer is cut off.
const QUIT_DRAIN: Duration = Duration::from_secs(2);

/// Tasks and send capability of the live connection.
struct Connection {
    id: u64,
    outbound: Outbound,
    /// Stops the reader and keepalive.
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    writer_cancel: CancellationToken,
    writer: JoinHandle<()>,
}

struct Connector {
    id: u64,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

pub(crate) struct SessionDriver {
    shared: Arc<SessionShared>,
    bus: EventBus,
    roster: Roster,
    dispatcher: Dispatcher,
    interpreter: Interpreter,
    control_tx: mpsc::UnboundedSender<Control>,
    lines_tx: mpsc::Sender<RawLine>,
    connection: Option<Connection>,
    connector: Option<Connector>,
    next_conn_id: u64,
    published_generation: Option<u64>,
}

impl SessionDriver {
    pub(crate) fn new(
        shared: Arc<SessionShared>,
        bus: EventBus,
        interpreter: Interpreter,
        control_tx: mpsc::UnboundedSender<Control>,
        lines_tx: mpsc::Sender<RawLine>,
    ) -> Self {
        Self {
            shared,
            bus,
            roster: Roster::new(),
            dispatcher: Dispatcher::new(),
            interpreter,
            control_tx,
            lines_tx,
            connection: None,
            connector: None,
            next_conn_id: 0,
            published_generation: None,
        }
    }

    pub(crate) async fn run(
        mut self,
        mut control: mpsc::UnboundedReceiver<Control>,
        mut parsed: mpsc::Receiver<ParsedLine>,
    ) {
        let mut lines_open = true;

        loop {
            tokio::select! {
                biased;
                ctl = control.recv() => match ctl {
                    Some(Control::Stop(done)) => {
                        self.shutdown().await;
                        let _ = done.send(());
                        break;
                    }
                    Some(ctl) => self.on_control(ctl).await,
                    None => {
                        self.shutdown().await;
                        break;
                    }
                },
                item = parsed.recv(), if lines_open => match item {
                    Some((conn_id, msg)) => self.on_message(conn_id, msg).await,
                    None => lines_open = false,
                },
            }
            self.publish_snapshot();
        }
        debug!(network = %self.shared.network(), "command task stopped");
    }

    /// Refresh the status snapshot when the roster changed.
    fn publish_snapshot(&mut self) {
        let generation = self.roster.generation();
        if self.published_generation != Some(generation) {
            self.shared.set_channel_summaries(self.roster.summaries());
            self.published_generation = Some(generation);
        }
    }

    async fn on_control(&mut self, ctl: Control) {
        match ctl {
            Control::Connect => self.start_connector(None),
            Control::Connected { conn_id, link } => self.on_connected(conn_id, link),
            Control::ConnectFailed { conn_id, error } => {
                if self.connector.as_ref().is_some_and(|c| c.id == conn_id) {
                    self.connector = None;
                    warn!(
                        network = %self.shared.network(),
                        error = %error,
                        "giving up on connect; waiting for an explicit request"
                    );
                }
            }
            Control::ConnectionLost { conn_id, error } => {
                if self.connection.as_ref().is_some_and(|c| c.id == conn_id) {
                    self.connection_lost(error).await;
                } else {
                    trace!(conn_id, "loss reported for a stale connection");
                }
            }
            Control::Disconnect { reason } => self.disconnect(&reason).await,
            Control::Join(channel) => {
                self.send_if_connected(Message::join(&channel)).await;
            }
            Control::Part { channel, reason } => {
                self.send_if_connected(Message::part(&channel, reason.as_deref()))
                    .await;
            }
            Control::SendRaw(line) => match Message::parse(line.trim_end_matches(['\r', '\n'])) {
                Ok(msg) => self.send_if_connected(msg).await,
                Err(e) => warn!(error = %e, "refusing to send malformed line"),
            },
            Control::SendToTarget { target, text } => self.send_to_target(&target, &text).await,
            Control::LagProbe => {
                if let Some(conn) = &self.connection
                    && let Err(e) = self.shared.send_lag_probe(&conn.outbound).await
                {
                    warn!(error = %e, "lag probe not sent");
                }
            }
            Control::Status(reply) => {
                let _ = reply.send(render_status(&self.shared, &self.roster));
            }
            // handled in the loop
            Control::Stop(done) => {
                let _ = done.send(());
            }
        }
    }

    async fn on_message(&mut self, conn_id: u64, msg: Message) {
        let Some(conn) = &self.connection else {
            trace!(conn_id, "dropping line with no live connection");
            return;
        };
        if conn.id != conn_id {
            trace!(conn_id, current = conn.id, "dropping line from stale connection");
            return;
        }

        let mut ctx = Context {
            shared: &self.shared,
            roster: &mut self.roster,
            outbound: &conn.outbound,
            bus: &self.bus,
            interpreter: &self.interpreter,
        };
        let result = self.dispatcher.dispatch(&mut ctx, &msg).await;

        if let Err(HandlerError::Disconnect(error)) = result {
            self.connection_lost(error).await;
        }
    }

    fn start_connector(&mut self, delay: Option<std::time::Duration>) {
        if self.shared.is_stopping() {
            debug!("stopping; not connecting");
            return;
        }
        if self.connection.is_some() || self.connector.is_some() {
            debug!(network = %self.shared.network(), "already connected or connecting");
            return;
        }

        self.next_conn_id += 1;
        let id = self.next_conn_id;
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_connector(
            Arc::clone(&self.shared),
            id,
            delay,
            self.control_tx.clone(),
            cancel.clone(),
        ));
        self.connector = Some(Connector { id, cancel, task });
    }

    fn on_connected(&mut self, conn_id: u64, link: Link) {
        match self.connector.take() {
            Some(c) if c.id == conn_id => {}
            other => {
                self.connector = other;
                debug!(conn_id, "discarding link from a cancelled attempt");
                return;
            }
        }

        let cancel = CancellationToken::new();
        let writer_cancel = CancellationToken::new();
        let (outbound, rx) = outbound::channel(OUTBOUND_CAPACITY);

        let writer = tokio::spawn(run_writer(
            Arc::clone(&self.shared),
            conn_id,
            link.writer,
            rx,
            self.control_tx.clone(),
            writer_cancel.clone(),
        ));
        let tasks = vec![
            tokio::spawn(run_reader(
                Arc::clone(&self.shared),
                conn_id,
                link.reader,
                self.lines_tx.clone(),
                self.control_tx.clone(),
                cancel.clone(),
            )),
            tokio::spawn(run_keepalive(
                Arc::clone(&self.shared),
                outbound.clone(),
                cancel.clone(),
            )),
        ];

        self.connection = Some(Connection {
            id: conn_id,
            outbound,
            cancel,
            tasks,
            writer_cancel,
            writer,
        });
        self.shared.set_state(SessionState::Running);
        self.bus.publish(Event::SessionConnected {
            network: self.shared.network().to_owned(),
        });
    }

    /// Stop the connection's tasks. With `quit`, a QUIT is queued and the
    /// writer drains its queue before exiting; otherwise it is cut off.
    /// Returns false if there was no connection.
    async fn teardown(&mut self, quit: Option<&str>) -> bool {
        let Some(conn) = self.connection.take() else {
            return false;
        };

        conn.cancel.cancel();
        for task in conn.tasks {
            let _ = task.await;
        }

        let mut writer = conn.writer;
        match quit {
            Some(reason) => {
                if !conn.outbound.try_send(Message::quit(reason)) {
                    debug!("QUIT not queued");
                }
                // The writer exits once the last sender is gone and the
                // queue is empty.
                drop(conn.outbound);
                if tokio::time::timeout(QUIT_DRAIN, &mut writer).await.is_err() {
                    debug!("writer did not drain in time");
                    conn.writer_cancel.cancel();
                    let _ = writer.await;
                }
            }
            None => {
                conn.writer_cancel.cancel();
                let _ = writer.await;
            }
        }
        true
    }

    fn finish_disconnect(&mut self, reason: String) {
        let cleared = self.roster.clear();
        self.shared.set_state(SessionState::Disconnected);
        info!(network = %self.shared.network(), cleared, reason = %reason, "disconnected");
        self.bus.publish(Event::SessionDisconnected {
            network: self.shared.network().to_owned(),
            reason,
        });
    }

    async fn connection_lost(&mut self, error: SessionError) {
        warn!(
            network = %self.shared.network(),
            error = %error,
            code = error.error_code(),
            "connection lost"
        );
        self.teardown(None).await;
        self.finish_disconnect(error.to_string());

        if self.shared.should_reconnect() {
            self.start_connector(Some(self.shared.settings().reconnect_delay()));
        }
    }

    async fn cancel_connector(&mut self) {
        if let Some(connector) = self.connector.take() {
            connector.cancel.cancel();
            let _ = connector.task.await;
        }
    }

    async fn disconnect(&mut self, reason: &str) {
        self.cancel_connector().await;
        if self.teardown(Some(reason)).await {
            self.finish_disconnect(reason.to_owned());
        } else {
            self.shared.set_state(SessionState::Disconnected);
        }
    }

    async fn shutdown(&mut self) {
        self.shared.mark_stopping();
        self.disconnect("Exiting").await;
    }

    async fn send_if_connected(&mut self, msg: Message) {
        match &self.connection {
            Some(conn) => {
                if let Err(e) = conn.outbound.send(msg).await {
                    warn!(error = %e, "send failed");
                }
            }
            None => warn!(command = %msg.command, "not connected; dropping"),
        }
    }

    /// PRIVMSG to `target`; channel messages are echoed to its log.
    async fn send_to_target(&mut self, target: &str, text: &str) {
        if self.connection.is_none() {
            warn!(target = %target, "not connected; dropping");
            return;
        }
        if let Some(channel) = self.roster.get_mut(target) {
            channel.record(Direction::Out, format!("<{}>\t{}", self.shared.nick(), text));
        }
        for line in text_lines(text) {
            self.send_if_connected(Message::privmsg(target, line)).await;
        }
    }
}
