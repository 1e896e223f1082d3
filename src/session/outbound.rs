//! Outbound queue and the writer task that drains it.

use std::sync::Arc;

use futures_util::SinkExt;
use subhuti_proto::transport::LineWriter;
use subhuti_proto::{Message, ProtocolError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{HandlerError, SessionError};

use super::driver::Control;
use super::shared::SessionShared;

/// Send capability for one connection. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Outbound {
    tx: mpsc::Sender<Message>,
}

/// Split chat text into the lines it may be sent as. Any CR or LF
/// starts a new line; empty lines are dropped.
pub fn text_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split(['\r', '\n']).filter(|line| !line.is_empty())
}

/// A queue of `capacity` messages and its receiving end.
pub fn channel(capacity: usize) -> (Outbound, mpsc::Receiver<Message>) {
    let (tx, rx) = mpsc::channel(capacity);
    (Outbound { tx }, rx)
}

impl Outbound {
    /// Queue a message, waiting for room. Messages that would not fit on
    /// one wire line are refused.
    pub async fn send(&self, msg: Message) -> Result<(), HandlerError> {
        msg.validate().map_err(HandlerError::IllegalLine)?;
        self.tx.send(msg).await.map_err(|_| HandlerError::SendClosed)
    }

    /// Queue without waiting. False if the queue is full or closed, or
    /// the message is refused.
    pub fn try_send(&self, msg: Message) -> bool {
        msg.validate().is_ok() && self.tx.try_send(msg).is_ok()
    }

    pub async fn privmsg(&self, target: &str, text: &str) -> Result<(), HandlerError> {
        self.send(Message::privmsg(target, text)).await
    }

    pub async fn notice(&self, target: &str, text: &str) -> Result<(), HandlerError> {
        self.send(Message::notice(target, text)).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Write queued messages until cancelled or the socket fails.
pub(crate) async fn run_writer(
    shared: Arc<SessionShared>,
    conn_id: u64,
    mut writer: LineWriter,
    mut rx: mpsc::Receiver<Message>,
    control: mpsc::UnboundedSender<Control>,
    cancel: CancellationToken,
) {
    loop {
        let msg = tokio::select! {
            biased;
            msg = rx.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
            _ = cancel.cancelled() => break,
        };

        let line = msg.to_string();
        shared.raw("<--", &line);

        let result = tokio::select! {
            biased;
            r = writer.send(line) => r,
            _ = cancel.cancelled() => break,
        };

        if let Err(ProtocolError::IllegalControlChar(ch)) = result {
            warn!(network = %shared.network(), ?ch, "dropping unsendable line");
            continue;
        }
        if let Err(e) = result {
            let _ = control.send(Control::ConnectionLost {
                conn_id,
                error: SessionError::Transport(e),
            });
            break;
        }
    }
    debug!(network = %shared.network(), conn_id, "writer stopped");
}
