//! Per-connection reader and keepalive tasks, and the session-wide line
//! task.
//!
//! Lines travel reader → line task → command task over single-slot
//! channels, so a slow handler stalls reading for this session only.

use std::sync::Arc;

use futures_util::StreamExt;
use subhuti_proto::Message;
use subhuti_proto::transport::LineReader;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::SessionError;

use super::driver::Control;
use super::outbound::Outbound;
use super::shared::SessionShared;

/// A raw line tagged with the connection it came from.
pub(crate) type RawLine = (u64, String);

/// A parsed line tagged with the connection it came from.
pub(crate) type ParsedLine = (u64, Message);

/// Read framed lines until the socket ends, fails, or the token fires.
pub(crate) async fn run_reader(
    shared: Arc<SessionShared>,
    conn_id: u64,
    mut reader: LineReader,
    lines: mpsc::Sender<RawLine>,
    control: mpsc::UnboundedSender<Control>,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = reader.next() => next,
        };

        match next {
            Some(Ok(line)) => {
                shared.raw("-->", &line);
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    sent = lines.send((conn_id, line)) => if sent.is_err() { break },
                }
            }
            Some(Err(e)) => {
                let _ = control.send(Control::ConnectionLost {
                    conn_id,
                    error: SessionError::Transport(e),
                });
                break;
            }
            None => {
                let _ = control.send(Control::ConnectionLost {
                    conn_id,
                    error: SessionError::Closed,
                });
                break;
            }
        }
    }
    debug!(network = %shared.network(), conn_id, "reader stopped");
}

/// Parse raw lines; malformed ones are logged and dropped.
pub(crate) async fn run_line_processor(
    shared: Arc<SessionShared>,
    mut lines: mpsc::Receiver<RawLine>,
    parsed: mpsc::Sender<ParsedLine>,
    stop: CancellationToken,
) {
    loop {
        let (conn_id, line) = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            item = lines.recv() => match item {
                Some(item) => item,
                None => break,
            },
        };

        let msg = match Message::parse(&line) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(network = %shared.network(), error = %e, "dropping malformed line");
                continue;
            }
        };

        tokio::select! {
            _ = stop.cancelled() => break,
            sent = parsed.send((conn_id, msg)) => if sent.is_err() { break },
        }
    }
    debug!(network = %shared.network(), "line processor stopped");
}

/// Ping the server every `ping_interval`.
pub(crate) async fn run_keepalive(
    shared: Arc<SessionShared>,
    outbound: Outbound,
    cancel: CancellationToken,
) {
    let period = shared.settings().ping_interval();
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let ping = Message::ping(&shared.keepalive_target());
        tokio::select! {
            _ = cancel.cancelled() => break,
            sent = outbound.send(ping) => if sent.is_err() { break },
        }
    }
    debug!(network = %shared.network(), "keepalive stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BotConfig, NetworkConfig};

    fn shared() -> Arc<SessionShared> {
        let net = NetworkConfig::new("testnet", "irc.example.org", 6667, "Subhuti");
        Arc::new(SessionShared::new(net, &BotConfig::default()))
    }

    #[tokio::test]
    async fn line_processor_drops_malformed_lines() {
        let (raw_tx, raw_rx) = mpsc::channel(4);
        let (parsed_tx, mut parsed_rx) = mpsc::channel(4);
        let stop = CancellationToken::new();
        let task = tokio::spawn(run_line_processor(shared(), raw_rx, parsed_tx, stop.clone()));

        raw_tx.send((1, ":server 001 Subhuti :Welcome".into())).await.unwrap();
        raw_tx.send((1, ":bad\0line".into())).await.unwrap();
        raw_tx.send((1, ":alice!a@h PRIVMSG #a :x\rQUIT :bye".into())).await.unwrap();
        raw_tx.send((2, "PING :irc.example.org".into())).await.unwrap();

        let (id, msg) = parsed_rx.recv().await.unwrap();
        assert_eq!((id, msg.command.as_str()), (1, "RPL_WELCOME"));
        let (id, msg) = parsed_rx.recv().await.unwrap();
        assert_eq!((id, msg.command.as_str()), (2, "PING"));

        stop.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn keepalive_pings_announced_host() {
        let shared = shared();
        shared.set_server("leaf.example.org", "ircd");
        let (outbound, mut rx) = super::super::outbound::channel(4);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_keepalive(Arc::clone(&shared), outbound, cancel.clone()));

        let ping = rx.recv().await.unwrap();
        assert_eq!(ping.to_string(), "PING leaf.example.org");

        cancel.cancel();
        task.await.unwrap();
    }
}
