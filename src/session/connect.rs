//! Dial, register and auto-join.
//!
//! One connector task runs per connect request. It retries the whole
//! sequence while the network is configured for auto-reconnect, and hands
//! the registered link to the command task when it succeeds.

use std::sync::Arc;
use std::time::Duration;

use futures_util::SinkExt;
use sha2::{Digest, Sha256};
use subhuti_proto::transport::{LineReader, LineWriter};
use subhuti_proto::{Message, Transport};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

use crate::error::SessionError;
use crate::telemetry::spans;

use super::driver::Control;
use super::shared::{SessionShared, SessionState};

/// A registered connection with auto-join sent.
pub(crate) struct Link {
    pub reader: LineReader,
    pub writer: LineWriter,
}

/// Upgrade `tcp` to TLS, trusting the platform roots.
///
/// The peer chain is logged with SHA-256 fingerprints.
async fn upgrade_to_tls(tcp: TcpStream, hostname: &str) -> Result<TlsStream<TcpStream>, SessionError> {
    let mut roots = RootCertStore::empty();
    let native = rustls_native_certs::load_native_certs();
    for cert in native.certs {
        if let Err(e) = roots.add(cert) {
            warn!("Failed to add root cert: {}", e);
        }
    }
    for e in &native.errors {
        warn!("Error loading native certs: {}", e);
    }

    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    let connector = TlsConnector::from(Arc::new(config));
    let server_name = ServerName::try_from(hostname.to_string())
        .map_err(|_| SessionError::InvalidServerName(hostname.to_string()))?;

    let tls_stream = connector
        .connect(server_name, tcp)
        .await
        .map_err(|source| SessionError::Tls {
            host: hostname.to_string(),
            source,
        })?;

    let (_, conn) = tls_stream.get_ref();
    if let Some(certs) = conn.peer_certificates() {
        for (depth, cert) in certs.iter().enumerate() {
            let digest = Sha256::digest(cert.as_ref());
            let fingerprint = digest
                .iter()
                .map(|b| format!("{:02X}", b))
                .collect::<Vec<_>>()
                .join(":");
            info!(host = %hostname, depth, sha256 = %fingerprint, "peer certificate");
        }
    }

    Ok(tls_stream)
}

async fn dial(shared: &SessionShared) -> Result<Transport, SessionError> {
    let settings = shared.settings();
    let addr = settings.address();

    let tcp = TcpStream::connect(&addr)
        .await
        .map_err(|source| SessionError::Connect { addr, source })?;

    if settings.tls {
        let tls = upgrade_to_tls(tcp, &settings.server).await?;
        Ok(Transport::client_tls(tls))
    } else {
        Ok(Transport::tcp(tcp))
    }
}

async fn write(shared: &SessionShared, writer: &mut LineWriter, msg: Message) -> Result<(), subhuti_proto::ProtocolError> {
    let line = msg.to_string();
    shared.raw("<--", &line);
    writer.send(line).await
}

/// `PASS` (if set), `NICK`, `USER`, in that order.
async fn register(shared: &SessionShared, writer: &mut LineWriter) -> Result<(), SessionError> {
    let settings = shared.settings();
    shared.reset_nick();

    let mut lines = Vec::with_capacity(3);
    if let Some(password) = &settings.password {
        lines.push(Message::pass(password));
    }
    lines.push(Message::nick(&settings.nick));
    lines.push(Message::user(&settings.username, &settings.realname));

    for msg in lines {
        let command = msg.command.clone();
        write(shared, writer, msg)
            .await
            .map_err(|e| SessionError::Registration(format!("sending {command}: {e}")))?;
    }
    Ok(())
}

async fn join_configured(shared: &SessionShared, writer: &mut LineWriter) -> Result<(), SessionError> {
    for channel in &shared.settings().channels {
        write(shared, writer, Message::join(&channel.name))
            .await
            .map_err(|e| SessionError::AutoJoin {
                channel: channel.name.clone(),
                reason: e.to_string(),
            })?;
    }
    Ok(())
}

/// One full attempt: dial, register, auto-join.
pub(crate) async fn establish(shared: &SessionShared) -> Result<Link, SessionError> {
    let transport = dial(shared).await?;
    shared.set_state(SessionState::Connected);
    if transport.is_tls() {
        debug!("tls established");
    }

    let (reader, mut writer) = transport.into_lines(shared.settings().max_line_len);

    register(shared, &mut writer).await?;
    shared.set_state(SessionState::Registered);

    join_configured(shared, &mut writer).await?;

    Ok(Link { reader, writer })
}

/// Retry [`establish`] until it succeeds, the token is cancelled, or the
/// network does not allow another attempt.
pub(crate) async fn run_connector(
    shared: Arc<SessionShared>,
    conn_id: u64,
    initial_delay: Option<Duration>,
    control: mpsc::UnboundedSender<Control>,
    cancel: CancellationToken,
) {
    let addr = shared.settings().address();
    let mut delay = initial_delay;
    let mut attempt: u64 = 0;

    loop {
        if let Some(delay) = delay.take() {
            debug!(delay = ?delay, "waiting before connect");
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        attempt += 1;
        let span = spans::connect(shared.network(), &addr, attempt);
        let result = tokio::select! {
            _ = cancel.cancelled() => {
                shared.set_state(SessionState::Disconnected);
                return;
            }
            r = establish(&shared).instrument(span) => r,
        };

        match result {
            Ok(link) => {
                info!(network = %shared.network(), attempt, "registered");
                let _ = control.send(Control::Connected { conn_id, link });
                return;
            }
            Err(error) => {
                warn!(
                    network = %shared.network(),
                    attempt,
                    error = %error,
                    code = error.error_code(),
                    "connect attempt failed"
                );
                shared.set_state(SessionState::Disconnected);

                if !shared.should_reconnect() || cancel.is_cancelled() {
                    let _ = control.send(Control::ConnectFailed { conn_id, error });
                    return;
                }
                delay = Some(shared.settings().reconnect_delay());
            }
        }
    }
}
