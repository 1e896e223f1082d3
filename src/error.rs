//! Unified error handling for subhuti.
//!
//! Connection-level failures ([`SessionError`]) decide whether a session
//! stays up; handler failures ([`HandlerError`]) are logged by the
//! dispatcher and only tear the connection down when they say so.

use subhuti_proto::ProtocolError;
use thiserror::Error;

// ============================================================================
// Session Errors (connect, register, transport)
// ============================================================================

/// Errors that end a connection attempt or a running connection.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid server name for tls: {0}")]
    InvalidServerName(String),

    #[error("tls handshake with {host} failed: {source}")]
    Tls {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("registration failed: {0}")]
    Registration(String),

    #[error("auto-join of {channel} failed: {reason}")]
    AutoJoin { channel: String, reason: String },

    #[error("transport error: {0}")]
    Transport(#[from] ProtocolError),

    #[error("connection closed by server")]
    Closed,

    #[error("server error: {0}")]
    Server(String),

    #[error("session is not connected")]
    NotConnected,

    #[error("session has been stopped")]
    Stopped,
}

impl SessionError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::InvalidServerName(_) => "invalid_server_name",
            Self::Tls { .. } => "tls",
            Self::Registration(_) => "registration",
            Self::AutoJoin { .. } => "auto_join",
            Self::Transport(e) if e.is_protocol_violation() => "protocol_violation",
            Self::Transport(_) => "transport",
            Self::Closed => "closed",
            Self::Server(_) => "server_error",
            Self::NotConnected => "not_connected",
            Self::Stopped => "stopped",
        }
    }
}

// ============================================================================
// Roster Errors
// ============================================================================

/// Violations of "a channel is tracked only while we are in it".
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RosterError {
    #[error("channel {0} is already tracked")]
    AlreadyTracked(String),

    #[error("channel {0} is not tracked")]
    NotTracked(String),
}

// ============================================================================
// Handler Errors (protocol command processing)
// ============================================================================

/// Errors that can occur while handling one protocol line.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{command}: not enough parameters")]
    NeedMoreParams { command: &'static str },

    #[error(transparent)]
    Roster(#[from] RosterError),

    #[error("outbound queue closed")]
    SendClosed,

    /// The message would not fit on one wire line.
    #[error("refusing to send: {0}")]
    IllegalLine(#[source] ProtocolError),

    /// The connection must be torn down; the retry policy applies.
    #[error("disconnect requested: {0}")]
    Disconnect(SessionError),
}

impl HandlerError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NeedMoreParams { .. } => "need_more_params",
            Self::Roster(RosterError::AlreadyTracked(_)) => "channel_already_tracked",
            Self::Roster(RosterError::NotTracked(_)) => "channel_not_tracked",
            Self::SendClosed => "send_closed",
            Self::IllegalLine(_) => "illegal_line",
            Self::Disconnect(_) => "disconnect",
        }
    }
}

/// Result type for protocol handlers.
pub type HandlerResult = Result<(), HandlerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_error_codes() {
        assert_eq!(
            HandlerError::NeedMoreParams { command: "JOIN" }.error_code(),
            "need_more_params"
        );
        let err: HandlerError = RosterError::AlreadyTracked("#rust".into()).into();
        assert_eq!(err.error_code(), "channel_already_tracked");
        assert_eq!(err.to_string(), "channel #rust is already tracked");
        let err = HandlerError::IllegalLine(ProtocolError::IllegalControlChar('\r'));
        assert_eq!(err.error_code(), "illegal_line");
        assert_eq!(err.to_string(), "refusing to send: illegal control character: '\\r'");
    }

    #[test]
    fn oversized_line_is_a_protocol_violation() {
        let err = SessionError::from(ProtocolError::MessageTooLong {
            actual: 9000,
            limit: 8191,
        });
        assert_eq!(err.error_code(), "protocol_violation");
    }

    #[test]
    fn session_error_display() {
        let err = SessionError::Registration("password incorrect".into());
        assert_eq!(err.to_string(), "registration failed: password incorrect");
        assert_eq!(
            HandlerError::Disconnect(SessionError::Closed).to_string(),
            "disconnect requested: connection closed by server"
        );
    }
}
