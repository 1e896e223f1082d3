//! Error types for framing and message parsing.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Top-level protocol errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// I/O error during reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A carried-over fragment grew past the configured bound without a
    /// line terminator.
    #[error("message too long: {actual} bytes (limit: {limit})")]
    MessageTooLong {
        /// Bytes buffered so far.
        actual: usize,
        /// Maximum allowed length.
        limit: usize,
    },

    /// An outbound line carried a character that would end or corrupt
    /// the line on the wire.
    #[error("illegal control character: {0:?}")]
    IllegalControlChar(char),

    /// A line did not match the message grammar.
    #[error("invalid message: {string}")]
    InvalidMessage {
        /// The offending line.
        string: String,
        /// The underlying parse error.
        #[source]
        cause: MessageParseError,
    },
}

impl ProtocolError {
    /// True for errors that mean the peer broke the protocol, as opposed
    /// to the socket failing underneath us.
    pub fn is_protocol_violation(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}

/// Errors encountered when parsing a single line.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum MessageParseError {
    /// Line was empty.
    #[error("empty message")]
    EmptyMessage,

    /// Command was missing, or neither letters nor exactly three digits.
    #[error("invalid command")]
    InvalidCommand,

    /// Prefix marker without a prefix body.
    #[error("invalid prefix: {0}")]
    InvalidPrefix(String),

    /// NUL, CR or LF byte inside the line.
    #[error("invalid character {byte:#04x} at position {position}")]
    InvalidCharacterAt {
        /// The invalid byte value.
        byte: u8,
        /// Position in the line.
        position: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_long_is_a_protocol_violation() {
        let err = ProtocolError::MessageTooLong {
            actual: 9000,
            limit: 8191,
        };
        assert!(err.is_protocol_violation());
        assert_eq!(
            err.to_string(),
            "message too long: 9000 bytes (limit: 8191)"
        );
    }

    #[test]
    fn illegal_control_char_display() {
        let err = ProtocolError::IllegalControlChar('\r');
        assert!(err.is_protocol_violation());
        assert_eq!(err.to_string(), "illegal control character: '\\r'");
    }

    #[test]
    fn io_is_not_a_protocol_violation() {
        let err: ProtocolError =
            std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof").into();
        assert!(!err.is_protocol_violation());
    }
}
