//! # subhuti-proto
//!
//! Wire-level pieces of the Subhuti chat bot: the CRLF line framer, the
//! message grammar, the numeric reply table, sender prefix parsing, CTCP
//! helpers and the plain/TLS client transport.
//!
//! ```rust
//! use subhuti_proto::Message;
//!
//! let msg: Message = ":irc.example.net 001 Subhuti :Welcome".parse().unwrap();
//! assert_eq!(msg.command, "RPL_WELCOME");
//! assert_eq!(msg.arg(0), Some("Subhuti"));
//!
//! let reply = Message::privmsg("#rust", "hello there");
//! assert_eq!(reply.to_string(), "PRIVMSG #rust :hello there");
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod ctcp;
pub mod error;
#[cfg(feature = "tokio")]
pub mod line;
pub mod message;
pub mod prefix;
pub mod response;
#[cfg(feature = "tokio")]
pub mod transport;

pub use self::ctcp::{Ctcp, CtcpKind};
pub use self::error::{MessageParseError, ProtocolError};
#[cfg(feature = "tokio")]
pub use self::line::LineCodec;
pub use self::message::Message;
pub use self::prefix::Sender;
pub use self::response::{resolve_command, Response};
#[cfg(feature = "tokio")]
pub use self::transport::{Transport, MAX_LINE_LEN};
