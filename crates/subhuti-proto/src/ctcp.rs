//! CTCP (Client-to-Client Protocol) requests embedded in PRIVMSG bodies.
//!
//! ```
//! use subhuti_proto::ctcp::{Ctcp, CtcpKind};
//!
//! let req = Ctcp::parse("\x01PING 12345\x01").unwrap();
//! assert_eq!(req.kind, CtcpKind::Ping);
//! assert_eq!(req.params, Some("12345"));
//! assert_eq!(Ctcp::reply(CtcpKind::Ping, "12345"), "\x01PING 12345\x01");
//! ```

use std::fmt;

/// The CTCP delimiter character (`\x01`).
pub const CTCP_DELIM: char = '\x01';

/// Known CTCP command types.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CtcpKind {
    /// ACTION - `/me` emotes.
    Action,
    /// VERSION - client version.
    Version,
    /// PING - round-trip probe, the payload is echoed back.
    Ping,
    /// TIME - local time.
    Time,
    /// USERINFO - user-defined information.
    Userinfo,
    /// CLIENTINFO - supported CTCP commands.
    Clientinfo,
    /// SOURCE - where to get the client.
    Source,
    /// FINGER - legacy user information.
    Finger,
    /// Anything else.
    Unknown(String),
}

impl CtcpKind {
    /// Parse a CTCP command name.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "ACTION" => Self::Action,
            "VERSION" => Self::Version,
            "PING" => Self::Ping,
            "TIME" => Self::Time,
            "USERINFO" => Self::Userinfo,
            "CLIENTINFO" => Self::Clientinfo,
            "SOURCE" => Self::Source,
            "FINGER" => Self::Finger,
            _ => Self::Unknown(name.to_owned()),
        }
    }

    /// Canonical uppercase name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Action => "ACTION",
            Self::Version => "VERSION",
            Self::Ping => "PING",
            Self::Time => "TIME",
            Self::Userinfo => "USERINFO",
            Self::Clientinfo => "CLIENTINFO",
            Self::Source => "SOURCE",
            Self::Finger => "FINGER",
            Self::Unknown(s) => s,
        }
    }
}

impl fmt::Display for CtcpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed CTCP request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ctcp<'a> {
    /// The CTCP command type.
    pub kind: CtcpKind,
    /// Text after the command name, if any.
    pub params: Option<&'a str>,
}

impl<'a> Ctcp<'a> {
    /// Parse a PRIVMSG/NOTICE body. `None` if it is not CTCP.
    pub fn parse(text: &'a str) -> Option<Self> {
        let text = text.strip_prefix(CTCP_DELIM)?;
        let text = text.strip_suffix(CTCP_DELIM).unwrap_or(text);

        if text.is_empty() {
            return None;
        }

        let (command, params) = match text.split_once(' ') {
            Some((command, params)) if !params.is_empty() => (command, Some(params)),
            Some((command, _)) => (command, None),
            None => (text, None),
        };

        Some(Self {
            kind: CtcpKind::parse(command),
            params,
        })
    }

    /// Check if a message body is CTCP-wrapped.
    #[inline]
    pub fn is_ctcp(text: &str) -> bool {
        text.starts_with(CTCP_DELIM)
    }

    /// Wrap a reply body for sending in a NOTICE.
    pub fn reply(kind: CtcpKind, text: &str) -> String {
        if text.is_empty() {
            format!("{CTCP_DELIM}{kind}{CTCP_DELIM}")
        } else {
            format!("{CTCP_DELIM}{kind} {text}{CTCP_DELIM}")
        }
    }
}

impl fmt::Display for Ctcp<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.params {
            Some(p) => write!(f, "{CTCP_DELIM}{} {p}{CTCP_DELIM}", self.kind),
            None => write!(f, "{CTCP_DELIM}{}{CTCP_DELIM}", self.kind),
        }
    }
}
