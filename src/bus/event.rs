//! Event types published on the bus.

use std::fmt;
use std::time::Duration;

use subhuti_proto::Sender;

use crate::interpreter::MessageRequest;

/// Closed set of event types; handlers subscribe per kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    UserJoin,
    UserPart,
    UserQuit,
    UserNick,
    UserKick,
    KeepaliveReply,
    PrivateMessage,
    ChannelMessage,
    SessionConnected,
    SessionDisconnected,
    ContentParseRequested,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserJoin => "UserJoin",
            Self::UserPart => "UserPart",
            Self::UserQuit => "UserQuit",
            Self::UserNick => "UserNick",
            Self::UserKick => "UserKick",
            Self::KeepaliveReply => "KeepaliveReply",
            Self::PrivateMessage => "PrivateMessage",
            Self::ChannelMessage => "ChannelMessage",
            Self::SessionConnected => "SessionConnected",
            Self::SessionDisconnected => "SessionDisconnected",
            Self::ContentParseRequested => "ContentParseRequested",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An occurrence worth telling feature modules about.
///
/// Every variant names the network it happened on, so one handler can
/// serve all sessions.
#[derive(Clone, Debug)]
pub enum Event {
    UserJoin {
        network: String,
        channel: String,
        user: Sender,
    },
    UserPart {
        network: String,
        channel: String,
        user: Sender,
        reason: Option<String>,
    },
    UserQuit {
        network: String,
        user: Sender,
        reason: Option<String>,
    },
    UserNick {
        network: String,
        user: Sender,
        new_nick: String,
    },
    UserKick {
        network: String,
        channel: String,
        by: Sender,
        nick: String,
        reason: Option<String>,
    },
    KeepaliveReply {
        network: String,
        server: String,
        payload: String,
        /// Set when the reply matched an outstanding lag probe.
        lag: Option<Duration>,
    },
    PrivateMessage(MessageRequest),
    ChannelMessage(MessageRequest),
    SessionConnected {
        network: String,
    },
    SessionDisconnected {
        network: String,
        reason: String,
    },
    /// Free text nothing else claimed.
    ContentParseRequested(MessageRequest),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::UserJoin { .. } => EventKind::UserJoin,
            Self::UserPart { .. } => EventKind::UserPart,
            Self::UserQuit { .. } => EventKind::UserQuit,
            Self::UserNick { .. } => EventKind::UserNick,
            Self::UserKick { .. } => EventKind::UserKick,
            Self::KeepaliveReply { .. } => EventKind::KeepaliveReply,
            Self::PrivateMessage(_) => EventKind::PrivateMessage,
            Self::ChannelMessage(_) => EventKind::ChannelMessage,
            Self::SessionConnected { .. } => EventKind::SessionConnected,
            Self::SessionDisconnected { .. } => EventKind::SessionDisconnected,
            Self::ContentParseRequested(_) => EventKind::ContentParseRequested,
        }
    }

    /// The network the event came from.
    pub fn network(&self) -> &str {
        match self {
            Self::UserJoin { network, .. }
            | Self::UserPart { network, .. }
            | Self::UserQuit { network, .. }
            | Self::UserNick { network, .. }
            | Self::UserKick { network, .. }
            | Self::KeepaliveReply { network, .. }
            | Self::SessionConnected { network }
            | Self::SessionDisconnected { network, .. } => network,
            Self::PrivateMessage(req)
            | Self::ChannelMessage(req)
            | Self::ContentParseRequested(req) => &req.network,
        }
    }
}
