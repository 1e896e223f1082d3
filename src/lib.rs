//! Subhuti - a long-running IRC bot.
//!
//! Each configured network gets a [`Session`] that keeps one connection
//! alive, tracks joined channels in a [`Roster`], and feeds chat text to an
//! [`Interpreter`] (trigger commands first, then a chain of content
//! parsers). Everything worth reacting to is published on a shared
//! [`EventBus`].

pub mod bot;
pub mod bus;
pub mod config;
mod dispatch;
pub mod error;
pub mod interpreter;
pub mod roster;
pub mod session;
pub mod telemetry;
pub mod version;

pub use self::bot::Bot;
pub use self::bus::{Event, EventBus, EventKind, Priority, SubscriptionId};
pub use self::config::{BotConfig, Config, NetworkConfig};
pub use self::error::{HandlerError, SessionError};
pub use self::interpreter::{
    BotCommand, CommandContext, CommandRegistry, ContentParser, Interpreter, MessageRequest,
    ParserChain,
};
pub use self::roster::{Channel, ChannelSummary, Roster};
pub use self::session::{Session, SessionState};

pub use subhuti_proto as proto;
