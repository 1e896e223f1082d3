//! Protocol command dispatch.
//!
//! Every parsed line goes through [`Dispatcher::dispatch`] on the
//! session's command task, one at a time. Handlers may update the roster,
//! publish events and queue outbound lines; they never block on anything
//! but the outbound queue.

mod channel;
mod connection;
mod messaging;

use std::collections::HashMap;

use async_trait::async_trait;
use subhuti_proto::Message;
use tracing::{Instrument, debug, warn};

use crate::bus::{Event, EventBus};
use crate::error::{HandlerError, HandlerResult};
use crate::interpreter::{Interpreter, SessionView};
use crate::roster::Roster;
use crate::session::{Outbound, SessionShared};
use crate::telemetry::{CommandTimer, spans};

use self::channel::{
    ChannelModeHandler, EndOfNamesHandler, InviteHandler, JoinErrorHandler, JoinHandler,
    KickHandler, ModeHandler, NamesHandler, PartHandler, TopicHandler, TopicReplyHandler,
};
use self::connection::{
    ErrorHandler, HostHiddenHandler, InfoHandler, NickHandler, NickInUseHandler, PingHandler,
    PongHandler, QuitHandler, RejectedHandler, UserModeHandler, WelcomeHandler, YourHostHandler,
};
use self::messaging::{NoticeHandler, PrivmsgHandler};

/// What a handler may touch.
pub struct Context<'a> {
    pub shared: &'a SessionShared,
    pub roster: &'a mut Roster,
    pub outbound: &'a Outbound,
    pub bus: &'a EventBus,
    pub interpreter: &'a Interpreter,
}

impl Context<'_> {
    pub fn network(&self) -> &str {
        self.shared.network()
    }

    pub fn publish(&self, event: Event) {
        self.bus.publish(event);
    }

    pub fn view(&self) -> SessionView<'_> {
        SessionView {
            shared: self.shared,
            roster: &*self.roster,
            outbound: self.outbound,
        }
    }
}

/// Handler for one protocol command.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult;
}

/// Fetch a required parameter.
pub(crate) fn require<'m>(msg: &'m Message, index: usize, command: &'static str) -> Result<&'m str, HandlerError> {
    msg.arg(index)
        .ok_or(HandlerError::NeedMoreParams { command })
}

/// Command → handler table, one per session.
pub struct Dispatcher {
    handlers: HashMap<&'static str, Box<dyn Handler>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let mut handlers: HashMap<&'static str, Box<dyn Handler>> = HashMap::new();

        // Connection
        handlers.insert("PING", Box::new(PingHandler));
        handlers.insert("PONG", Box::new(PongHandler));
        handlers.insert("ERROR", Box::new(ErrorHandler));
        handlers.insert("NICK", Box::new(NickHandler));
        handlers.insert("QUIT", Box::new(QuitHandler));
        handlers.insert("RPL_WELCOME", Box::new(WelcomeHandler));
        handlers.insert("RPL_YOURHOST", Box::new(YourHostHandler));
        handlers.insert("RPL_HOSTHIDDEN", Box::new(HostHiddenHandler));
        handlers.insert("RPL_UMODEIS", Box::new(UserModeHandler));
        handlers.insert("ERR_NICKNAMEINUSE", Box::new(NickInUseHandler));
        handlers.insert("ERR_PASSWDMISMATCH", Box::new(RejectedHandler));
        handlers.insert("ERR_YOUREBANNEDCREEP", Box::new(RejectedHandler));
        for numeric in connection::INFORMATIONAL {
            handlers.insert(numeric, Box::new(InfoHandler));
        }

        // Channels
        handlers.insert("JOIN", Box::new(JoinHandler));
        handlers.insert("PART", Box::new(PartHandler));
        handlers.insert("KICK", Box::new(KickHandler));
        handlers.insert("INVITE", Box::new(InviteHandler));
        handlers.insert("TOPIC", Box::new(TopicHandler));
        handlers.insert("MODE", Box::new(ModeHandler));
        handlers.insert("RPL_TOPIC", Box::new(TopicReplyHandler));
        handlers.insert("RPL_NOTOPIC", Box::new(TopicReplyHandler));
        handlers.insert("RPL_TOPICWHOTIME", Box::new(TopicReplyHandler));
        handlers.insert("RPL_CHANNELURL", Box::new(TopicReplyHandler));
        handlers.insert("RPL_CREATIONTIME", Box::new(TopicReplyHandler));
        handlers.insert("RPL_CHANNELMODEIS", Box::new(ChannelModeHandler));
        handlers.insert("RPL_NAMREPLY", Box::new(NamesHandler));
        handlers.insert("RPL_ENDOFNAMES", Box::new(EndOfNamesHandler));
        handlers.insert("ERR_INVITEONLYCHAN", Box::new(JoinErrorHandler));
        handlers.insert("ERR_CHANNELISFULL", Box::new(JoinErrorHandler));
        handlers.insert("ERR_BANNEDFROMCHAN", Box::new(JoinErrorHandler));
        handlers.insert("ERR_BADCHANNELKEY", Box::new(JoinErrorHandler));
        handlers.insert("ERR_NEEDREGGEDNICK", Box::new(JoinErrorHandler));

        // Messaging
        handlers.insert("PRIVMSG", Box::new(PrivmsgHandler));
        handlers.insert("NOTICE", Box::new(NoticeHandler));

        Self { handlers }
    }

    pub fn handles(&self, command: &str) -> bool {
        self.handlers.contains_key(command)
    }

    /// Run the handler for `msg`. Unknown commands are logged and dropped.
    pub async fn dispatch(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Some(handler) = self.handlers.get(msg.command.as_str()) else {
            debug!(command = %msg.command, "no handler");
            return Ok(());
        };

        let span = spans::command(&msg.command, msg.source_nick(), msg.arg(0));
        let _timer = CommandTimer::new(&msg.command);

        let result = handler.handle(ctx, msg).instrument(span).await;

        match &result {
            Ok(()) | Err(HandlerError::Disconnect(_)) => {}
            Err(e @ HandlerError::NeedMoreParams { .. }) => {
                debug!(command = %msg.command, error = %e, code = e.error_code(), "Command error");
            }
            Err(e) => {
                warn!(command = %msg.command, error = %e, code = e.error_code(), "Command error");
            }
        }
        result
    }
}
