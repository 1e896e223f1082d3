//! Connection-level commands and the server's welcome numerics.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use subhuti_proto::{Message, Response, Sender};
use tracing::{debug, info, warn};

use super::{Context, Handler, require};
use crate::bus::Event;
use crate::error::{HandlerError, HandlerResult, SessionError};
use crate::roster::Direction;

lazy_static! {
    /// `Your host is leaf.example.org[10.0.0.1/6667], running version ircd-2.11`
    static ref YOURHOST_RE: Regex = Regex::new(
        r"Your host is ([a-zA-Z0-9.-]*)(\[[0-9a-fA-F:./]*\])?, running version (.*)"
    )
    .expect("RPL_YOURHOST pattern is valid");
}

/// Numerics that are only logged.
pub(super) const INFORMATIONAL: [&str; 40] = [
    "RPL_CREATED",
    "RPL_MYINFO",
    "RPL_ISUPPORT",
    "RPL_YOURID",
    "RPL_STATSCONN",
    "RPL_LUSERCLIENT",
    "RPL_LUSEROP",
    "RPL_LUSERUNKNOWN",
    "RPL_LUSERCHANNELS",
    "RPL_LUSERME",
    "RPL_LOCALUSERS",
    "RPL_GLOBALUSERS",
    "RPL_MOTDSTART",
    "RPL_MOTD",
    "RPL_ENDOFMOTD",
    "RPL_AWAY",
    "RPL_UNAWAY",
    "RPL_NOWAWAY",
    "RPL_WHOISREGNICK",
    "RPL_WHOISUSER",
    "RPL_WHOISSERVER",
    "RPL_WHOISOPERATOR",
    "RPL_WHOWASUSER",
    "RPL_ENDOFWHO",
    "RPL_WHOISIDLE",
    "RPL_ENDOFWHOIS",
    "RPL_WHOISCHANNELS",
    "RPL_WHOISACCOUNT",
    "RPL_WHOISHOST",
    "RPL_WHOISSECURE",
    "ERR_NOMOTD",
    "ERR_NOSUCHNICK",
    "ERR_NOSUCHCHANNEL",
    "ERR_CANNOTSENDTOCHAN",
    "ERR_UNKNOWNCOMMAND",
    "ERR_NOTONCHANNEL",
    "ERR_CHANOPRIVSNEEDED",
    "ERR_NEEDMOREPARAMS",
    "ERR_NOTREGISTERED",
    "ERR_ERRONEUSNICKNAME",
];

/// Numeric text without our own nick in front.
fn numeric_text(msg: &Message) -> String {
    msg.params.iter().skip(1).map(String::as_str).collect::<Vec<_>>().join(" ")
}

fn sender(msg: &Message) -> Sender {
    msg.sender().unwrap_or_default()
}

/// `PING` → `PONG` with the same token.
pub struct PingHandler;

#[async_trait]
impl Handler for PingHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let token = msg.trailing().unwrap_or("");
        ctx.outbound.send(Message::pong(token)).await
    }
}

/// `PONG`: completes lag probes and tells the bus.
pub struct PongHandler;

#[async_trait]
impl Handler for PongHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let payload = msg.trailing().unwrap_or("").to_owned();
        let server = msg
            .prefix
            .clone()
            .or_else(|| msg.arg(0).map(str::to_owned))
            .unwrap_or_default();

        let lag = ctx.shared.complete_lag_probe(&payload);
        ctx.publish(Event::KeepaliveReply {
            network: ctx.network().to_owned(),
            server,
            payload,
            lag,
        });
        Ok(())
    }
}

/// `ERROR`: the server is closing the link.
pub struct ErrorHandler;

#[async_trait]
impl Handler for ErrorHandler {
    async fn handle(&self, _ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let reason = msg.trailing().unwrap_or("closing link").to_owned();
        warn!(reason = %reason, "server error");
        Err(HandlerError::Disconnect(SessionError::Server(reason)))
    }
}

pub struct NickHandler;

#[async_trait]
impl Handler for NickHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let new_nick = require(msg, 0, "NICK")?;
        let user = sender(msg);

        if ctx.shared.is_me(&user.nick) {
            info!(old = %user.nick, new = %new_nick, "own nick changed");
            ctx.shared.set_nick(new_nick);
        }

        for channel in ctx.roster.channels_mut() {
            if channel.rename_member(&user.nick, new_nick) {
                channel.record(
                    Direction::Neutral,
                    format!("{} is now known as {}", user.nick, new_nick),
                );
            }
        }

        ctx.publish(Event::UserNick {
            network: ctx.network().to_owned(),
            user,
            new_nick: new_nick.to_owned(),
        });
        Ok(())
    }
}

pub struct QuitHandler;

#[async_trait]
impl Handler for QuitHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let user = sender(msg);
        let reason = msg.arg(0).filter(|r| !r.is_empty()).map(str::to_owned);

        if ctx.shared.is_me(&user.nick) {
            info!(reason = ?reason, "own quit confirmed");
        }

        for channel in ctx.roster.channels_mut() {
            if channel.remove_member(&user.nick) {
                let line = match &reason {
                    Some(r) => format!("{} ({}) has quit ({})", user.nick, user, r),
                    None => format!("{} ({}) has quit", user.nick, user),
                };
                channel.record(Direction::Out, line);
            }
        }

        ctx.publish(Event::UserQuit {
            network: ctx.network().to_owned(),
            user,
            reason,
        });
        Ok(())
    }
}

/// `RPL_WELCOME`: the server's idea of our nick is authoritative.
pub struct WelcomeHandler;

#[async_trait]
impl Handler for WelcomeHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        if let Some(nick) = msg.arg(0)
            && !ctx.shared.is_me(nick)
        {
            ctx.shared.set_nick(nick);
        }
        info!("{}", msg.trailing().unwrap_or(""));
        Ok(())
    }
}

/// `RPL_YOURHOST`: record the server host and version.
pub struct YourHostHandler;

#[async_trait]
impl Handler for YourHostHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let text = msg.trailing().unwrap_or("");
        match YOURHOST_RE.captures(text) {
            Some(caps) => {
                let host = caps.get(1).map_or("", |m| m.as_str());
                let version = caps.get(3).map_or("", |m| m.as_str());
                ctx.shared.set_server(host, version);
            }
            None => debug!(text = %text, "unrecognized RPL_YOURHOST"),
        }
        info!("{}", text);
        Ok(())
    }
}

/// `RPL_HOSTHIDDEN`: `<me> <host> :is now your hidden host`
pub struct HostHiddenHandler;

#[async_trait]
impl Handler for HostHiddenHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let host = require(msg, 1, "RPL_HOSTHIDDEN")?;
        info!(host = %host, "visible host changed");
        ctx.shared.set_visible_host(host);
        Ok(())
    }
}

/// `RPL_UMODEIS`: `<me> <modes>`
pub struct UserModeHandler;

#[async_trait]
impl Handler for UserModeHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let modes = require(msg, 1, "RPL_UMODEIS")?;
        ctx.shared.set_user_mode(modes);
        Ok(())
    }
}

/// Longest nick we will grow to while dodging collisions.
const MAX_ALT_NICK_LEN: usize = 30;

/// `ERR_NICKNAMEINUSE`: retry with `_` appended.
pub struct NickInUseHandler;

#[async_trait]
impl Handler for NickInUseHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let taken = require(msg, 1, "ERR_NICKNAMEINUSE")?;
        if !ctx.shared.is_me(taken) {
            debug!(nick = %taken, "nick in use, not ours");
            return Ok(());
        }

        let alternative = format!("{taken}_");
        if alternative.len() > MAX_ALT_NICK_LEN {
            return Err(HandlerError::Disconnect(SessionError::Registration(format!(
                "no free nick near {taken}"
            ))));
        }

        warn!(nick = %taken, trying = %alternative, "nick in use");
        ctx.shared.set_nick(&alternative);
        ctx.outbound.send(Message::nick(&alternative)).await
    }
}

/// `ERR_PASSWDMISMATCH`, `ERR_YOUREBANNEDCREEP`: registration refused.
pub struct RejectedHandler;

#[async_trait]
impl Handler for RejectedHandler {
    async fn handle(&self, _ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let reason = format!("{}: {}", msg.command, msg.trailing().unwrap_or(""));
        Err(HandlerError::Disconnect(SessionError::Registration(reason)))
    }
}

/// Numerics we only log. Errors go to warn.
pub struct InfoHandler;

#[async_trait]
impl Handler for InfoHandler {
    async fn handle(&self, _ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let text = numeric_text(msg);
        if Response::from_name(&msg.command).is_some_and(|r| r.is_error()) {
            warn!(numeric = %msg.command, "{}", text);
        } else {
            info!(numeric = %msg.command, "{}", text);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Harness;
    use crate::bus::{Event, EventKind};
    use crate::error::HandlerError;
    use crate::session::PROBE_MARKER;

    #[tokio::test]
    async fn ping_is_answered() {
        let mut h = Harness::new();
        h.feed("PING :irc.example.org").await.unwrap();
        assert_eq!(h.sent(), vec!["PONG irc.example.org"]);
    }

    #[tokio::test]
    async fn pong_completes_lag_probe() {
        let mut h = Harness::new();
        let payload = format!("{PROBE_MARKER} {}", h.shared.clock());
        h.feed(&format!(":leaf.example.org PONG leaf.example.org :{payload}"))
            .await
            .unwrap();

        assert!(h.shared.lag().is_some());
        let events = h.events.lock();
        match events.last() {
            Some(Event::KeepaliveReply { server, lag, .. }) => {
                assert_eq!(server, "leaf.example.org");
                assert!(lag.is_some());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn plain_pong_has_no_lag() {
        let mut h = Harness::new();
        h.feed(":leaf PONG leaf :leaf").await.unwrap();
        assert!(h.shared.lag().is_none());
        assert_eq!(h.event_kinds(), vec![EventKind::KeepaliveReply]);
    }

    #[tokio::test]
    async fn error_requests_disconnect() {
        let mut h = Harness::new();
        let err = h.feed("ERROR :Closing Link: flood").await.unwrap_err();
        assert!(matches!(err, HandlerError::Disconnect(_)));
    }

    #[tokio::test]
    async fn yourhost_sets_server_identity() {
        let mut h = Harness::new();
        h.feed(":leaf 002 Subhuti :Your host is rajaniemi.freenode.net[195.148.124.79/7000], running version ircd-seven-1.1.3")
            .await
            .unwrap();
        let server = h.shared.server();
        assert_eq!(server.host, "rajaniemi.freenode.net");
        assert_eq!(server.version, "ircd-seven-1.1.3");
        assert_eq!(h.shared.keepalive_target(), "rajaniemi.freenode.net");
    }

    #[tokio::test]
    async fn nick_change_renames_members() {
        let mut h = Harness::new();
        h.joined("#rust", &["alice"]).await;
        h.feed(":alice!a@h NICK :alicia").await.unwrap();

        let chan = h.roster.get("#rust").unwrap();
        assert!(chan.has_member("alicia"));
        assert!(!chan.has_member("alice"));
        assert_eq!(h.event_kinds(), vec![EventKind::UserNick]);
    }

    #[tokio::test]
    async fn own_nick_change_is_tracked() {
        let mut h = Harness::new();
        h.feed(":Subhuti!bot@h NICK Subhuti2").await.unwrap();
        assert_eq!(h.shared.nick(), "Subhuti2");
    }

    #[tokio::test]
    async fn quit_removes_from_every_channel() {
        let mut h = Harness::new();
        h.joined("#a", &["bob"]).await;
        h.joined("#b", &["bob", "carol"]).await;
        h.feed(":bob!b@h QUIT :bye").await.unwrap();

        assert!(!h.roster.get("#a").unwrap().has_member("bob"));
        assert!(!h.roster.get("#b").unwrap().has_member("bob"));
        assert!(h.roster.get("#b").unwrap().has_member("carol"));
        assert_eq!(h.event_kinds(), vec![EventKind::UserQuit]);
    }

    #[tokio::test]
    async fn nick_in_use_tries_alternative() {
        let mut h = Harness::new();
        h.feed(":srv 433 * Subhuti :Nickname is already in use").await.unwrap();
        assert_eq!(h.shared.nick(), "Subhuti_");
        assert_eq!(h.sent(), vec!["NICK Subhuti_"]);
    }

    #[tokio::test]
    async fn bad_password_requests_disconnect() {
        let mut h = Harness::new();
        let err = h.feed(":srv 464 Subhuti :Password incorrect").await.unwrap_err();
        assert_eq!(err.error_code(), "disconnect");
    }
}
