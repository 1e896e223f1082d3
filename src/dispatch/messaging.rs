//! PRIVMSG and NOTICE.
//!
//! Chat lines are recorded, published, then handed to the interpreter.
//! CTCP requests sent to us privately are answered with a NOTICE.

use async_trait::async_trait;
use chrono::Local;
use subhuti_proto::{Ctcp, CtcpKind, Message};
use tracing::{debug, info};

use super::{Context, Handler, require};
use crate::bus::Event;
use crate::error::HandlerResult;
use crate::interpreter::{Interpretation, MessageRequest};
use crate::roster::{Direction, is_channel_name};
use crate::session::outbound::text_lines;
use crate::version::{SOURCE_URL, version_string};

/// CTCP commands we answer.
const CLIENTINFO: &str = "CLIENTINFO FINGER PING SOURCE TIME USERINFO VERSION";

pub struct PrivmsgHandler;

#[async_trait]
impl Handler for PrivmsgHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let target = require(msg, 0, "PRIVMSG")?;
        let text = require(msg, 1, "PRIVMSG")?.trim();
        let from = msg.prefix.as_deref().unwrap_or("");
        let nick = msg.source_nick().unwrap_or("");

        let mut req = if is_channel_name(target) {
            if let Some(ctcp) = Ctcp::parse(text) {
                if ctcp.kind == CtcpKind::Action
                    && let Some(chan) = ctx.roster.get_mut(target)
                {
                    chan.record(Direction::In, format!("* {} {}", nick, ctcp.params.unwrap_or("")));
                } else {
                    debug!(channel = %target, ctcp = %ctcp.kind, "ignoring channel CTCP");
                }
                return Ok(());
            }
            if let Some(chan) = ctx.roster.get_mut(target) {
                chan.record(Direction::In, format!("<{}>\t{}", nick, text));
            }
            let req = MessageRequest::channel(ctx.network(), from, target, text);
            ctx.publish(Event::ChannelMessage(req.clone()));
            req
        } else {
            if let Some(ctcp) = Ctcp::parse(text) {
                return answer_ctcp(ctx, nick, ctcp).await;
            }
            info!("<{}> {}", nick, text);
            let req = MessageRequest::private(ctx.network(), from, text);
            ctx.publish(Event::PrivateMessage(req.clone()));
            req
        };

        let interpreter = ctx.interpreter;
        match interpreter.interpret(&mut req, ctx.view()).await {
            Interpretation::Reply(reply) => send_reply(ctx, req.reply_target(), &reply).await,
            Interpretation::Silent => Ok(()),
            Interpretation::Unclaimed => {
                ctx.publish(Event::ContentParseRequested(req));
                Ok(())
            }
        }
    }
}

/// PRIVMSG each non-empty line of `reply`, echoing into the channel log.
async fn send_reply(ctx: &mut Context<'_>, target: &str, reply: &str) -> HandlerResult {
    let me = ctx.shared.nick();
    for line in text_lines(reply) {
        ctx.outbound.privmsg(target, line).await?;
        if let Some(chan) = ctx.roster.get_mut(target) {
            chan.record(Direction::Out, format!("<{}>\t{}", me, line));
        }
    }
    Ok(())
}

async fn answer_ctcp(ctx: &mut Context<'_>, nick: &str, ctcp: Ctcp<'_>) -> HandlerResult {
    let reply = match &ctcp.kind {
        CtcpKind::Version | CtcpKind::Finger => version_string(),
        CtcpKind::Source => SOURCE_URL.to_owned(),
        CtcpKind::Userinfo => format!("{} ({})", ctx.shared.nick(), ctx.shared.settings().realname),
        CtcpKind::Clientinfo => CLIENTINFO.to_owned(),
        CtcpKind::Ping => ctcp.params.unwrap_or("").to_owned(),
        CtcpKind::Time => Local::now().to_rfc2822(),
        CtcpKind::Action => {
            info!("* {} {}", nick, ctcp.params.unwrap_or(""));
            return Ok(());
        }
        CtcpKind::Unknown(name) => {
            info!(nick = %nick, ctcp = %name, "unknown CTCP request");
            return Ok(());
        }
    };
    debug!(nick = %nick, ctcp = %ctcp.kind, "answering CTCP");
    ctx.outbound
        .notice(nick, &Ctcp::reply(ctcp.kind.clone(), &reply))
        .await
}

pub struct NoticeHandler;

#[async_trait]
impl Handler for NoticeHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let target = require(msg, 0, "NOTICE")?;
        let text = msg.arg(1).unwrap_or("");
        let from = msg.source_nick().unwrap_or("*");

        if let Some(chan) = ctx.roster.get_mut(target) {
            chan.record(Direction::In, format!("-{}-\t{}", from, text));
        } else if ctx.shared.is_me(target) {
            info!("Notice from {}: {}", from, text);
        } else {
            info!("Notice from {} to {}: {}", from, target, text);
        }
        Ok(())
    }
}
