//! Channel membership, topic and mode tracking.
//!
//! Our own JOIN creates the roster entry; our own PART or KICK drops it.
//! Replies about channels we do not track are logged and ignored.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use subhuti_proto::{Message, Sender};
use tracing::{debug, info, warn};

use super::{Context, Handler, require};
use crate::bus::Event;
use crate::error::HandlerResult;
use crate::roster::{Direction, Membership, is_channel_name};

fn sender(msg: &Message) -> Sender {
    msg.sender().unwrap_or_default()
}

fn format_time(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|t| t.with_timezone(&Local).to_rfc2822())
        .unwrap_or_else(|| ts.to_string())
}

/// Modes whose argument is consumed when set (`+`) and when unset (`-`).
fn takes_argument(mode: char, adding: bool) -> bool {
    match mode {
        'o' | 'v' | 'h' | 'q' | 'a' | 'b' | 'e' | 'I' | 'k' => true,
        'l' | 'f' | 'j' => adding,
        _ => false,
    }
}

pub struct JoinHandler;

#[async_trait]
impl Handler for JoinHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let channel = require(msg, 0, "JOIN")?;
        let user = sender(msg);

        if ctx.shared.is_me(&user.nick) {
            info!(channel = %channel, "joined");
            let chan = ctx.roster.track(channel)?;
            chan.add_member(&user.nick, Membership::default());
            chan.record(Direction::In, format!("{} ({}) has joined {}", user.nick, user, channel));
        } else if let Some(chan) = ctx.roster.get_mut(channel) {
            chan.add_member(&user.nick, Membership::default());
            chan.record(Direction::In, format!("{} ({}) has joined {}", user.nick, user, channel));
        } else {
            debug!(channel = %channel, nick = %user.nick, "join seen for untracked channel");
        }

        ctx.publish(Event::UserJoin {
            network: ctx.network().to_owned(),
            channel: channel.to_owned(),
            user,
        });
        Ok(())
    }
}

pub struct PartHandler;

#[async_trait]
impl Handler for PartHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let channel = require(msg, 0, "PART")?;
        let reason = msg.arg(1).filter(|r| !r.is_empty()).map(str::to_owned);
        let user = sender(msg);

        if ctx.shared.is_me(&user.nick) {
            info!(channel = %channel, "left");
            ctx.roster.untrack(channel)?;
        } else if let Some(chan) = ctx.roster.get_mut(channel) {
            chan.remove_member(&user.nick);
            let line = match &reason {
                Some(r) => format!("{} ({}) has left {} ({})", user.nick, user, channel, r),
                None => format!("{} ({}) has left {}", user.nick, user, channel),
            };
            chan.record(Direction::Out, line);
        }

        ctx.publish(Event::UserPart {
            network: ctx.network().to_owned(),
            channel: channel.to_owned(),
            user,
            reason,
        });
        Ok(())
    }
}

/// `KICK <channel> <nick> [:reason]`
pub struct KickHandler;

#[async_trait]
impl Handler for KickHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let channel = require(msg, 0, "KICK")?;
        let nick = require(msg, 1, "KICK")?;
        let reason = msg.arg(2).filter(|r| !r.is_empty()).map(str::to_owned);
        let by = sender(msg);

        if ctx.shared.is_me(nick) {
            warn!(channel = %channel, by = %by.nick, reason = ?reason, "kicked");
            ctx.roster.untrack(channel)?;
        } else if let Some(chan) = ctx.roster.get_mut(channel) {
            chan.remove_member(nick);
            chan.record(
                Direction::Out,
                format!("{} was kicked by {} ({})", nick, by.nick, reason.as_deref().unwrap_or("")),
            );
        }

        ctx.publish(Event::UserKick {
            network: ctx.network().to_owned(),
            channel: channel.to_owned(),
            by,
            nick: nick.to_owned(),
            reason,
        });
        Ok(())
    }
}

/// `INVITE <me> <channel>`: accept by joining.
pub struct InviteHandler;

#[async_trait]
impl Handler for InviteHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let target = require(msg, 0, "INVITE")?;
        let channel = require(msg, 1, "INVITE")?;
        let from = sender(msg);

        if !ctx.shared.is_me(target) {
            warn!(target = %target, channel = %channel, "invite not addressed to us");
            return Ok(());
        }
        info!(by = %from.nick, channel = %channel, "invited");
        ctx.outbound.send(Message::join(channel)).await
    }
}

/// `TOPIC <channel> :<topic>` from a member.
pub struct TopicHandler;

#[async_trait]
impl Handler for TopicHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let channel = require(msg, 0, "TOPIC")?;
        let topic = msg.arg(1).unwrap_or("");
        let by = sender(msg);

        if let Some(chan) = ctx.roster.get_mut(channel) {
            chan.set_topic(Some(topic));
            chan.set_topic_set_by(&by.to_string(), Local::now().timestamp());
            chan.record(
                Direction::Neutral,
                format!("{} changed the topic of {} to: {}", by.nick, channel, topic),
            );
        }
        Ok(())
    }
}

/// `MODE <target> <modes> [args...]`
pub struct ModeHandler;

#[async_trait]
impl Handler for ModeHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let target = require(msg, 0, "MODE")?;
        let modes = require(msg, 1, "MODE")?;
        let by = sender(msg);

        if !is_channel_name(target) {
            if ctx.shared.is_me(target) {
                ctx.shared.set_user_mode(modes);
                info!(modes = %modes, "user mode");
            } else {
                warn!(target = %target, "mode change for another user");
            }
            return Ok(());
        }

        let Some(chan) = ctx.roster.get_mut(target) else {
            debug!(channel = %target, "mode for untracked channel");
            return Ok(());
        };

        let mut args = msg.params.iter().skip(2).map(String::as_str);
        let mut adding = true;
        for mode in modes.chars() {
            match mode {
                '+' => adding = true,
                '-' => adding = false,
                'o' | 'v' => {
                    if let Some(nick) = args.next() {
                        chan.set_flag(nick, mode, adding);
                    }
                }
                m if takes_argument(m, adding) => {
                    args.next();
                }
                _ => {}
            }
        }

        let change = msg.params[1..].join(" ");
        chan.record(Direction::Neutral, format!("Mode {} [{}] by {}", target, change, by.nick));
        Ok(())
    }
}

/// Topic and channel-info numerics: 331, 332, 333, 328, 329.
pub struct TopicReplyHandler;

#[async_trait]
impl Handler for TopicReplyHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let command: &'static str = match msg.command.as_str() {
            "RPL_TOPIC" => "RPL_TOPIC",
            "RPL_NOTOPIC" => "RPL_NOTOPIC",
            "RPL_TOPICWHOTIME" => "RPL_TOPICWHOTIME",
            "RPL_CHANNELURL" => "RPL_CHANNELURL",
            _ => "RPL_CREATIONTIME",
        };
        let channel = require(msg, 1, command)?;
        let value = require(msg, 2, command)?;

        let Some(chan) = ctx.roster.get_mut(channel) else {
            debug!(channel = %channel, numeric = %command, "reply for untracked channel");
            return Ok(());
        };

        match command {
            "RPL_TOPIC" => {
                chan.set_topic(Some(value));
                chan.record(Direction::Neutral, format!("Topic for {} is \"{}\"", channel, value));
            }
            "RPL_NOTOPIC" => chan.set_topic(None),
            "RPL_TOPICWHOTIME" => {
                let at = msg.arg(3).and_then(|t| t.parse::<i64>().ok()).unwrap_or(0);
                let who = Sender::parse(value);
                let display = if who.is_user() {
                    format!("{} ({}@{})", who.nick, who.user, who.host)
                } else {
                    who.nick
                };
                chan.set_topic_set_by(value, at);
                chan.record(
                    Direction::Neutral,
                    format!("Topic set by {} on {}", display, format_time(at)),
                );
            }
            "RPL_CHANNELURL" => {
                chan.set_url(value);
                chan.record(Direction::Neutral, format!("URL for {}: {}", channel, value));
            }
            _ => {
                if let Ok(at) = value.parse::<i64>() {
                    chan.set_created(at);
                }
            }
        }
        Ok(())
    }
}

/// `RPL_CHANNELMODEIS`: `<me> <channel> <modes> [args...]`
pub struct ChannelModeHandler;

#[async_trait]
impl Handler for ChannelModeHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let channel = require(msg, 1, "RPL_CHANNELMODEIS")?;
        require(msg, 2, "RPL_CHANNELMODEIS")?;
        if let Some(chan) = ctx.roster.get_mut(channel) {
            chan.set_modes(&msg.params[2..].join(" "));
        }
        Ok(())
    }
}

/// `RPL_NAMREPLY`: `<me> <type> <channel> :<nicks>`
pub struct NamesHandler;

#[async_trait]
impl Handler for NamesHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let me = require(msg, 0, "RPL_NAMREPLY")?;
        let kind = require(msg, 1, "RPL_NAMREPLY")?;
        let channel = require(msg, 2, "RPL_NAMREPLY")?;
        let nicks = msg.arg(3).unwrap_or("");

        if !ctx.shared.is_me(me) {
            warn!(nick = %me, "names reply addressed to someone else");
            return Ok(());
        }
        let Some(chan) = ctx.roster.get_mut(channel) else {
            debug!(channel = %channel, "names for untracked channel");
            return Ok(());
        };

        if let Some(&mode) = kind.as_bytes().first() {
            chan.set_mode(mode);
        }
        for entry in nicks.split_whitespace() {
            let (flags, nick) = Membership::from_names_entry(entry);
            if !nick.is_empty() {
                chan.add_member(nick, flags);
            }
        }
        Ok(())
    }
}

/// `RPL_ENDOFNAMES`: log the membership summary.
pub struct EndOfNamesHandler;

#[async_trait]
impl Handler for EndOfNamesHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let channel = require(msg, 1, "RPL_ENDOFNAMES")?;
        if let Some(chan) = ctx.roster.get_mut(channel) {
            let summary = chan.names_summary();
            chan.record(Direction::Neutral, format!("Channel {}: {}", channel, summary));
        }
        Ok(())
    }
}

/// Join refusals: `<me> <channel> :<reason>`
pub struct JoinErrorHandler;

#[async_trait]
impl Handler for JoinErrorHandler {
    async fn handle(&self, _ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let channel = msg.arg(1).unwrap_or("");
        let reason = msg.arg(2).unwrap_or("");
        warn!(numeric = %msg.command, channel = %channel, "cannot join: {}", reason);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Harness;
    use crate::bus::EventKind;
    use crate::roster::Membership;

    #[tokio::test]
    async fn own_join_tracks_channel() {
        let mut h = Harness::new();
        h.feed(":Subhuti!bot@host JOIN #rust").await.unwrap();
        assert!(h.roster.contains("#rust"));
        assert!(h.roster.get("#rust").unwrap().has_member("Subhuti"));
        assert_eq!(h.event_kinds(), vec![EventKind::UserJoin]);
    }

    #[tokio::test]
    async fn double_own_join_is_an_error_not_a_panic() {
        let mut h = Harness::new();
        h.feed(":Subhuti!bot@host JOIN #rust").await.unwrap();
        let err = h.feed(":Subhuti!bot@host JOIN #rust").await.unwrap_err();
        assert_eq!(err.error_code(), "channel_already_tracked");
        assert_eq!(h.roster.len(), 1);
    }

    #[tokio::test]
    async fn others_join_and_part() {
        let mut h = Harness::new();
        h.joined("#rust", &[]).await;
        h.feed(":alice!a@h JOIN #rust").await.unwrap();
        assert!(h.roster.get("#rust").unwrap().has_member("alice"));

        h.feed(":alice!a@h PART #rust :later").await.unwrap();
        assert!(!h.roster.get("#rust").unwrap().has_member("alice"));
        assert!(h.roster.contains("#rust"));
        assert_eq!(h.event_kinds(), vec![EventKind::UserJoin, EventKind::UserPart]);
    }

    #[tokio::test]
    async fn departures_match_members_in_any_case() {
        let mut h = Harness::new();
        h.joined("#rust", &["alice", "@bob", "carol"]).await;

        h.feed(":ALICE!a@h PART #rust").await.unwrap();
        h.feed(":op!o@h KICK #rust Carol :behave").await.unwrap();
        let chan = h.roster.get("#rust").unwrap();
        assert!(!chan.has_member("alice"));
        assert!(!chan.has_member("carol"));
        assert_eq!(chan.member("BOB"), Some(Membership { op: true, voice: false }));
        assert_eq!(chan.member_count(), 2);
    }

    #[tokio::test]
    async fn own_part_drops_channel() {
        let mut h = Harness::new();
        h.joined("#rust", &["alice"]).await;
        h.feed(":Subhuti!bot@host PART #rust").await.unwrap();
        assert!(!h.roster.contains("#rust"));

        let err = h.feed(":Subhuti!bot@host PART #rust").await.unwrap_err();
        assert_eq!(err.error_code(), "channel_not_tracked");
    }

    #[tokio::test]
    async fn kick_of_self_drops_channel() {
        let mut h = Harness::new();
        h.joined("#rust", &["op"]).await;
        h.feed(":op!o@h KICK #rust Subhuti :behave").await.unwrap();
        assert!(!h.roster.contains("#rust"));
        assert_eq!(h.event_kinds(), vec![EventKind::UserKick]);
    }

    #[tokio::test]
    async fn names_reply_populates_members() {
        let mut h = Harness::new();
        h.joined("#rust", &["@alice", "+bob", "carol"]).await;
        let chan = h.roster.get("#rust").unwrap();
        assert_eq!(chan.member_count(), 4);
        assert_eq!(chan.member("alice"), Some(Membership { op: true, voice: false }));
        assert_eq!(chan.member("bob"), Some(Membership { op: false, voice: true }));
        assert_eq!(chan.mode(), b'=');
        assert_eq!(chan.names_summary(), "4 nicks (1 ops, 1 voices, 2 normals)");
    }

    #[tokio::test]
    async fn names_for_untracked_channel_is_ignored() {
        let mut h = Harness::new();
        h.feed(":srv 353 Subhuti = #elsewhere :a b c").await.unwrap();
        assert!(h.roster.is_empty());
    }

    #[tokio::test]
    async fn invite_triggers_join() {
        let mut h = Harness::new();
        h.feed(":alice!a@h INVITE Subhuti :#secret").await.unwrap();
        assert_eq!(h.sent(), vec!["JOIN #secret"]);

        h.feed(":alice!a@h INVITE someone :#secret").await.unwrap();
        assert!(h.sent().is_empty());
    }

    #[tokio::test]
    async fn mode_changes_update_flags() {
        let mut h = Harness::new();
        h.joined("#rust", &["alice", "+bob"]).await;
        h.feed(":ChanServ!s@services MODE #rust +o-v+b alice bob *!*@spam")
            .await
            .unwrap();
        let chan = h.roster.get("#rust").unwrap();
        assert_eq!(chan.member("alice"), Some(Membership { op: true, voice: false }));
        assert_eq!(chan.member("bob"), Some(Membership::default()));
    }

    #[tokio::test]
    async fn user_mode_is_recorded() {
        let mut h = Harness::new();
        h.feed(":Subhuti MODE Subhuti :+iw").await.unwrap();
        assert_eq!(h.shared.user_mode(), "+iw");
    }

    #[tokio::test]
    async fn topic_numerics_update_channel() {
        let mut h = Harness::new();
        h.joined("#hpc", &[]).await;
        h.feed(":srv 332 Subhuti #hpc :All things HPC").await.unwrap();
        h.feed(":srv 333 Subhuti #hpc EOF!~h@example.net 1290112601").await.unwrap();
        h.feed(":srv 328 Subhuti #hpc :http://hpc.example.org/").await.unwrap();

        let chan = h.roster.get("#hpc").unwrap();
        assert_eq!(chan.topic(), Some("All things HPC"));
        assert_eq!(chan.topic_set_by(), Some(("EOF!~h@example.net", 1290112601)));
        assert_eq!(chan.url(), Some("http://hpc.example.org/"));

        h.feed(":alice!a@h TOPIC #hpc :new topic").await.unwrap();
        assert_eq!(h.roster.get("#hpc").unwrap().topic(), Some("new topic"));
    }
}
