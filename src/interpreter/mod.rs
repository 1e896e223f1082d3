//! Message interpreter: turns chat text into command invocations.
//!
//! A line is a command when it starts with the trigger, or when it
//! addresses the bot by nick (`Subhuti: version`, `version, Subhuti`).
//! Anything that does not resolve to a registered command goes to the
//! parser chain.

mod builtin;
mod parser;
mod registry;
mod request;

pub use parser::{ContentParser, ParserChain, UrlDetector};
pub use registry::{BotCommand, CommandContext, CommandRegistry};
pub use request::MessageRequest;

use std::borrow::Cow;
use std::sync::Arc;

use parking_lot::Mutex;
use regex::Regex;
use tracing::{Instrument, debug, warn};

use crate::roster::Roster;
use crate::session::{Outbound, SessionShared};
use crate::telemetry::spans;

/// The parts of a session the interpreter reads while it works.
#[derive(Clone, Copy)]
pub struct SessionView<'a> {
    pub shared: &'a SessionShared,
    pub roster: &'a Roster,
    pub outbound: &'a Outbound,
}

/// Outcome of interpreting one line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Interpretation {
    /// Text to send back to [`MessageRequest::reply_target`].
    Reply(String),
    /// A command ran but had nothing to say, or failed.
    Silent,
    /// Neither a command nor a parser claimed the line.
    Unclaimed,
}

/// Nick-dependent patterns, rebuilt when the nick changes.
struct Patterns {
    nick: String,
    mention: Regex,
    leading: Regex,
    trailing: Regex,
}

impl Patterns {
    fn build(nick: &str) -> Result<Self, regex::Error> {
        let escaped = regex::escape(nick);
        Ok(Self {
            nick: nick.to_owned(),
            mention: Regex::new(&format!(r"(?i)\b{escaped}\b"))?,
            leading: Regex::new(&format!(r"(?i)^{escaped}[:,;.]?\s+(.*)$"))?,
            trailing: Regex::new(&format!(r"(?i)^(.+?)[,.:;]\s*{escaped}$"))?,
        })
    }
}

/// Per-session interpreter.
pub struct Interpreter {
    commands: CommandRegistry,
    parsers: ParserChain,
    patterns: Mutex<Option<Arc<Patterns>>>,
}

impl Interpreter {
    pub fn new(commands: CommandRegistry, parsers: ParserChain) -> Self {
        Self {
            commands,
            parsers,
            patterns: Mutex::new(None),
        }
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    pub fn parsers(&self) -> &ParserChain {
        &self.parsers
    }

    fn patterns(&self, nick: &str) -> Option<Arc<Patterns>> {
        let mut cached = self.patterns.lock();
        if let Some(p) = cached.as_ref().filter(|p| p.nick == nick) {
            return Some(Arc::clone(p));
        }
        match Patterns::build(nick) {
            Ok(p) => {
                let p = Arc::new(p);
                *cached = Some(Arc::clone(&p));
                Some(p)
            }
            Err(e) => {
                warn!(nick = %nick, error = %e, "cannot build nick patterns");
                None
            }
        }
    }

    /// Interpret one line. Sets `addressed` and `prefix_reply` on `req`.
    /// Private messages are read as if they started with the trigger;
    /// `req.text` itself is left as received.
    pub async fn interpret(&self, req: &mut MessageRequest, view: SessionView<'_>) -> Interpretation {
        let nick = view.shared.nick();
        let trigger = view.shared.trigger_for(req.channel.as_deref());
        let patterns = self.patterns(&nick);

        req.addressed = patterns
            .as_ref()
            .is_some_and(|p| p.mention.is_match(&req.text));

        {
            let text: Cow<'_, str> = if !req.is_channel && !req.text.starts_with(trigger) {
                Cow::Owned(format!("{trigger}{}", req.text))
            } else {
                Cow::Borrowed(req.text.as_str())
            };

            if let Some(line) = command_text(&text, trigger, patterns.as_deref()) {
                let (keyword, args) = split_keyword(line);
                if let Some(command) = self.commands.lookup(keyword) {
                    req.prefix_reply = req.is_channel && req.addressed;

                    let span =
                        spans::command(keyword, Some(&req.sender.nick), Some(req.reply_target()));
                    let ctx = CommandContext {
                        request: req,
                        session: view.shared,
                        roster: view.roster,
                        outbound: view.outbound,
                    };
                    let result = command.run(&ctx, args).instrument(span).await;

                    return match result {
                        Ok(reply) if reply.is_empty() => Interpretation::Silent,
                        Ok(reply) if req.prefix_reply => {
                            Interpretation::Reply(format!("{}: {}", req.sender.nick, reply))
                        }
                        Ok(reply) => Interpretation::Reply(reply),
                        Err(e) => {
                            warn!(keyword = %keyword, error = %e, "command failed");
                            Interpretation::Silent
                        }
                    };
                }
                debug!(keyword = %keyword, "no such command");
            }
        }

        match self.parsers.run(req).await {
            Some(reply) => Interpretation::Reply(reply),
            None => Interpretation::Unclaimed,
        }
    }
}

/// Extract the command part of `text`, trying the trigger form, then
/// `<nick>: cmd`, then `cmd, <nick>`.
fn command_text<'t>(text: &'t str, trigger: char, patterns: Option<&Patterns>) -> Option<&'t str> {
    if let Some(rest) = text.strip_prefix(trigger) {
        return Some(rest);
    }
    let patterns = patterns?;
    patterns
        .leading
        .captures(text)
        .or_else(|| patterns.trailing.captures(text))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Split at the first space into keyword and trimmed arguments. The
/// keyword must follow the trigger directly: a leading space yields an
/// empty keyword.
fn split_keyword(line: &str) -> (&str, &str) {
    let line = line.trim_end();
    match line.split_once(' ') {
        Some((keyword, args)) => (keyword, args.trim()),
        None => (line, ""),
    }
}
