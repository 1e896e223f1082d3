//! Keyword → command table.
//!
//! Owned by one session; feature modules register against the handle
//! returned by `Session::commands`. Keywords are matched
//! case-insensitively.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::HandlerError;
use crate::roster::Roster;
use crate::session::{Outbound, SessionShared, render_status};

use super::MessageRequest;

/// What a command sees while it runs.
pub struct CommandContext<'a> {
    pub request: &'a MessageRequest,
    pub session: &'a SessionShared,
    pub roster: &'a Roster,
    pub outbound: &'a Outbound,
}

impl CommandContext<'_> {
    pub fn network(&self) -> &str {
        self.session.network()
    }

    /// The bot's current nick.
    pub fn nick(&self) -> String {
        self.session.nick()
    }

    /// Last measured round trip, if any.
    pub fn lag(&self) -> Option<Duration> {
        self.session.lag()
    }

    /// Multi-line status report for this session.
    pub fn status(&self) -> String {
        render_status(self.session, self.roster)
    }

    /// Send a lag probe; the answer is recorded when the PONG arrives.
    pub async fn lag_probe(&self) -> Result<(), HandlerError> {
        self.session.send_lag_probe(self.outbound).await
    }
}

/// A bot command.
///
/// An empty `Ok` string means "nothing to say". Errors are logged and the
/// line produces no reply.
#[async_trait]
pub trait BotCommand: Send + Sync {
    async fn run(&self, ctx: &CommandContext<'_>, args: &str) -> anyhow::Result<String>;
}

/// Adapter for synchronous closures.
struct FnCommand<F>(F);

#[async_trait]
impl<F> BotCommand for FnCommand<F>
where
    F: Fn(&CommandContext<'_>, &str) -> anyhow::Result<String> + Send + Sync,
{
    async fn run(&self, ctx: &CommandContext<'_>, args: &str) -> anyhow::Result<String> {
        (self.0)(ctx, args)
    }
}

/// Shared handle to one session's command table.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    commands: Arc<RwLock<HashMap<String, Arc<dyn BotCommand>>>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in commands.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        super::builtin::register_builtins(&registry);
        registry
    }

    /// Register `command` under `keyword`. Returns true if it replaced an
    /// existing entry.
    pub fn register(&self, keyword: &str, command: impl BotCommand + 'static) -> bool {
        self.commands
            .write()
            .insert(keyword.to_ascii_uppercase(), Arc::new(command))
            .is_some()
    }

    /// Register a synchronous closure.
    pub fn register_fn<F>(&self, keyword: &str, f: F) -> bool
    where
        F: Fn(&CommandContext<'_>, &str) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        self.register(keyword, FnCommand(f))
    }

    pub fn deregister(&self, keyword: &str) -> bool {
        self.commands
            .write()
            .remove(&keyword.to_ascii_uppercase())
            .is_some()
    }

    pub fn lookup(&self, keyword: &str) -> Option<Arc<dyn BotCommand>> {
        self.commands
            .read()
            .get(&keyword.to_ascii_uppercase())
            .cloned()
    }

    /// Registered keywords, sorted.
    pub fn keywords(&self) -> Vec<String> {
        let mut keywords: Vec<String> = self.commands.read().keys().cloned().collect();
        keywords.sort();
        keywords
    }

    pub fn len(&self) -> usize {
        self.commands.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_are_case_insensitive() {
        let registry = CommandRegistry::new();
        assert!(!registry.register_fn("ping", |_: &CommandContext<'_>, _: &str| Ok("pong".into())));
        assert!(registry.lookup("PING").is_some());
        assert!(registry.lookup("Ping").is_some());
        assert!(registry.register_fn("PING", |_: &CommandContext<'_>, _: &str| Ok("pong!".into())));
        assert_eq!(registry.len(), 1);

        assert!(registry.deregister("pInG"));
        assert!(registry.lookup("ping").is_none());
        assert!(!registry.deregister("ping"));
    }

    #[test]
    fn builtins_are_registered() {
        let registry = CommandRegistry::with_builtins();
        assert_eq!(
            registry.keywords(),
            vec!["LAG", "LAGCHECK", "SOURCE", "STATUS", "VERSION"]
        );
    }

    #[test]
    fn clones_share_the_table() {
        let registry = CommandRegistry::new();
        let other = registry.clone();
        other.register_fn("x", |_: &CommandContext<'_>, _: &str| Ok(String::new()));
        assert!(registry.lookup("X").is_some());
    }
}
