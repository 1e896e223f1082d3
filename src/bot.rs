//! Top-level bot: one event bus shared by every configured session.

use tracing::{debug, info, warn};

use crate::bus::{Event, EventBus, EventKind, Priority};
use crate::config::Config;
use crate::session::Session;

pub struct Bot {
    config: Config,
    bus: EventBus,
    sessions: Vec<Session>,
}

impl Bot {
    pub fn new(config: Config) -> Self {
        let bus = EventBus::new();
        install_default_loggers(&bus);
        Self {
            config,
            bus,
            sessions: Vec::new(),
        }
    }

    /// Spawn one session per network and connect those marked
    /// `auto_connect`. Calling it twice is a no-op.
    pub fn start(&mut self) {
        if !self.sessions.is_empty() {
            return;
        }
        info!(
            name = %self.config.bot.name,
            networks = self.config.networks.len(),
            "Starting bot"
        );

        for settings in &self.config.networks {
            let session = Session::spawn(settings.clone(), &self.config.bot, self.bus.clone());
            if settings.auto_connect
                && let Err(e) = session.connect()
            {
                warn!(network = %settings.name, error = %e, "auto-connect failed");
            }
            self.sessions.push(session);
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The bus features subscribe to.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn session(&self, network: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.network() == network)
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// Stop every session, then the bus.
    pub async fn shutdown(&mut self) {
        info!("Shutting down");
        for session in self.sessions.drain(..) {
            session.stop().await;
        }
        self.bus.stop();
        debug!("bus stopped");
    }
}

fn install_default_loggers(bus: &EventBus) {
    for kind in [
        EventKind::UserJoin,
        EventKind::UserPart,
        EventKind::UserQuit,
        EventKind::UserNick,
        EventKind::KeepaliveReply,
        EventKind::SessionConnected,
        EventKind::SessionDisconnected,
    ] {
        bus.subscribe(kind, Priority::Low, log_event);
    }
}

fn log_event(event: &Event) -> anyhow::Result<()> {
    match event {
        Event::UserJoin { network, channel, user } => {
            info!(network = %network, "{} ({}) has joined {}", user.nick, user, channel);
        }
        Event::UserPart { network, channel, user, reason } => {
            info!(
                network = %network,
                "{} has left {} ({})",
                user.nick,
                channel,
                reason.as_deref().unwrap_or("")
            );
        }
        Event::UserQuit { network, user, reason } => {
            info!(
                network = %network,
                "{} has quit ({})",
                user.nick,
                reason.as_deref().unwrap_or("")
            );
        }
        Event::UserNick { network, user, new_nick } => {
            info!(network = %network, "{} is now known as {}", user.nick, new_nick);
        }
        Event::KeepaliveReply { network, server, lag, .. } => match lag {
            Some(lag) => info!(network = %network, server = %server, "lag: {:?}", lag),
            None => debug!(network = %network, server = %server, "keepalive reply"),
        },
        Event::SessionConnected { network } => info!(network = %network, "connected"),
        Event::SessionDisconnected { network, reason } => {
            info!(network = %network, reason = %reason, "disconnected");
        }
        other => debug!(event = %other.kind(), "event"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
[[network]]
name = "freenode"
server = "127.0.0.1"
port = 1
nick = "Subhuti"
auto_connect = false
"#;

    #[test]
    fn default_loggers_are_low_priority_subscribers() {
        let bot = Bot::new(Config::from_toml(CONFIG).unwrap());
        assert_eq!(bot.bus().handler_count(EventKind::UserJoin), 1);
        assert_eq!(bot.bus().handler_count(EventKind::ChannelMessage), 0);
    }

    #[tokio::test]
    async fn start_spawns_idle_sessions() {
        let mut bot = Bot::new(Config::from_toml(CONFIG).unwrap());
        bot.start();
        let session = bot.session("freenode").unwrap();
        assert_eq!(session.state(), crate::session::SessionState::Disconnected);
        assert!(bot.session("efnet").is_none());

        bot.shutdown().await;
        assert!(bot.sessions().is_empty());
        assert!(bot.bus().is_stopped());
    }
}
