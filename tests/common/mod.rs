//! Integration test common infrastructure.
//!
//! A scripted fake IRC server plus helpers for building sessions and
//! watching the event bus.

pub mod server;

use std::time::Duration;

use subhuti::bus::{Event, EventBus, EventKind, Priority};
use subhuti::config::{BotConfig, ChannelConfig, NetworkConfig};
use tokio::sync::mpsc;
use tokio::time::timeout;

#[allow(unused_imports)]
pub use server::{FakeServer, ServerConn};

/// How long any single wait in a test may take.
pub const WAIT: Duration = Duration::from_secs(5);

/// Settings pointing at a fake server on `port`.
pub fn network(port: u16, channels: &[&str]) -> NetworkConfig {
    let mut net = NetworkConfig::new("testnet", "127.0.0.1", port, "Subhuti");
    net.reconnect_delay_ms = 50;
    net.ping_interval_ms = 60_000;
    net.channels = channels
        .iter()
        .map(|name| ChannelConfig {
            name: (*name).to_owned(),
            trigger: None,
        })
        .collect();
    net
}

pub fn bot() -> BotConfig {
    BotConfig::default()
}

/// Forward every event of the given kinds into a channel.
pub fn watch(bus: &EventBus, kinds: &[EventKind]) -> mpsc::UnboundedReceiver<Event> {
    let (tx, rx) = mpsc::unbounded_channel();
    for kind in kinds {
        let tx = tx.clone();
        bus.subscribe(*kind, Priority::Low, move |event| {
            let _ = tx.send(event.clone());
            Ok(())
        });
    }
    rx
}

/// Wait for the next event of `kind`, skipping others.
pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<Event>, kind: EventKind) -> Event {
    timeout(WAIT, async {
        loop {
            match rx.recv().await {
                Some(event) if event.kind() == kind => return event,
                Some(_) => continue,
                None => panic!("event bus closed while waiting for {kind}"),
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {kind}"))
}

/// Poll `check` until it holds.
#[allow(dead_code)]
pub async fn eventually<F: FnMut() -> bool>(what: &str, mut check: F) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !check() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
