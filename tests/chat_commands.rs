//! Chat text over the wire: trigger commands, addressed commands, the
//! parser chain and CTCP.

mod common;

use std::time::Duration;

use async_trait::async_trait;
use common::{FakeServer, ServerConn, next_event, watch};
use subhuti::bus::{Event, EventBus, EventKind, Priority};
use subhuti::interpreter::{CommandContext, ContentParser, MessageRequest};
use subhuti::session::Session;

/// Connected session with `#rust` joined.
async fn joined(bus: EventBus) -> (FakeServer, ServerConn, Session) {
    let server = FakeServer::bind().await.unwrap();
    let mut events = watch(&bus, &[EventKind::UserJoin]);
    let session = Session::spawn(common::network(server.port(), &["#rust"]), &common::bot(), bus);
    session.connect().unwrap();

    let mut conn = server.accept().await.unwrap();
    conn.register("Subhuti").await.unwrap();
    conn.recv_command("JOIN").await.unwrap();
    conn.confirm_join("Subhuti", "#rust", &["alice"]).await.unwrap();
    next_event(&mut events, EventKind::UserJoin).await;
    (server, conn, session)
}

#[tokio::test]
async fn trigger_command_reply_is_unprefixed() {
    let (_server, mut conn, session) = joined(EventBus::new()).await;

    conn.send(":alice!a@example.org PRIVMSG #rust :?version").await.unwrap();
    let reply = conn.recv_command("PRIVMSG").await.unwrap();
    assert_eq!(reply.arg(0), Some("#rust"));
    assert_eq!(reply.arg(1), Some("Subhuti version 0.1.1"));

    session.stop().await;
}

#[tokio::test]
async fn addressed_command_reply_is_prefixed() {
    let (_server, mut conn, session) = joined(EventBus::new()).await;

    conn.send(":alice!a@example.org PRIVMSG #rust :Subhuti: version").await.unwrap();
    let reply = conn.recv_command("PRIVMSG").await.unwrap();
    assert_eq!(reply.arg(1), Some("alice: Subhuti version 0.1.1"));

    conn.send(":alice!a@example.org PRIVMSG #rust :source, subhuti").await.unwrap();
    let reply = conn.recv_command("PRIVMSG").await.unwrap();
    assert_eq!(
        reply.arg(1).map(|t| t.starts_with("alice: http")),
        Some(true)
    );

    session.stop().await;
}

#[tokio::test]
async fn registered_command_runs() {
    let (_server, mut conn, session) = joined(EventBus::new()).await;
    session
        .commands()
        .register_fn("echo", |ctx: &CommandContext<'_>, args: &str| {
            Ok(format!("{} said {args}", ctx.request.sender.nick))
        });

    conn.send(":alice!a@example.org PRIVMSG #rust :?ECHO hello there").await.unwrap();
    let reply = conn.recv_command("PRIVMSG").await.unwrap();
    assert_eq!(reply.arg(1), Some("alice said hello there"));

    session.stop().await;
}

struct Weather;

#[async_trait]
impl ContentParser for Weather {
    fn name(&self) -> &str {
        "weather"
    }

    async fn parse(&self, req: &mut MessageRequest) -> anyhow::Result<Option<String>> {
        Ok(req.text.contains("weather").then(|| "sunny".to_owned()))
    }
}

#[tokio::test]
async fn unknown_keyword_falls_through_to_parsers() {
    let bus = EventBus::new();
    let mut unclaimed = watch(&bus, &[EventKind::ContentParseRequested]);
    let (_server, mut conn, session) = joined(bus).await;
    session.parsers().push(Weather);

    conn.send(":alice!a@example.org PRIVMSG #rust :?weather today").await.unwrap();
    let reply = conn.recv_command("PRIVMSG").await.unwrap();
    assert_eq!(reply.arg(1), Some("sunny"));

    conn.send(":alice!a@example.org PRIVMSG #rust :?nothing matches").await.unwrap();
    match next_event(&mut unclaimed, EventKind::ContentParseRequested).await {
        Event::ContentParseRequested(req) => assert_eq!(req.text, "?nothing matches"),
        other => panic!("unexpected {other:?}"),
    }

    session.stop().await;
}

#[tokio::test]
async fn high_priority_subscriber_sees_messages_first() {
    let bus = EventBus::new();
    let order = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
    for (priority, tag) in [(Priority::Low, "low"), (Priority::High, "high")] {
        let order = std::sync::Arc::clone(&order);
        bus.subscribe(EventKind::ChannelMessage, priority, move |_| {
            order.lock().push(tag);
            Ok(())
        });
    }
    let mut seen = watch(&bus, &[EventKind::ChannelMessage]);
    let (_server, mut conn, session) = joined(bus).await;

    conn.send(":alice!a@example.org PRIVMSG #rust :just chatting").await.unwrap();
    next_event(&mut seen, EventKind::ChannelMessage).await;
    assert_eq!(*order.lock(), vec!["high", "low"]);

    session.stop().await;
}

#[tokio::test]
async fn ctcp_version_is_answered_by_notice() {
    let (_server, mut conn, session) = joined(EventBus::new()).await;

    conn.send(":alice!a@example.org PRIVMSG Subhuti :\x01VERSION\x01").await.unwrap();
    let reply = conn.recv_command("NOTICE").await.unwrap();
    assert_eq!(reply.arg(0), Some("alice"));
    assert_eq!(reply.arg(1), Some("\x01VERSION Subhuti version 0.1.1\x01"));

    session.stop().await;
}

#[tokio::test]
async fn send_to_target_splits_lines() {
    let (_server, mut conn, session) = joined(EventBus::new()).await;

    session.send_to_target("#rust", "first\nsecond").unwrap();
    let lines: Vec<String> = conn
        .drain(Duration::from_millis(200))
        .await
        .into_iter()
        .filter(|m| m.command == "PRIVMSG")
        .filter_map(|m| m.arg(1).map(str::to_owned))
        .collect();
    assert_eq!(lines, vec!["first", "second"]);

    session.stop().await;
}

#[tokio::test]
async fn line_breaks_never_reach_the_wire_as_commands() {
    let (_server, mut conn, session) = joined(EventBus::new()).await;
    session
        .commands()
        .register_fn("say", |_: &CommandContext<'_>, args: &str| Ok(args.replace("\\r", "\r")));

    conn.send(":alice!a@example.org PRIVMSG #rust :?say hi\\rQUIT :owned").await.unwrap();
    let first = conn.recv().await.unwrap();
    let second = conn.recv().await.unwrap();
    assert_eq!(first.to_string(), "PRIVMSG #rust :hi");
    assert_eq!(second.to_string(), "PRIVMSG #rust :QUIT :owned");

    session.send_to_target("#rust", "first\rQUIT :x").unwrap();
    session.send_raw("PRIVMSG #rust :x\r\nQUIT :bye").unwrap();
    session.send_raw("PING :after\r\n").unwrap();

    let sent = conn.drain(Duration::from_millis(300)).await;
    assert!(sent.iter().all(|m| m.command != "QUIT"), "{sent:?}");
    let texts: Vec<&str> = sent
        .iter()
        .filter(|m| m.command == "PRIVMSG")
        .filter_map(|m| m.arg(1))
        .collect();
    assert_eq!(texts, vec!["first", "QUIT :x"]);
    assert!(sent.iter().any(|m| m.command == "PING" && m.arg(0) == Some("after")));

    session.stop().await;
}
