//! Fake IRC server.
//!
//! Accepts the bot's connections and lets a test script both sides of the
//! conversation line by line.

use std::time::Duration;

use subhuti::proto::Message;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use super::WAIT;

/// Host name the fake server announces.
pub const HOST: &str = "irc.test";

pub struct FakeServer {
    listener: TcpListener,
}

impl FakeServer {
    /// Bind to an ephemeral local port.
    pub async fn bind() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        Ok(Self { listener })
    }

    pub fn port(&self) -> u16 {
        self.listener.local_addr().map(|a| a.port()).unwrap_or(0)
    }

    /// Wait for the bot to connect.
    pub async fn accept(&self) -> anyhow::Result<ServerConn> {
        let (stream, _) = timeout(WAIT, self.listener.accept()).await??;
        Ok(ServerConn::new(stream))
    }
}

/// One accepted connection.
pub struct ServerConn {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
}

impl ServerConn {
    fn new(stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
        }
    }

    /// Send one line, adding CRLF.
    pub async fn send(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Send raw bytes exactly as given.
    #[allow(dead_code)]
    pub async fn send_bytes(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        self.writer.write_all(bytes).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Next line from the bot.
    pub async fn recv(&mut self) -> anyhow::Result<Message> {
        self.recv_timeout(WAIT).await
    }

    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<Message> {
        let mut line = String::new();
        let n = timeout(dur, self.reader.read_line(&mut line)).await??;
        if n == 0 {
            anyhow::bail!("connection closed");
        }
        Ok(Message::parse(line.trim_end())?)
    }

    /// Read until a message with `command` arrives and return it.
    pub async fn recv_command(&mut self, command: &str) -> anyhow::Result<Message> {
        loop {
            let msg = self.recv().await?;
            if msg.command == command {
                return Ok(msg);
            }
        }
    }

    /// Everything the bot sends until it goes quiet for `idle`.
    #[allow(dead_code)]
    pub async fn drain(&mut self, idle: Duration) -> Vec<Message> {
        let mut out = Vec::new();
        while let Ok(msg) = self.recv_timeout(idle).await {
            out.push(msg);
        }
        out
    }

    /// Read the registration burst and welcome the bot.
    ///
    /// Returns the registration lines (PASS, NICK, USER) in arrival order.
    pub async fn register(&mut self, nick: &str) -> anyhow::Result<Vec<Message>> {
        let mut lines = Vec::new();
        loop {
            let msg = self.recv().await?;
            let done = msg.command == "USER";
            lines.push(msg);
            if done {
                break;
            }
        }
        self.send(&format!(":{HOST} 001 {nick} :Welcome to the test network {nick}"))
            .await?;
        self.send(&format!(
            ":{HOST} 002 {nick} :Your host is {HOST}[127.0.0.1/6667], running version fake-1.0"
        ))
        .await?;
        Ok(lines)
    }

    /// Confirm a JOIN the way a server does: echo, names, end of names.
    pub async fn confirm_join(&mut self, nick: &str, channel: &str, others: &[&str]) -> anyhow::Result<()> {
        self.send(&format!(":{nick}!bot@127.0.0.1 JOIN {channel}")).await?;
        let mut names = vec![format!("@{nick}")];
        names.extend(others.iter().map(|n| (*n).to_owned()));
        self.send(&format!(":{HOST} 353 {nick} = {channel} :{}", names.join(" ")))
            .await?;
        self.send(&format!(":{HOST} 366 {nick} {channel} :End of /NAMES list."))
            .await
    }
}
