//! Client transport over plain TCP or TLS.
//!
//! [`Transport`] unifies both stream kinds behind `AsyncRead`/`AsyncWrite`
//! so the session can split it into a framed reader and a framed writer
//! without caring which one it got.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream as ClientTlsStream;
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::line::LineCodec;

/// Default maximum line length (8191 bytes as per modern IRC conventions).
pub const MAX_LINE_LEN: usize = 8191;

/// Framed read half yielding decoded lines.
pub type LineReader = FramedRead<ReadHalf<Transport>, LineCodec>;
/// Framed write half accepting outbound lines.
pub type LineWriter = FramedWrite<WriteHalf<Transport>, LineCodec>;

/// A connected client stream.
#[allow(clippy::large_enum_variant)]
pub enum Transport {
    /// Plain TCP transport.
    Tcp(TcpStream),
    /// Client-side TLS-encrypted transport.
    ClientTls(Box<ClientTlsStream<TcpStream>>),
}

impl Transport {
    /// Wrap a plain TCP stream.
    pub fn tcp(stream: TcpStream) -> Self {
        Transport::Tcp(stream)
    }

    /// Wrap an established client TLS stream.
    pub fn client_tls(stream: ClientTlsStream<TcpStream>) -> Self {
        Transport::ClientTls(Box::new(stream))
    }

    /// Whether the transport is TLS-encrypted.
    pub fn is_tls(&self) -> bool {
        matches!(self, Transport::ClientTls(_))
    }

    /// Split into a line reader and a line writer sharing one length bound.
    pub fn into_lines(self, max_len: usize) -> (LineReader, LineWriter) {
        let (read, write) = tokio::io::split(self);
        (
            FramedRead::new(read, LineCodec::new(max_len)),
            FramedWrite::new(write, LineCodec::new(max_len)),
        )
    }
}

impl AsyncRead for Transport {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            Transport::ClientTls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Transport {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Transport::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            Transport::ClientTls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Tcp(s) => Pin::new(s).poll_flush(cx),
            Transport::ClientTls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            Transport::ClientTls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn tcp_lines_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(b"001 foo\r\n002 ba").await.unwrap();
            sock.flush().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            sock.write_all(b"r\r\n").await.unwrap();

            let mut buf = vec![0u8; 64];
            let n = sock.read(&mut buf).await.unwrap();
            String::from_utf8_lossy(&buf[..n]).into_owned()
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let transport = Transport::tcp(stream);
        assert!(!transport.is_tls());
        let (mut reader, mut writer) = transport.into_lines(MAX_LINE_LEN);

        assert_eq!(reader.next().await.unwrap().unwrap(), "001 foo");
        assert_eq!(reader.next().await.unwrap().unwrap(), "002 bar");

        writer.send("NICK Subhuti".to_string()).await.unwrap();
        assert_eq!(server.await.unwrap(), "NICK Subhuti\r\n");
    }
}
