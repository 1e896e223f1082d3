//! Line-based codec for tokio.
//!
//! Splits an inbound byte stream into CRLF-terminated lines and writes
//! outbound lines with the same terminator. Bytes after the last complete
//! terminator stay in the read buffer as a fragment and are completed by
//! the next read; a fragment that grows past the configured bound is a
//! protocol violation.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{self, ProtocolError};
use crate::message::is_illegal_control_char;

/// Line-based codec that handles CRLF-terminated lines.
///
/// A lone LF is accepted as a terminator too. The delimiter is stripped
/// from decoded lines. Invalid UTF-8 is replaced rather than rejected.
#[derive(Debug, Clone)]
pub struct LineCodec {
    /// Index of next byte to check for newline
    next_index: usize,
    /// Maximum line length, excluding the terminator
    max_len: usize,
}

impl LineCodec {
    /// Create a codec with the given maximum line length.
    pub fn new(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
        }
    }

    /// The configured maximum line length.
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    fn decode_line(&self, mut line: &[u8]) -> String {
        if let Some(rest) = line.strip_suffix(b"\n") {
            line = rest;
        }
        if let Some(rest) = line.strip_suffix(b"\r") {
            line = rest;
        }
        String::from_utf8_lossy(line).into_owned()
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new(crate::MAX_LINE_LEN)
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> error::Result<Option<String>> {
        loop {
            // Look for newline starting from where we left off
            let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
                self.next_index = src.len();

                // One extra byte of slack for a CR whose LF is still in flight
                if src.len() > self.max_len + 1 {
                    return Err(ProtocolError::MessageTooLong {
                        actual: src.len(),
                        limit: self.max_len,
                    });
                }
                return Ok(None);
            };

            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            let data = self.decode_line(&line);
            if data.len() > self.max_len {
                return Err(ProtocolError::MessageTooLong {
                    actual: data.len(),
                    limit: self.max_len,
                });
            }
            if data.is_empty() {
                continue;
            }
            return Ok(Some(data));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> error::Result<Option<String>> {
        match self.decode(src)? {
            Some(line) => Ok(Some(line)),
            None => {
                if !src.is_empty() {
                    tracing::debug!(bytes = src.len(), "discarding unterminated fragment at eof");
                    src.advance(src.len());
                    self.next_index = 0;
                }
                Ok(None)
            }
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, msg: String, dst: &mut BytesMut) -> error::Result<()> {
        let body = msg.trim_end_matches(['\r', '\n']);
        if let Some(ch) = body.chars().find(|&c| is_illegal_control_char(c)) {
            return Err(ProtocolError::IllegalControlChar(ch));
        }
        if body.len() > self.max_len {
            return Err(ProtocolError::MessageTooLong {
                actual: body.len(),
                limit: self.max_len,
            });
        }
        dst.reserve(body.len() + 2);
        dst.extend_from_slice(body.as_bytes());
        dst.extend_from_slice(b"\r\n");
        Ok(())
    }
}
