//! Property-based tests for line framing and message parsing.
//!
//! 1. Any split of a CRLF stream into chunks yields the same lines.
//! 2. The parser never panics on arbitrary input.
//! 3. Outbound PRIVMSGs survive serialization and re-parsing.

use bytes::BytesMut;
use proptest::prelude::*;
use subhuti_proto::{LineCodec, Message};
use tokio_util::codec::Decoder;

/// Line bodies: no terminators, no NUL, never empty.
fn line_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9 :#!@.,_\\-]{1,80}").expect("valid regex")
}

fn channel_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("#[a-zA-Z0-9_\\-]{1,20}").expect("valid regex")
}

/// Text that a PRIVMSG can carry: printable, may hold spaces and colons.
fn text_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[^\r\n\0]{0,200}").expect("valid regex")
}

fn decode_chunks(stream: &[u8], cuts: &[usize]) -> Vec<String> {
    let mut codec = LineCodec::default();
    let mut buf = BytesMut::new();
    let mut out = Vec::new();
    let mut start = 0;

    let mut points: Vec<usize> = cuts.iter().map(|c| c % (stream.len() + 1)).collect();
    points.sort_unstable();
    points.push(stream.len());

    for end in points {
        if end < start {
            continue;
        }
        buf.extend_from_slice(&stream[start..end]);
        start = end;
        while let Some(line) = codec.decode(&mut buf).expect("within bound") {
            out.push(line);
        }
    }
    out
}

proptest! {
    #[test]
    fn chunk_boundaries_do_not_change_lines(
        lines in prop::collection::vec(line_strategy(), 1..12),
        cuts in prop::collection::vec(any::<usize>(), 0..24),
    ) {
        let stream: Vec<u8> = lines
            .iter()
            .flat_map(|l| l.bytes().chain(*b"\r\n"))
            .collect();
        prop_assert_eq!(decode_chunks(&stream, &cuts), lines);
    }

    #[test]
    fn parser_never_panics(line in "\\PC{0,300}") {
        let _ = Message::parse(&line);
    }

    #[test]
    fn privmsg_text_survives_serialization(
        target in channel_strategy(),
        text in text_strategy(),
    ) {
        let wire = Message::privmsg(&target, &text).to_string();
        let parsed = Message::parse(&wire).expect("outbound line parses");
        prop_assert_eq!(parsed.command.as_str(), "PRIVMSG");
        prop_assert_eq!(parsed.arg(0), Some(target.as_str()));
        prop_assert_eq!(parsed.trailing(), Some(text.as_str()));
    }
}
