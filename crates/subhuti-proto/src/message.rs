//! Message grammar: `[:prefix ]command params`.
//!
//! The command is either letters or exactly three digits. Numerics are
//! translated through [`crate::response`] while parsing, verbs are
//! uppercased.

use std::fmt;
use std::str::FromStr;

use nom::{
    bytes::complete::take_while1,
    character::complete::{char, space0},
    combinator::opt,
    error::ErrorKind,
    sequence::preceded,
    IResult,
};
use smallvec::SmallVec;

use crate::error::{MessageParseError, ProtocolError};
use crate::prefix::Sender;
use crate::response::resolve_command;

/// True for characters that may not appear inside a line: NUL, and the
/// CR/LF that would terminate it early.
#[inline]
pub fn is_illegal_control_char(ch: char) -> bool {
    matches!(ch, '\0' | '\r' | '\n')
}

/// Parse message prefix (the part after `:` and before the first space).
fn parse_prefix(input: &str) -> IResult<&str, &str> {
    preceded(char(':'), take_while1(|c| c != ' '))(input)
}

/// Parse the command name (1*letter or 3digit).
fn parse_command(input: &str) -> IResult<&str, &str> {
    let (rest, cmd) = take_while1(|c: char| c.is_ascii_alphanumeric())(input)?;

    let is_all_letters = cmd.chars().all(|c| c.is_ascii_alphabetic());
    let is_three_digits = cmd.len() == 3 && cmd.chars().all(|c| c.is_ascii_digit());
    let ends_cleanly = rest.is_empty() || rest.starts_with(' ');

    if (is_all_letters || is_three_digits) && ends_cleanly {
        Ok((rest, cmd))
    } else {
        Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::AlphaNumeric,
        )))
    }
}

/// Parse parameters after the command.
///
/// Handles both regular space-separated parameters and the trailing
/// parameter (prefixed with `:`) which may contain spaces. Runs of spaces
/// count as a single separator.
fn parse_params(input: &str) -> SmallVec<[&str; 15]> {
    let mut params: SmallVec<[&str; 15]> = SmallVec::new();
    let mut rest = input;

    while let Some(b' ') = rest.as_bytes().first().copied() {
        rest = rest.trim_start_matches(' ');
        if rest.is_empty() {
            break;
        }

        if let Some(trailing) = rest.strip_prefix(':') {
            params.push(trailing);
            break;
        }

        let end = rest.find(' ').unwrap_or(rest.len());
        params.push(&rest[..end]);
        rest = &rest[end..];
    }

    params
}

fn parse_line(input: &str) -> IResult<&str, (Option<&str>, &str, SmallVec<[&str; 15]>)> {
    let (input, prefix) = opt(parse_prefix)(input)?;
    let (input, _) = space0(input)?;
    let (input, command) = parse_command(input)?;
    let params = parse_params(input);
    Ok(("", (prefix, command, params)))
}

/// One protocol line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Origin of the message, without the leading `:`.
    pub prefix: Option<String>,
    /// Uppercased verb, or the symbolic name of a numeric reply.
    pub command: String,
    /// Parameters, the trailing one included without its `:`.
    pub params: Vec<String>,
}

impl Message {
    /// Build an outbound message with no prefix.
    pub fn new<S: Into<String>>(command: &str, params: impl IntoIterator<Item = S>) -> Self {
        Self {
            prefix: None,
            command: command.to_owned(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a single line (without its terminator).
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let invalid = |cause| ProtocolError::InvalidMessage {
            string: line.to_owned(),
            cause,
        };

        if line.trim().is_empty() {
            return Err(invalid(MessageParseError::EmptyMessage));
        }
        if let Some(position) = line.bytes().position(|b| is_illegal_control_char(b as char)) {
            let byte = line.as_bytes()[position];
            return Err(invalid(MessageParseError::InvalidCharacterAt { byte, position }));
        }
        if line.starts_with(':') && line[1..].starts_with([' ', '\0']) || line == ":" {
            return Err(invalid(MessageParseError::InvalidPrefix(line.to_owned())));
        }

        let (_, (prefix, command, params)) =
            parse_line(line).map_err(|_| invalid(MessageParseError::InvalidCommand))?;

        let command = if command.as_bytes()[0].is_ascii_digit() {
            resolve_command(command).into_owned()
        } else {
            command.to_ascii_uppercase()
        };

        Ok(Self {
            prefix: prefix.map(str::to_owned),
            command,
            params: params.into_iter().map(str::to_owned).collect(),
        })
    }

    /// Parameter at `index`, if present.
    #[inline]
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// The last parameter, usually the free-text trailing one.
    #[inline]
    pub fn trailing(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }

    /// Sender identity parsed from the prefix.
    pub fn sender(&self) -> Option<Sender> {
        self.prefix.as_deref().map(Sender::parse)
    }

    /// Nickname of the sender, or the whole prefix for server origins.
    pub fn source_nick(&self) -> Option<&str> {
        self.prefix
            .as_deref()
            .map(|p| p.split_once('!').map_or(p, |(nick, _)| nick))
    }

    /// `PASS <password>`
    pub fn pass(password: &str) -> Self {
        Self::new("PASS", [password])
    }

    /// `NICK <nick>`
    pub fn nick(nick: &str) -> Self {
        Self::new("NICK", [nick])
    }

    /// `USER <username> 8 * :<realname>`
    pub fn user(username: &str, realname: &str) -> Self {
        Self::new("USER", [username, "8", "*", realname])
    }

    /// `JOIN <channel>`
    pub fn join(channel: &str) -> Self {
        Self::new("JOIN", [channel])
    }

    /// `PART <channel> [:<reason>]`
    pub fn part(channel: &str, reason: Option<&str>) -> Self {
        match reason {
            Some(reason) => Self::new("PART", [channel, reason]),
            None => Self::new("PART", [channel]),
        }
    }

    /// `QUIT :<reason>`
    pub fn quit(reason: &str) -> Self {
        Self::new("QUIT", [reason])
    }

    /// `PING :<token>`
    pub fn ping(token: &str) -> Self {
        Self::new("PING", [token])
    }

    /// `PONG :<token>`
    pub fn pong(token: &str) -> Self {
        Self::new("PONG", [token])
    }

    /// `PRIVMSG <target> :<text>`
    pub fn privmsg(target: &str, text: &str) -> Self {
        Self::new("PRIVMSG", [target, text])
    }

    /// `NOTICE <target> :<text>`
    pub fn notice(target: &str, text: &str) -> Self {
        Self::new("NOTICE", [target, text])
    }

    /// Check that every part can go on the wire as a single line.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        let parts = self
            .prefix
            .iter()
            .chain(std::iter::once(&self.command))
            .chain(self.params.iter());
        for part in parts {
            if let Some(ch) = part.chars().find(|&c| is_illegal_control_char(c)) {
                return Err(ProtocolError::IllegalControlChar(ch));
            }
        }
        Ok(())
    }

    /// Prefix a message, as a server would.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = Some(prefix.to_owned());
        self
    }
}

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Message::parse(s)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = &self.prefix {
            write!(f, ":{} ", prefix)?;
        }
        f.write_str(&self.command)?;

        if let Some((last, middle)) = self.params.split_last() {
            for param in middle {
                write!(f, " {}", param)?;
            }
            let needs_colon = last.is_empty()
                || last.contains(' ')
                || last.starts_with(':')
                || self.params.len() > 1;
            if needs_colon {
                write!(f, " :{}", last)?;
            } else {
                write!(f, " {}", last)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_with_prefix() {
        let msg = Message::parse(":irc.example.net 001 Subhuti :Welcome to the network").unwrap();
        assert_eq!(msg.prefix.as_deref(), Some("irc.example.net"));
        assert_eq!(msg.command, "RPL_WELCOME");
        assert_eq!(msg.params, vec!["Subhuti", "Welcome to the network"]);
    }

    #[test]
    fn unmapped_numeric_is_literal() {
        let msg = Message::parse(":srv 999 Subhuti :odd").unwrap();
        assert_eq!(msg.command, "999");
    }

    #[test]
    fn verb_without_prefix_or_params() {
        let msg = Message::parse("ping").unwrap();
        assert_eq!(msg.prefix, None);
        assert_eq!(msg.command, "PING");
        assert!(msg.params.is_empty());
    }

    #[test]
    fn privmsg_params_and_sender() {
        let msg = Message::parse(":alice!a@example.org PRIVMSG #rust :hi there  :)").unwrap();
        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.arg(0), Some("#rust"));
        assert_eq!(msg.trailing(), Some("hi there  :)"));
        assert_eq!(msg.source_nick(), Some("alice"));
        assert_eq!(msg.sender().unwrap().host, "example.org");
    }

    #[test]
    fn repeated_spaces_between_params() {
        let msg = Message::parse("MODE  #c   +o   bob").unwrap();
        assert_eq!(msg.params, vec!["#c", "+o", "bob"]);
    }

    #[test]
    fn malformed_lines_are_rejected() {
        for line in ["", "   ", ":", ": PING", "12 foo", "1234 foo", "PRIV2MSG x", ":only-prefix"] {
            assert!(Message::parse(line).is_err(), "{line:?} should not parse");
        }
    }

    #[test]
    fn nul_byte_is_rejected() {
        let err = Message::parse("PRIVMSG #a :x\0y").unwrap_err();
        match err {
            ProtocolError::InvalidMessage { cause, .. } => {
                assert_eq!(
                    cause,
                    MessageParseError::InvalidCharacterAt {
                        byte: 0,
                        position: 13
                    }
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn embedded_line_breaks_are_rejected() {
        for (line, byte, position) in [
            ("PRIVMSG #a :x\r\nQUIT :bye", b'\r', 13),
            ("PRIVMSG #a :hi\rQUIT :owned", b'\r', 14),
            ("PRIVMSG #a :x\nQUIT", b'\n', 13),
        ] {
            match Message::parse(line) {
                Err(ProtocolError::InvalidMessage { cause, .. }) => {
                    assert_eq!(cause, MessageParseError::InvalidCharacterAt { byte, position });
                }
                other => panic!("{line:?}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn validate_catches_line_breaks_in_any_part() {
        assert!(Message::privmsg("#c", "fine text").validate().is_ok());
        assert!(matches!(
            Message::privmsg("#c", "hi\rQUIT :owned").validate(),
            Err(ProtocolError::IllegalControlChar('\r'))
        ));
        assert!(matches!(
            Message::join("#a\nPART #b").validate(),
            Err(ProtocolError::IllegalControlChar('\n'))
        ));
        assert!(matches!(
            Message::ping("x").with_prefix("srv\0").validate(),
            Err(ProtocolError::IllegalControlChar('\0'))
        ));
    }

    #[test]
    fn serialize_outbound() {
        assert_eq!(Message::privmsg("#c", "hello").to_string(), "PRIVMSG #c :hello");
        assert_eq!(
            Message::user("subhuti", "Subhuti Bot").to_string(),
            "USER subhuti 8 * :Subhuti Bot"
        );
        assert_eq!(Message::nick("Subhuti").to_string(), "NICK Subhuti");
        assert_eq!(Message::join("#rust").to_string(), "JOIN #rust");
        assert_eq!(Message::pong("irc.example.net").to_string(), "PONG irc.example.net");
        assert_eq!(Message::quit("bye now").to_string(), "QUIT :bye now");
        assert_eq!(
            Message::ping("x").with_prefix("srv").to_string(),
            ":srv PING x"
        );
    }
}
