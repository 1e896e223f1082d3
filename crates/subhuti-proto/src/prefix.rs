//! Sender identity extracted from a message prefix.

use std::fmt;

/// Longest nickname accepted by the `nick!user@host` grammar.
pub const NICK_MAX_LEN: usize = 16;

/// The identity triple of a message sender.
///
/// Built from a `nick!user@host` prefix. Prefixes that do not fit that
/// shape (servers, services) keep the whole prefix as `nick` and leave
/// `user` and `host` empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Sender {
    /// Nickname, or the full prefix for service-type senders.
    pub nick: String,
    /// Username (ident).
    pub user: String,
    /// Hostname.
    pub host: String,
}

impl Sender {
    /// Parse a prefix into a sender. Never fails.
    pub fn parse(prefix: &str) -> Sender {
        match split_user_prefix(prefix) {
            Some((nick, user, host)) => Sender {
                nick: nick.to_owned(),
                user: user.to_owned(),
                host: host.to_owned(),
            },
            None => Sender {
                nick: prefix.to_owned(),
                ..Sender::default()
            },
        }
    }

    /// True when the prefix matched the full `nick!user@host` form.
    pub fn is_user(&self) -> bool {
        !self.user.is_empty()
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_user() {
            write!(f, "{}!{}@{}", self.nick, self.user, self.host)
        } else {
            f.write_str(&self.nick)
        }
    }
}

/// Split `nick!user@host`, validating each part.
fn split_user_prefix(prefix: &str) -> Option<(&str, &str, &str)> {
    let (nick, rest) = prefix.split_once('!')?;
    let (user, host) = rest.split_once('@')?;

    if !is_valid_nick(nick) {
        return None;
    }
    if user.is_empty() || user.bytes().any(|b| matches!(b, b' ' | b'@' | 0)) {
        return None;
    }
    if !host
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b':' | b'/' | b'.' | b'-'))
    {
        return None;
    }
    Some((nick, user, host))
}

/// Check a nickname: letter or special first, then letters, digits,
/// specials or hyphens, at most [`NICK_MAX_LEN`] characters.
pub fn is_valid_nick(nick: &str) -> bool {
    let mut chars = nick.chars();

    let first = match chars.next() {
        Some(c) => c,
        None => return false,
    };

    // Special characters allowed in nicknames: [ ] \ ` _ ^ { | }
    let is_special = |c: char| matches!(c, '[' | ']' | '\\' | '`' | '_' | '^' | '{' | '|' | '}');

    if !(first.is_ascii_alphabetic() || is_special(first)) {
        return false;
    }

    for c in chars {
        if !(c.is_ascii_alphanumeric() || is_special(c) || c == '-') {
            return false;
        }
    }

    nick.len() <= NICK_MAX_LEN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_user_prefix() {
        let s = Sender::parse("alice!~al@host-1.example.org");
        assert_eq!(s.nick, "alice");
        assert_eq!(s.user, "~al");
        assert_eq!(s.host, "host-1.example.org");
        assert!(s.is_user());
        assert_eq!(s.to_string(), "alice!~al@host-1.example.org");
    }

    #[test]
    fn cloaked_host_is_accepted() {
        let s = Sender::parse("bob!bob@user/bob");
        assert_eq!(s.host, "user/bob");
    }

    #[test]
    fn server_prefix_keeps_full_identity() {
        let s = Sender::parse("irc.example.net");
        assert_eq!(s.nick, "irc.example.net");
        assert!(s.user.is_empty());
        assert!(s.host.is_empty());
        assert!(!s.is_user());
    }

    #[test]
    fn invalid_nick_falls_back() {
        let s = Sender::parse("1bad!u@h");
        assert_eq!(s.nick, "1bad!u@h");
        assert!(s.user.is_empty());
    }

    #[test]
    fn nick_rules() {
        assert!(is_valid_nick("Subhuti"));
        assert!(is_valid_nick("[away]"));
        assert!(is_valid_nick("a-b_c"));
        assert!(!is_valid_nick(""));
        assert!(!is_valid_nick("-x"));
        assert!(!is_valid_nick("abcdefghijklmnopq"));
    }
}
