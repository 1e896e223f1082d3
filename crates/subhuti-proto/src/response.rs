//! Numeric reply codes and their symbolic names.
//!
//! Three-digit commands are translated to symbolic names before dispatch,
//! so handlers match on `RPL_WELCOME` rather than `001`. Numerics missing
//! from the table keep their literal digits.
//!
//! # Reference
//! - RFC 2812: Internet Relay Chat: Client Protocol
//! - Modern IRC documentation: <https://modern.ircdocs.horse/>

#![allow(non_camel_case_types)]

use std::borrow::Cow;
use std::fmt;

macro_rules! numerics {
    ($($(#[$doc:meta])* $name:ident = $code:literal,)*) => {
        /// Server numeric reply.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[repr(u16)]
        #[non_exhaustive]
        pub enum Response {
            $($(#[$doc])* $name = $code,)*
        }

        impl Response {
            /// Look up a numeric by code.
            pub fn from_code(code: u16) -> Option<Response> {
                match code {
                    $($code => Some(Response::$name),)*
                    _ => None,
                }
            }

            /// The symbolic name, e.g. `RPL_WELCOME`.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Response::$name => stringify!($name),)*
                }
            }

            /// Look up a numeric by its symbolic name.
            pub fn from_name(name: &str) -> Option<Response> {
                match name {
                    $(stringify!($name) => Some(Response::$name),)*
                    _ => None,
                }
            }
        }
    };
}

numerics! {
    /// 001 - Welcome to the network
    RPL_WELCOME = 1,
    /// 002 - Your host is ..., running version ...
    RPL_YOURHOST = 2,
    /// 003 - Server creation date
    RPL_CREATED = 3,
    /// 004 - Server name, version and modes
    RPL_MYINFO = 4,
    /// 005 - Supported features
    RPL_ISUPPORT = 5,
    /// 042 - Your unique ID
    RPL_YOURID = 42,
    /// 221 - Your user modes
    RPL_UMODEIS = 221,
    /// 250 - Highest connection count
    RPL_STATSCONN = 250,
    /// 251 - Users and servers on the network
    RPL_LUSERCLIENT = 251,
    /// 252 - Operators online
    RPL_LUSEROP = 252,
    /// 253 - Unknown connections
    RPL_LUSERUNKNOWN = 253,
    /// 254 - Channels formed
    RPL_LUSERCHANNELS = 254,
    /// 255 - Local clients and servers
    RPL_LUSERME = 255,
    /// 265 - Local user counts
    RPL_LOCALUSERS = 265,
    /// 266 - Global user counts
    RPL_GLOBALUSERS = 266,
    /// 301 - Away message
    RPL_AWAY = 301,
    /// 305 - No longer away
    RPL_UNAWAY = 305,
    /// 306 - Marked as away
    RPL_NOWAWAY = 306,
    /// 307 - Registered nick
    RPL_WHOISREGNICK = 307,
    /// 311 - WHOIS user
    RPL_WHOISUSER = 311,
    /// 312 - WHOIS server
    RPL_WHOISSERVER = 312,
    /// 313 - WHOIS operator
    RPL_WHOISOPERATOR = 313,
    /// 314 - WHOWAS user
    RPL_WHOWASUSER = 314,
    /// 315 - End of WHO
    RPL_ENDOFWHO = 315,
    /// 317 - WHOIS idle time
    RPL_WHOISIDLE = 317,
    /// 318 - End of WHOIS
    RPL_ENDOFWHOIS = 318,
    /// 319 - WHOIS channels
    RPL_WHOISCHANNELS = 319,
    /// 324 - Channel modes
    RPL_CHANNELMODEIS = 324,
    /// 328 - Channel URL
    RPL_CHANNELURL = 328,
    /// 329 - Channel creation time
    RPL_CREATIONTIME = 329,
    /// 330 - WHOIS account
    RPL_WHOISACCOUNT = 330,
    /// 331 - No topic set
    RPL_NOTOPIC = 331,
    /// 332 - Channel topic
    RPL_TOPIC = 332,
    /// 333 - Who set the topic and when
    RPL_TOPICWHOTIME = 333,
    /// 338 - WHOIS actual host
    RPL_WHOISACTUALLY = 338,
    /// 341 - Invite sent
    RPL_INVITING = 341,
    /// 352 - WHO reply
    RPL_WHOREPLY = 352,
    /// 353 - Channel member list
    RPL_NAMREPLY = 353,
    /// 366 - End of member list
    RPL_ENDOFNAMES = 366,
    /// 369 - End of WHOWAS
    RPL_ENDOFWHOWAS = 369,
    /// 372 - MOTD line
    RPL_MOTD = 372,
    /// 375 - MOTD start
    RPL_MOTDSTART = 375,
    /// 376 - MOTD end
    RPL_ENDOFMOTD = 376,
    /// 378 - WHOIS connecting host
    RPL_WHOISHOST = 378,
    /// 379 - WHOIS modes
    RPL_WHOISMODES = 379,
    /// 396 - Displayed host changed
    RPL_HOSTHIDDEN = 396,
    /// 401 - No such nick
    ERR_NOSUCHNICK = 401,
    /// 403 - No such channel
    ERR_NOSUCHCHANNEL = 403,
    /// 404 - Cannot send to channel
    ERR_CANNOTSENDTOCHAN = 404,
    /// 421 - Unknown command
    ERR_UNKNOWNCOMMAND = 421,
    /// 422 - MOTD missing
    ERR_NOMOTD = 422,
    /// 432 - Erroneous nickname
    ERR_ERRONEUSNICKNAME = 432,
    /// 433 - Nickname in use
    ERR_NICKNAMEINUSE = 433,
    /// 442 - Not on channel
    ERR_NOTONCHANNEL = 442,
    /// 451 - Not registered
    ERR_NOTREGISTERED = 451,
    /// 461 - Not enough parameters
    ERR_NEEDMOREPARAMS = 461,
    /// 462 - Already registered
    ERR_ALREADYREGISTRED = 462,
    /// 464 - Password incorrect
    ERR_PASSWDMISMATCH = 464,
    /// 465 - Banned from server
    ERR_YOUREBANNEDCREEP = 465,
    /// 471 - Channel is full
    ERR_CHANNELISFULL = 471,
    /// 473 - Invite only channel
    ERR_INVITEONLYCHAN = 473,
    /// 474 - Banned from channel
    ERR_BANNEDFROMCHAN = 474,
    /// 475 - Bad channel key
    ERR_BADCHANNELKEY = 475,
    /// 477 - Registered nick required
    ERR_NEEDREGGEDNICK = 477,
    /// 482 - Channel operator privileges needed
    ERR_CHANOPRIVSNEEDED = 482,
    /// 671 - WHOIS secure connection
    RPL_WHOISSECURE = 671,
}

impl Response {
    /// Returns the numeric code as u16
    #[inline]
    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is an error reply (4xx or 5xx)
    #[inline]
    pub fn is_error(&self) -> bool {
        (400..600).contains(&self.code())
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Translate a three-digit command to its symbolic name.
///
/// Anything that is not a known numeric is returned unchanged.
pub fn resolve_command(command: &str) -> Cow<'_, str> {
    if command.len() == 3 && command.bytes().all(|b| b.is_ascii_digit()) {
        if let Some(resp) = command.parse().ok().and_then(Response::from_code) {
            return Cow::Borrowed(resp.as_str());
        }
    }
    Cow::Borrowed(command)
}
