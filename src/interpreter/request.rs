//! The unit of work handed to the interpreter.

use subhuti_proto::Sender;

/// One chat line addressed to a channel or to the bot.
#[derive(Clone, Debug, Default)]
pub struct MessageRequest {
    /// Network the line arrived on.
    pub network: String,
    /// True for channel traffic, false for private messages.
    pub is_channel: bool,
    /// Raw prefix as received.
    pub from: String,
    pub sender: Sender,
    /// Set when `is_channel` is true.
    pub channel: Option<String>,
    pub text: String,
    /// The text mentions the bot's nick as a word.
    pub addressed: bool,
    /// Command replies get `"<sender>: "` prepended.
    pub prefix_reply: bool,
    /// First URL seen by the URL detector, if any.
    pub url: Option<String>,
}

impl MessageRequest {
    /// Request for a line received in `channel`.
    pub fn channel(network: &str, from: &str, channel: &str, text: &str) -> Self {
        Self {
            network: network.to_owned(),
            is_channel: true,
            from: from.to_owned(),
            sender: Sender::parse(from),
            channel: Some(channel.to_owned()),
            text: text.to_owned(),
            ..Self::default()
        }
    }

    /// Request for a line sent to the bot directly.
    pub fn private(network: &str, from: &str, text: &str) -> Self {
        Self {
            network: network.to_owned(),
            is_channel: false,
            from: from.to_owned(),
            sender: Sender::parse(from),
            channel: None,
            text: text.to_owned(),
            ..Self::default()
        }
    }

    /// Where replies go: the channel, or the sender for private messages.
    pub fn reply_target(&self) -> &str {
        match &self.channel {
            Some(channel) if self.is_channel => channel,
            _ => &self.sender.nick,
        }
    }
}
