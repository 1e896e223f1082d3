//! Per-session channel tracking.
//!
//! A [`Channel`] exists only while the bot itself is a member: it is
//! created when the server confirms our JOIN and dropped on our own
//! PART/KICK or when the connection goes away. The roster is owned by
//! the session's command task; nothing else mutates it.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;

use chrono::{DateTime, Local};
use tracing::info;

use crate::error::RosterError;
use crate::telemetry::CHANNEL_TARGET;

/// Number of activity lines kept per channel.
pub const ACTIVITY_LOG_LEN: usize = 64;

/// How many member nicks a summary shows before eliding.
const SAMPLE_LEN: usize = 6;

/// Channel names start with one of `#&+!`.
pub fn is_channel_name(target: &str) -> bool {
    target.starts_with(['#', '&', '+', '!'])
}

/// Direction marker for an activity line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Someone arrived or spoke to us.
    In,
    /// Someone left, or we spoke.
    Out,
    /// Neither (topic, mode, names).
    Neutral,
}

impl Direction {
    pub fn marker(&self) -> &'static str {
        match self {
            Self::In => "-->",
            Self::Out => "<--",
            Self::Neutral => "--",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Activity {
    pub at: DateTime<Local>,
    pub direction: Direction,
    pub text: String,
}

/// Status flags of a member.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Membership {
    pub op: bool,
    pub voice: bool,
}

impl Membership {
    /// Parse the `@`/`+` prefixes of a NAMES entry. Returns the flags and
    /// the bare nick.
    pub fn from_names_entry(entry: &str) -> (Self, &str) {
        let mut flags = Self::default();
        let nick = entry.trim_start_matches(|c: char| match c {
            '@' => {
                flags.op = true;
                true
            }
            '+' => {
                flags.voice = true;
                true
            }
            '%' | '~' | '&' => true,
            _ => false,
        });
        (flags, nick)
    }
}

/// A member as last seen, under its case-folded key.
#[derive(Clone, Debug)]
struct Member {
    nick: String,
    flags: Membership,
}

/// One joined channel.
#[derive(Debug)]
pub struct Channel {
    name: String,
    topic: Option<String>,
    topic_set_by: Option<(String, i64)>,
    url: Option<String>,
    created: Option<i64>,
    /// Visibility from RPL_NAMREPLY: `=` public, `*` private, `@` secret.
    mode: u8,
    /// Channel mode string as last reported.
    modes: String,
    /// Keyed by case-folded nick.
    members: BTreeMap<String, Member>,
    log: VecDeque<Activity>,
}

impl Channel {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            topic: None,
            topic_set_by: None,
            url: None,
            created: None,
            mode: b'=',
            modes: String::new(),
            members: BTreeMap::new(),
            log: VecDeque::with_capacity(ACTIVITY_LOG_LEN),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    pub fn set_topic(&mut self, topic: Option<&str>) {
        self.topic = topic.filter(|t| !t.is_empty()).map(str::to_string);
    }

    pub fn topic_set_by(&self) -> Option<(&str, i64)> {
        self.topic_set_by.as_ref().map(|(who, at)| (who.as_str(), *at))
    }

    pub fn set_topic_set_by(&mut self, who: &str, at: i64) {
        self.topic_set_by = Some((who.to_string(), at));
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn set_url(&mut self, url: &str) {
        self.url = Some(url.to_string());
    }

    pub fn created(&self) -> Option<i64> {
        self.created
    }

    pub fn set_created(&mut self, at: i64) {
        self.created = Some(at);
    }

    pub fn mode(&self) -> u8 {
        self.mode
    }

    pub fn set_mode(&mut self, mode: u8) {
        self.mode = mode;
    }

    pub fn modes(&self) -> &str {
        &self.modes
    }

    pub fn set_modes(&mut self, modes: &str) {
        self.modes = modes.to_string();
    }

    // member management

    pub fn add_member(&mut self, nick: &str, flags: Membership) {
        self.members.insert(
            key(nick),
            Member {
                nick: nick.to_string(),
                flags,
            },
        );
    }

    pub fn remove_member(&mut self, nick: &str) -> bool {
        self.members.remove(&key(nick)).is_some()
    }

    pub fn rename_member(&mut self, old: &str, new: &str) -> bool {
        match self.members.remove(&key(old)) {
            Some(member) => {
                self.add_member(new, member.flags);
                true
            }
            None => false,
        }
    }

    pub fn has_member(&self, nick: &str) -> bool {
        self.members.contains_key(&key(nick))
    }

    pub fn member(&self, nick: &str) -> Option<Membership> {
        self.members.get(&key(nick)).map(|m| m.flags)
    }

    /// Apply a `+o`/`-o`/`+v`/`-v` change. Unknown nicks are ignored.
    pub fn set_flag(&mut self, nick: &str, flag: char, on: bool) {
        if let Some(m) = self.members.get_mut(&key(nick)) {
            match flag {
                'o' => m.flags.op = on,
                'v' => m.flags.voice = on,
                _ => {}
            }
        }
    }

    /// Member nicks as last seen, ordered case-insensitively.
    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.members.values().map(|m| m.nick.as_str())
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn op_count(&self) -> usize {
        self.members.values().filter(|m| m.flags.op).count()
    }

    pub fn voice_count(&self) -> usize {
        self.members.values().filter(|m| m.flags.voice).count()
    }

    /// `N nicks (o ops, v voices, n normals)`
    pub fn names_summary(&self) -> String {
        let ops = self.op_count();
        let voices = self.members.values().filter(|m| m.flags.voice && !m.flags.op).count();
        let normals = self.member_count() - ops - voices;
        format!(
            "{} nicks ({} ops, {} voices, {} normals)",
            self.member_count(),
            ops,
            voices,
            normals
        )
    }

    // activity

    /// Record a line of channel activity and emit it on the channel log
    /// target.
    pub fn record(&mut self, direction: Direction, text: impl Into<String>) {
        let text = text.into();
        info!(target: CHANNEL_TARGET, channel = %self.name, "{}\t{}", direction.marker(), text);
        if self.log.len() == ACTIVITY_LOG_LEN {
            self.log.pop_front();
        }
        self.log.push_back(Activity {
            at: Local::now(),
            direction,
            text,
        });
    }

    pub fn activity(&self) -> impl Iterator<Item = &Activity> {
        self.log.iter()
    }

    pub fn summary(&self) -> ChannelSummary {
        let mut sample: Vec<String> = self.members().take(SAMPLE_LEN).map(str::to_string).collect();
        if self.member_count() > SAMPLE_LEN {
            sample.push("...".to_string());
        }
        ChannelSummary {
            name: self.name.clone(),
            members: self.member_count(),
            sample,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.summary().fmt(f)
    }
}

/// Read-only view of a channel for status output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelSummary {
    pub name: String,
    pub members: usize,
    pub sample: Vec<String>,
}

impl fmt::Display for ChannelSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}[{}]", self.name, self.members, self.sample.join(" "))
    }
}

/// Channel map of one session, keyed case-insensitively.
#[derive(Debug, Default)]
pub struct Roster {
    channels: HashMap<String, Channel>,
    /// Bumped on every structural change so readers can cache views.
    generation: u64,
}

fn key(name: &str) -> String {
    name.to_ascii_lowercase()
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a channel we just joined.
    pub fn track(&mut self, name: &str) -> Result<&mut Channel, RosterError> {
        let k = key(name);
        if self.channels.contains_key(&k) {
            return Err(RosterError::AlreadyTracked(name.to_string()));
        }
        self.generation += 1;
        Ok(self.channels.entry(k).or_insert_with(|| Channel::new(name)))
    }

    /// Stop tracking a channel we left.
    pub fn untrack(&mut self, name: &str) -> Result<Channel, RosterError> {
        let channel = self
            .channels
            .remove(&key(name))
            .ok_or_else(|| RosterError::NotTracked(name.to_string()))?;
        self.generation += 1;
        Ok(channel)
    }

    pub fn get(&self, name: &str) -> Option<&Channel> {
        self.channels.get(&key(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Channel> {
        self.generation += 1;
        self.channels.get_mut(&key(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.channels.contains_key(&key(name))
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    pub fn channels_mut(&mut self) -> impl Iterator<Item = &mut Channel> {
        self.generation += 1;
        self.channels.values_mut()
    }

    /// Channel names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.values().map(|c| c.name.clone()).collect();
        names.sort();
        names
    }

    /// Drop every channel. Returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let n = self.channels.len();
        self.channels.clear();
        self.generation += 1;
        n
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Summaries of every channel, sorted by name.
    pub fn summaries(&self) -> Vec<ChannelSummary> {
        let mut out: Vec<ChannelSummary> = self.channels.values().map(Channel::summary).collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }
}
