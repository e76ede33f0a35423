//! Identifier newtypes and presence-snapshot types shared across the engine.
//!
//! All identifiers are opaque snowflakes. They carry no meaning beyond
//! identity; display attributes live in the entity directory and are fetched
//! on demand for report rendering.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! snowflake_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse::<u64>().map($name)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                $name(value)
            }
        }
    };
}

snowflake_id! {
    /// A tracked participant.
    MemberId
}

snowflake_id! {
    /// A grouped real-time session location. May become unresolvable
    /// (deleted) after time has accumulated against it.
    ChannelId
}

snowflake_id! {
    /// A community space scoping channels, members, and reports.
    GuildId
}

/// An in-memory record that a member is currently present in a channel.
/// Never persisted; the tracker rebuilds from a presence sync on startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveSession {
    pub channel: ChannelId,
    pub started_at: DateTime<Utc>,
}

/// A presence transition after validation, ready for the state machine.
///
/// `before`/`after` describe the channel pair delivered by the event source;
/// equal values mean no channel change (e.g. a mute toggle).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceTransition {
    pub guild: GuildId,
    pub member: MemberId,
    pub is_bot: bool,
    pub before: Option<ChannelId>,
    pub after: Option<ChannelId>,
    pub at: DateTime<Utc>,
}

/// Snapshot of current real-world presence, consumed once at startup by
/// reconciliation so sessions that predate the process are not lost.
#[derive(Debug, Clone, Default)]
pub struct PresenceSnapshot {
    pub guilds: Vec<GuildPresence>,
}

#[derive(Debug, Clone)]
pub struct GuildPresence {
    pub guild: GuildId,
    pub channels: Vec<ChannelPresence>,
}

#[derive(Debug, Clone)]
pub struct ChannelPresence {
    pub channel: ChannelId,
    pub members: Vec<PresentMember>,
}

#[derive(Debug, Clone, Copy)]
pub struct PresentMember {
    pub member: MemberId,
    pub is_bot: bool,
}
