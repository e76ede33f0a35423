//! Entity resolution for report rendering.
//!
//! The directory answers "does this channel still exist, and how is it
//! displayed" plus "who belongs to this guild". It is consumed only for
//! presentation and membership, never for accounting. Lookups that resolve
//! to "no longer exists" are normal: deleted channels are excluded from
//! reports, not surfaced as errors.

use crate::error::Result;
use crate::types::{ChannelId, GuildId, MemberId};

/// Display metadata for a channel that currently exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: ChannelId,
    pub name: String,
}

impl ChannelInfo {
    /// Mention token understood by the rendering surface.
    pub fn mention(&self) -> String {
        format!("<#{}>", self.id)
    }
}

/// Display metadata for a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub id: MemberId,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// Live entity-resolution collaborator joined against the duration store
/// when building reports.
pub trait EntityDirectory {
    /// Resolves a channel, or `None` if it no longer exists.
    fn channel(&self, channel: ChannelId) -> Option<ChannelInfo>;

    /// Resolves a member's display metadata, or `None` if unknown.
    fn member(&self, member: MemberId) -> Option<MemberInfo>;

    /// Lists the members of a guild in roster order.
    ///
    /// Unlike channel and member lookups, an unknown guild is a
    /// request-level mistake and is propagated as an error.
    fn guild_members(&self, guild: GuildId) -> Result<Vec<MemberId>>;
}
