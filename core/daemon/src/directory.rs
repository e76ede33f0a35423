//! In-memory entity directory maintained from `sync_directory` messages.
//!
//! The bridge pushes guild rosters and display metadata; reports join
//! against this view. A channel missing here is treated as deleted and
//! excluded from output. Nothing in this module touches accounting.

use std::collections::HashMap;

use tally_core::{
    ChannelId, ChannelInfo, EntityDirectory, GuildId, MemberId, MemberInfo, Result, TallyError,
};
use tally_daemon_protocol::DirectorySyncPayload;

#[derive(Debug, Default)]
pub struct Directory {
    guilds: HashMap<GuildId, GuildEntry>,
}

#[derive(Debug, Default)]
struct GuildEntry {
    channels: HashMap<ChannelId, String>,
    members: HashMap<MemberId, MemberEntry>,
    /// Roster in sync order; keeps guild_members deterministic.
    roster: Vec<MemberId>,
}

#[derive(Debug)]
struct MemberEntry {
    display_name: String,
    avatar_url: Option<String>,
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct DirectoryCounts {
    pub guilds: usize,
    pub channels: usize,
    pub members: usize,
}

impl Directory {
    pub fn new() -> Self {
        Directory::default()
    }

    /// Replaces the stored view of every guild present in the payload.
    /// Guilds absent from the payload keep their previous view.
    pub fn apply_sync(&mut self, payload: &DirectorySyncPayload) -> DirectoryCounts {
        let mut channels = 0;
        let mut members = 0;

        for guild in &payload.guilds {
            let mut entry = GuildEntry::default();
            for channel in &guild.channels {
                entry
                    .channels
                    .insert(ChannelId(channel.channel_id), channel.name.clone());
            }
            for member in &guild.members {
                let id = MemberId(member.member_id);
                entry.members.insert(
                    id,
                    MemberEntry {
                        display_name: member.display_name.clone(),
                        avatar_url: member.avatar_url.clone(),
                    },
                );
                entry.roster.push(id);
            }
            channels += entry.channels.len();
            members += entry.roster.len();
            self.guilds.insert(GuildId(guild.guild_id), entry);
        }

        DirectoryCounts {
            guilds: self.guilds.len(),
            channels,
            members,
        }
    }

    pub fn guild_count(&self) -> usize {
        self.guilds.len()
    }
}

impl EntityDirectory for Directory {
    fn channel(&self, channel: ChannelId) -> Option<ChannelInfo> {
        self.guilds.values().find_map(|guild| {
            guild.channels.get(&channel).map(|name| ChannelInfo {
                id: channel,
                name: name.clone(),
            })
        })
    }

    fn member(&self, member: MemberId) -> Option<MemberInfo> {
        self.guilds.values().find_map(|guild| {
            guild.members.get(&member).map(|entry| MemberInfo {
                id: member,
                display_name: entry.display_name.clone(),
                avatar_url: entry.avatar_url.clone(),
            })
        })
    }

    fn guild_members(&self, guild: GuildId) -> Result<Vec<MemberId>> {
        self.guilds
            .get(&guild)
            .map(|entry| entry.roster.clone())
            .ok_or(TallyError::GuildNotFound(guild))
    }
}
