//! Summary reports over the duration store.
//!
//! Both report shapes are pure functions of a duration mapping plus an
//! [`EntityDirectory`]: no caching, no retries, no hidden state. Channels
//! that no longer resolve are silently excluded; a single deleted channel
//! never blanks a report.

use std::cmp::Ordering;

use serde::Serialize;
use tracing::warn;

use crate::directory::EntityDirectory;
use crate::error::Result;
use crate::store::{ChannelSeconds, DurationMap};
use crate::types::{ChannelId, GuildId, MemberId};

/// Rendering surfaces cap list output at 25 entries.
pub const MAX_REPORT_ENTRIES: usize = 25;

/// One channel row in a per-member summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelUsage {
    pub channel_id: ChannelId,
    pub name: String,
    pub mention: String,
    pub seconds: f64,
    pub percent: f64,
    pub formatted: String,
}

/// Per-member breakdown of accumulated presence time.
///
/// `total_seconds` sums the full resolved set, not just the displayed top
/// entries. An empty `entries` list is the explicit "no activity" result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberSummary {
    pub member_id: MemberId,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub entries: Vec<ChannelUsage>,
    pub total_seconds: f64,
    pub total_formatted: String,
}

/// The channel a member spent the most time in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopChannel {
    pub channel_id: ChannelId,
    pub name: String,
    pub mention: String,
    pub seconds: f64,
    pub formatted: String,
}

/// One member row in the guild leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub member_id: MemberId,
    pub display_name: Option<String>,
    pub total_seconds: f64,
    pub total_formatted: String,
    pub percent: f64,
    pub top_channel: TopChannel,
}

/// Ranked, guild-wide summary of members by total accumulated time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leaderboard {
    pub guild_id: GuildId,
    pub entries: Vec<LeaderboardEntry>,
    pub global_total_seconds: f64,
    pub global_total_formatted: String,
}

/// Formats a duration into a compact string like "1h 2m 3s".
///
/// Rounds to the nearest whole second, emits only non-zero components, and
/// always emits the seconds component when it is the only one: a zero
/// duration renders as "0s", never as an empty string.
pub fn format_duration(t_secs: f64) -> String {
    let total = t_secs.round().max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    if seconds > 0 || parts.is_empty() {
        parts.push(format!("{}s", seconds));
    }

    parts.join(" ")
}

/// Builds the per-member summary from that member's accumulated stats.
///
/// Unresolvable channels are dropped, the rest sorted descending by seconds
/// (stable ties) and truncated to [`MAX_REPORT_ENTRIES`]. Percentages are
/// taken against the untruncated resolved total, 0% when the total is zero.
pub fn member_summary(
    member_id: MemberId,
    stats: &ChannelSeconds,
    directory: &dyn EntityDirectory,
) -> MemberSummary {
    let mut resolved: Vec<(crate::directory::ChannelInfo, f64)> = stats
        .iter()
        .filter_map(|(channel, seconds)| directory.channel(*channel).map(|info| (info, *seconds)))
        .collect();

    let total_seconds: f64 = resolved.iter().map(|(_, seconds)| seconds).sum();

    resolved.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    resolved.truncate(MAX_REPORT_ENTRIES);

    let entries = resolved
        .into_iter()
        .map(|(info, seconds)| ChannelUsage {
            channel_id: info.id,
            mention: info.mention(),
            name: info.name,
            seconds,
            percent: percent_of(seconds, total_seconds),
            formatted: format_duration(seconds),
        })
        .collect();

    let member = directory.member(member_id);
    MemberSummary {
        member_id,
        display_name: member.as_ref().map(|m| m.display_name.clone()),
        avatar_url: member.and_then(|m| m.avatar_url),
        entries,
        total_seconds,
        total_formatted: format_duration(total_seconds),
    }
}

/// Builds the guild leaderboard.
///
/// Members whose resolved stats are empty are dropped before ranking, which
/// is also what guarantees the top-channel computation below never sees an
/// empty set. The global total sums every ranked member, not just the
/// displayed top entries.
pub fn leaderboard(
    guild_id: GuildId,
    durations: &DurationMap,
    directory: &dyn EntityDirectory,
) -> Result<Leaderboard> {
    let members = directory.guild_members(guild_id)?;

    let mut ranked: Vec<(MemberId, Vec<(ChannelId, String, f64)>, f64)> = Vec::new();
    for member in members {
        let Some(stats) = durations.get(&member) else {
            continue;
        };
        let resolved: Vec<(ChannelId, String, f64)> = stats
            .iter()
            .filter_map(|(channel, seconds)| {
                directory
                    .channel(*channel)
                    .map(|info| (info.id, info.name, *seconds))
            })
            .collect();
        if resolved.is_empty() {
            continue;
        }
        let total: f64 = resolved.iter().map(|(_, _, seconds)| seconds).sum();
        ranked.push((member, resolved, total));
    }

    let global_total_seconds: f64 = ranked.iter().map(|(_, _, total)| total).sum();

    ranked.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(Ordering::Equal));
    ranked.truncate(MAX_REPORT_ENTRIES);

    let mut entries = Vec::with_capacity(ranked.len());
    for (member_id, resolved, total_seconds) in ranked {
        let Some((channel_id, name, seconds)) = resolved
            .iter()
            .max_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(Ordering::Equal))
            .cloned()
        else {
            warn!(member = %member_id, "Skipping leaderboard entry with empty stats");
            continue;
        };

        entries.push(LeaderboardEntry {
            member_id,
            display_name: directory.member(member_id).map(|m| m.display_name),
            total_seconds,
            total_formatted: format_duration(total_seconds),
            percent: percent_of(total_seconds, global_total_seconds),
            top_channel: TopChannel {
                channel_id,
                mention: format!("<#{}>", channel_id),
                name,
                seconds,
                formatted: format_duration(seconds),
            },
        });
    }

    Ok(Leaderboard {
        guild_id,
        entries,
        global_total_seconds,
        global_total_formatted: format_duration(global_total_seconds),
    })
}

fn percent_of(part: f64, total: f64) -> f64 {
    if total > 0.0 {
        part / total * 100.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{ChannelInfo, MemberInfo};
    use crate::error::TallyError;

    /// Directory stub: channel 99 is deleted, every other channel exists,
    /// guild 42 has members 1..=3.
    struct StubDirectory;

    impl EntityDirectory for StubDirectory {
        fn channel(&self, channel: ChannelId) -> Option<ChannelInfo> {
            if channel == ChannelId(99) {
                return None;
            }
            Some(ChannelInfo {
                id: channel,
                name: format!("channel-{}", channel),
            })
        }

        fn member(&self, member: MemberId) -> Option<MemberInfo> {
            Some(MemberInfo {
                id: member,
                display_name: format!("member-{}", member),
                avatar_url: None,
            })
        }

        fn guild_members(&self, guild: GuildId) -> Result<Vec<MemberId>> {
            if guild == GuildId(42) {
                Ok(vec![MemberId(1), MemberId(2), MemberId(3)])
            } else {
                Err(TallyError::GuildNotFound(guild))
            }
        }
    }

    fn stats(pairs: &[(u64, f64)]) -> ChannelSeconds {
        pairs
            .iter()
            .map(|(channel, seconds)| (ChannelId(*channel), *seconds))
            .collect()
    }

    #[test]
    fn format_duration_zero_is_0s() {
        assert_eq!(format_duration(0.0), "0s");
        assert_eq!(format_duration(0.4), "0s");
    }

    #[test]
    fn format_duration_minutes_and_seconds() {
        assert_eq!(format_duration(61.0), "1m 1s");
    }

    #[test]
    fn format_duration_full_decomposition() {
        assert_eq!(format_duration(3661.0), "1h 1m 1s");
    }

    #[test]
    fn format_duration_omits_zero_components() {
        assert_eq!(format_duration(120.2345), "2m");
        assert_eq!(format_duration(3600.0), "1h");
        assert_eq!(format_duration(3601.0), "1h 1s");
    }

    #[test]
    fn member_summary_sorts_and_annotates_percentages() {
        let summary = member_summary(
            MemberId(1),
            &stats(&[(10, 30.0), (11, 70.0)]),
            &StubDirectory,
        );

        assert_eq!(summary.total_seconds, 100.0);
        assert_eq!(summary.entries.len(), 2);
        assert_eq!(summary.entries[0].channel_id, ChannelId(11));
        assert_eq!(summary.entries[0].percent, 70.0);
        assert_eq!(summary.entries[1].channel_id, ChannelId(10));
        assert_eq!(summary.entries[1].percent, 30.0);
        assert_eq!(summary.display_name.as_deref(), Some("member-1"));
    }

    #[test]
    fn member_summary_excludes_deleted_channels_from_total() {
        let summary = member_summary(
            MemberId(1),
            &stats(&[(10, 30.0), (99, 1000.0)]),
            &StubDirectory,
        );

        assert_eq!(summary.entries.len(), 1);
        assert_eq!(summary.total_seconds, 30.0);
        assert_eq!(summary.entries[0].percent, 100.0);
    }

    #[test]
    fn member_summary_empty_stats_is_explicit_no_activity() {
        let summary = member_summary(MemberId(1), &stats(&[]), &StubDirectory);

        assert!(summary.entries.is_empty());
        assert_eq!(summary.total_seconds, 0.0);
        assert_eq!(summary.total_formatted, "0s");
    }

    #[test]
    fn member_summary_truncates_display_but_totals_everything() {
        let mut wide = ChannelSeconds::new();
        for i in 0..30u64 {
            wide.insert(ChannelId(100 + i), (i + 1) as f64);
        }
        let summary = member_summary(MemberId(1), &wide, &StubDirectory);

        assert_eq!(summary.entries.len(), MAX_REPORT_ENTRIES);
        // Total reflects all 30 channels, not just the displayed 25.
        assert_eq!(summary.total_seconds, (1..=30).sum::<u64>() as f64);
        assert_eq!(summary.entries[0].seconds, 30.0);
    }

    #[test]
    fn member_summary_zero_total_yields_zero_percent() {
        let summary = member_summary(MemberId(1), &stats(&[(10, 0.0)]), &StubDirectory);
        assert_eq!(summary.entries[0].percent, 0.0);
    }

    #[test]
    fn leaderboard_ranks_members_by_total() {
        let mut durations = DurationMap::new();
        durations.insert(MemberId(1), stats(&[(10, 100.0)]));
        durations.insert(MemberId(2), stats(&[(10, 200.0), (11, 100.0)]));

        let board = leaderboard(GuildId(42), &durations, &StubDirectory).expect("leaderboard");

        assert_eq!(board.global_total_seconds, 400.0);
        assert_eq!(board.entries.len(), 2);
        assert_eq!(board.entries[0].member_id, MemberId(2));
        assert_eq!(board.entries[0].percent, 75.0);
        assert_eq!(board.entries[0].top_channel.channel_id, ChannelId(10));
        assert_eq!(board.entries[0].top_channel.seconds, 200.0);
        assert_eq!(board.entries[1].member_id, MemberId(1));
        assert_eq!(board.entries[1].percent, 25.0);
    }

    #[test]
    fn leaderboard_drops_members_with_only_deleted_channels() {
        let mut durations = DurationMap::new();
        durations.insert(MemberId(1), stats(&[(99, 500.0)]));
        durations.insert(MemberId(2), stats(&[(10, 50.0)]));

        let board = leaderboard(GuildId(42), &durations, &StubDirectory).expect("leaderboard");

        assert_eq!(board.entries.len(), 1);
        assert_eq!(board.entries[0].member_id, MemberId(2));
        // The deleted-channel member contributes nothing to the global total.
        assert_eq!(board.global_total_seconds, 50.0);
    }

    #[test]
    fn leaderboard_ignores_non_guild_members() {
        let mut durations = DurationMap::new();
        durations.insert(MemberId(1), stats(&[(10, 10.0)]));
        durations.insert(MemberId(77), stats(&[(10, 9999.0)]));

        let board = leaderboard(GuildId(42), &durations, &StubDirectory).expect("leaderboard");

        assert_eq!(board.entries.len(), 1);
        assert_eq!(board.global_total_seconds, 10.0);
    }

    #[test]
    fn leaderboard_unknown_guild_is_an_error() {
        let durations = DurationMap::new();
        let err = leaderboard(GuildId(7), &durations, &StubDirectory).unwrap_err();
        assert!(matches!(err, TallyError::GuildNotFound(GuildId(7))));
    }

    #[test]
    fn leaderboard_empty_store_yields_empty_board() {
        let board =
            leaderboard(GuildId(42), &DurationMap::new(), &StubDirectory).expect("leaderboard");
        assert!(board.entries.is_empty());
        assert_eq!(board.global_total_seconds, 0.0);
        assert_eq!(board.global_total_formatted, "0s");
    }
}
