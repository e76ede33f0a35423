//! The accounting engine: one tracker, one store, one guild filter.
//!
//! Owned explicitly by the host (the daemon wraps it in a mutex) rather
//! than living as ambient global state, so tests construct it fresh.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::directory::EntityDirectory;
use crate::error::Result;
use crate::report::{self, Leaderboard, MemberSummary};
use crate::store::DurationStore;
use crate::tracker::SessionTracker;
use crate::transition::{classify, TransitionKind};
use crate::types::{ChannelId, GuildId, MemberId, PresenceSnapshot, PresenceTransition};

pub struct Engine {
    monitored: HashSet<GuildId>,
    tracker: SessionTracker,
    store: DurationStore,
}

impl Engine {
    pub fn new(monitored: impl IntoIterator<Item = GuildId>, store: DurationStore) -> Self {
        Engine {
            monitored: monitored.into_iter().collect(),
            tracker: SessionTracker::new(),
            store,
        }
    }

    pub fn is_monitored(&self, guild: GuildId) -> bool {
        self.monitored.contains(&guild)
    }

    pub fn monitored_guilds(&self) -> usize {
        self.monitored.len()
    }

    pub fn tracked_sessions(&self) -> usize {
        self.tracker.len()
    }

    pub fn store(&self) -> &DurationStore {
        &self.store
    }

    /// Seeds live sessions for presence that predates the process.
    ///
    /// Every non-bot member currently in a channel of a monitored guild gets
    /// a session starting at `now`. Time before process start is not
    /// retroactively credited: the true start is unknown, so this undercounts
    /// rather than guesses. Returns the number of sessions seeded.
    pub fn reconcile(&mut self, snapshot: &PresenceSnapshot, now: DateTime<Utc>) -> usize {
        let mut seeded = 0;
        for guild in &snapshot.guilds {
            if !self.is_monitored(guild.guild) {
                debug!(guild = %guild.guild, "Skipping unmonitored guild in presence sync");
                continue;
            }
            for channel in &guild.channels {
                for member in &channel.members {
                    if member.is_bot {
                        continue;
                    }
                    debug!(
                        member = %member.member,
                        channel = %channel.channel,
                        "Member was already in a channel before observing"
                    );
                    self.tracker.open(member.member, channel.channel, now);
                    seeded += 1;
                }
            }
        }
        info!(seeded, "Presence reconciliation complete");
        seeded
    }

    /// Feeds one presence transition through the per-member state machine.
    ///
    /// Events for unmonitored guilds or bots are dropped up front. A move is
    /// an explicit leave-then-join so at most one live session exists per
    /// member at every observable instant.
    pub fn handle_transition(&mut self, transition: &PresenceTransition) {
        if !self.is_monitored(transition.guild) {
            return;
        }
        if transition.is_bot {
            return;
        }

        match classify(transition.before, transition.after) {
            TransitionKind::Unchanged => {}
            TransitionKind::Join(channel) => {
                debug!(member = %transition.member, channel = %channel, "Member joined channel");
                self.tracker.open(transition.member, channel, transition.at);
            }
            TransitionKind::Leave(channel) => {
                debug!(member = %transition.member, channel = %channel, "Member left channel");
                self.account_leave(transition.member, channel, transition.at);
            }
            TransitionKind::Move { from, to } => {
                debug!(
                    member = %transition.member,
                    from = %from,
                    to = %to,
                    "Member moved channels"
                );
                self.account_leave(transition.member, from, transition.at);
                self.tracker.open(transition.member, to, transition.at);
            }
        }
    }

    /// Per-member summary. The guild lookup validates the request scope and
    /// propagates an unknown guild as an error.
    pub fn member_report(
        &self,
        guild: GuildId,
        member: MemberId,
        directory: &dyn EntityDirectory,
    ) -> Result<MemberSummary> {
        directory.guild_members(guild)?;
        let durations = self.store.read();
        let stats = durations.get(&member).cloned().unwrap_or_default();
        Ok(report::member_summary(member, &stats, directory))
    }

    /// Guild-wide leaderboard.
    pub fn leaderboard(
        &self,
        guild: GuildId,
        directory: &dyn EntityDirectory,
    ) -> Result<Leaderboard> {
        let durations = self.store.read();
        report::leaderboard(guild, &durations, directory)
    }

    fn account_leave(&mut self, member: MemberId, channel: ChannelId, at: DateTime<Utc>) {
        let Some(session) = self.tracker.close(member) else {
            // Known limitation: if the tracker started after the connect (or
            // the connect event was missed), the session's duration is lost.
            warn!(member = %member, channel = %channel, "Member disconnected without having been monitored");
            return;
        };

        if session.channel != channel {
            debug!(
                member = %member,
                tracked = %session.channel,
                reported = %channel,
                "Tracked channel differs from reported before-channel"
            );
        }

        let duration = at.signed_duration_since(session.started_at);
        let elapsed = duration
            .num_microseconds()
            .map(|us| us as f64 / 1_000_000.0)
            .unwrap_or_else(|| duration.num_seconds() as f64);

        let elapsed = if elapsed < 0.0 {
            warn!(
                member = %member,
                channel = %channel,
                elapsed,
                "Clamping negative elapsed time to zero"
            );
            0.0
        } else {
            elapsed
        };

        if let Err(err) = self.store.add(member, channel, elapsed) {
            warn!(error = %err, member = %member, channel = %channel, "Failed to persist accumulated duration");
        }
    }
}
