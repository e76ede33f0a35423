//! Shared state managed by the daemon.
//!
//! One engine and one directory live behind a single mutex. Every event,
//! sync, and report passes through it, which is what serializes the duration
//! store's read-modify-write cycles: the store itself does no locking.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use tally_core::{
    ChannelId, ChannelPresence, Engine, GuildId, GuildPresence, Leaderboard, MemberId,
    MemberSummary, PresenceSnapshot, PresenceTransition, PresentMember, Result,
};
use tally_daemon_protocol::{DirectorySyncPayload, PresenceEventEnvelope, PresenceSyncPayload};

use crate::directory::{Directory, DirectoryCounts};

pub struct SharedState {
    inner: Mutex<DaemonState>,
}

struct DaemonState {
    engine: Engine,
    directory: Directory,
    reconciled: bool,
}

/// Result of a presence sync request.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct SyncOutcome {
    pub seeded: usize,
    pub already_reconciled: bool,
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct HealthSnapshot {
    pub reconciled: bool,
    pub tracked_sessions: usize,
    pub monitored_guilds: usize,
    pub directory_guilds: usize,
}

impl SharedState {
    pub fn new(engine: Engine) -> Self {
        SharedState {
            inner: Mutex::new(DaemonState {
                engine,
                directory: Directory::new(),
                reconciled: false,
            }),
        }
    }

    /// Applies one presence transition.
    ///
    /// The envelope is already validated; its `recorded_at` drives the
    /// accounting clock so a replayed event stream produces identical totals.
    pub fn handle_event(&self, event: &PresenceEventEnvelope) {
        let at = match parse_rfc3339(&event.recorded_at) {
            Some(at) => at,
            None => {
                // Validation guarantees RFC3339; reaching this means the
                // envelope bypassed parse_event.
                warn!(event_id = %event.event_id, "Dropping event with unparseable timestamp");
                return;
            }
        };

        let transition = PresenceTransition {
            guild: GuildId(event.guild_id),
            member: MemberId(event.member_id),
            is_bot: event.is_bot,
            before: event.before_channel_id.map(ChannelId),
            after: event.after_channel_id.map(ChannelId),
            at,
        };

        self.lock().engine.handle_transition(&transition);
    }

    /// Seeds the tracker from current real-world presence.
    ///
    /// Runs at most once per daemon lifetime: presence events are
    /// edge-triggered, so only the first sync describes sessions the daemon
    /// has not observed starting. Later syncs are ignored with a warning.
    pub fn sync_presence(&self, payload: &PresenceSyncPayload, now: DateTime<Utc>) -> SyncOutcome {
        let mut state = self.lock();
        if state.reconciled {
            warn!("Ignoring repeated presence sync; reconciliation already ran");
            return SyncOutcome {
                seeded: 0,
                already_reconciled: true,
            };
        }

        let snapshot = to_snapshot(payload);
        let seeded = state.engine.reconcile(&snapshot, now);
        state.reconciled = true;
        SyncOutcome {
            seeded,
            already_reconciled: false,
        }
    }

    pub fn sync_directory(&self, payload: &DirectorySyncPayload) -> DirectoryCounts {
        let mut state = self.lock();
        let counts = state.directory.apply_sync(payload);
        info!(
            guilds = counts.guilds,
            channels = counts.channels,
            members = counts.members,
            "Directory sync applied"
        );
        counts
    }

    pub fn member_report(&self, guild: GuildId, member: MemberId) -> Result<MemberSummary> {
        let state = self.lock();
        state.engine.member_report(guild, member, &state.directory)
    }

    pub fn leaderboard(&self, guild: GuildId) -> Result<Leaderboard> {
        let state = self.lock();
        state.engine.leaderboard(guild, &state.directory)
    }

    pub fn health(&self) -> HealthSnapshot {
        let state = self.lock();
        HealthSnapshot {
            reconciled: state.reconciled,
            tracked_sessions: state.engine.tracked_sessions(),
            monitored_guilds: state.engine.monitored_guilds(),
            directory_guilds: state.directory.guild_count(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DaemonState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn to_snapshot(payload: &PresenceSyncPayload) -> PresenceSnapshot {
    PresenceSnapshot {
        guilds: payload
            .guilds
            .iter()
            .map(|guild| GuildPresence {
                guild: GuildId(guild.guild_id),
                channels: guild
                    .channels
                    .iter()
                    .map(|channel| ChannelPresence {
                        channel: ChannelId(channel.channel_id),
                        members: channel
                            .members
                            .iter()
                            .map(|member| PresentMember {
                                member: MemberId(member.member_id),
                                is_bot: member.is_bot,
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect(),
    }
}

fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
