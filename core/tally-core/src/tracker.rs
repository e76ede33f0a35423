//! In-memory tracking of currently-active sessions.
//!
//! The tracker exclusively owns live sessions. It is transient by design:
//! populated at startup by reconciliation, mutated per transition, never
//! persisted. At most one session exists per member at any time.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::types::{ChannelId, LiveSession, MemberId};

#[derive(Debug, Default)]
pub struct SessionTracker {
    sessions: HashMap<MemberId, LiveSession>,
}

impl SessionTracker {
    pub fn new() -> Self {
        SessionTracker::default()
    }

    /// Records a new live session for `member`.
    ///
    /// Any prior entry is overwritten without accounting; that only
    /// legitimately happens on a move-in whose matching move-out was already
    /// closed in the same logical step.
    pub fn open(&mut self, member: MemberId, channel: ChannelId, now: DateTime<Utc>) {
        if let Some(previous) = self.sessions.insert(
            member,
            LiveSession {
                channel,
                started_at: now,
            },
        ) {
            debug!(
                member = %member,
                previous_channel = %previous.channel,
                channel = %channel,
                "Replaced existing live session"
            );
        }
    }

    /// Removes and returns the live session for `member`.
    ///
    /// `None` is a recoverable condition, not a fault: a disconnect arrived
    /// for a member the tracker never saw connect (the tracker started after
    /// the connect, or the event was missed). Callers log and skip
    /// accounting.
    pub fn close(&mut self, member: MemberId) -> Option<LiveSession> {
        self.sessions.remove(&member)
    }

    pub fn get(&self, member: MemberId) -> Option<&LiveSession> {
        self.sessions.get(&member)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn open_then_close_returns_session() {
        let mut tracker = SessionTracker::new();
        tracker.open(MemberId(1), ChannelId(10), at(1000));

        let session = tracker.close(MemberId(1)).expect("tracked session");
        assert_eq!(session.channel, ChannelId(10));
        assert_eq!(session.started_at, at(1000));
        assert!(tracker.is_empty());
    }

    #[test]
    fn close_untracked_member_returns_none() {
        let mut tracker = SessionTracker::new();
        assert!(tracker.close(MemberId(99)).is_none());
    }

    #[test]
    fn open_overwrites_prior_session() {
        let mut tracker = SessionTracker::new();
        tracker.open(MemberId(1), ChannelId(10), at(1000));
        tracker.open(MemberId(1), ChannelId(11), at(2000));

        assert_eq!(tracker.len(), 1);
        let session = tracker.close(MemberId(1)).expect("tracked session");
        assert_eq!(session.channel, ChannelId(11));
        assert_eq!(session.started_at, at(2000));
    }

    #[test]
    fn members_are_tracked_independently() {
        let mut tracker = SessionTracker::new();
        tracker.open(MemberId(1), ChannelId(10), at(1000));
        tracker.open(MemberId(2), ChannelId(10), at(1500));

        assert_eq!(tracker.len(), 2);
        tracker.close(MemberId(1));
        assert!(tracker.get(MemberId(2)).is_some());
    }
}
