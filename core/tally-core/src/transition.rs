//! Classifies a before/after channel pair into a state-machine transition.
//! Pure and total: every pair maps to exactly one kind.

use crate::types::ChannelId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// No channel change (mute/deafen toggles and the like).
    Unchanged,
    Join(ChannelId),
    Leave(ChannelId),
    Move { from: ChannelId, to: ChannelId },
}

pub fn classify(before: Option<ChannelId>, after: Option<ChannelId>) -> TransitionKind {
    match (before, after) {
        (None, None) => TransitionKind::Unchanged,
        (Some(b), Some(a)) if b == a => TransitionKind::Unchanged,
        (Some(from), Some(to)) => TransitionKind::Move { from, to },
        (None, Some(channel)) => TransitionKind::Join(channel),
        (Some(channel), None) => TransitionKind::Leave(channel),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_channels_is_unchanged() {
        assert_eq!(classify(None, None), TransitionKind::Unchanged);
    }

    #[test]
    fn same_channel_is_unchanged() {
        assert_eq!(
            classify(Some(ChannelId(10)), Some(ChannelId(10))),
            TransitionKind::Unchanged
        );
    }

    #[test]
    fn none_to_channel_is_join() {
        assert_eq!(
            classify(None, Some(ChannelId(10))),
            TransitionKind::Join(ChannelId(10))
        );
    }

    #[test]
    fn channel_to_none_is_leave() {
        assert_eq!(
            classify(Some(ChannelId(10)), None),
            TransitionKind::Leave(ChannelId(10))
        );
    }

    #[test]
    fn different_channels_is_move() {
        assert_eq!(
            classify(Some(ChannelId(10)), Some(ChannelId(11))),
            TransitionKind::Move {
                from: ChannelId(10),
                to: ChannelId(11)
            }
        );
    }
}
