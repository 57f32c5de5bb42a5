// src/player/persistence.rs
//
// Playback snapshots taken on lifecycle changes

use serde::{Deserialize, Serialize};

use super::engine::{MediaItemTransitionReason, PlaybackEngine, PositionInfo};

/// What gets written back when playback of an item pauses or ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistableState {
    pub media_item_index: usize,
    pub position_ms: u64,
    pub play_when_ready: bool,
    /// Brightness level at the time of the snapshot, when known
    pub brightness: Option<u32>,
}

/// Snapshot for a pause: the engine position at the moment of the call
pub fn pause_snapshot(engine: &dyn PlaybackEngine, brightness: u32) -> PersistableState {
    PersistableState {
        media_item_index: engine.current_index(),
        position_ms: engine.current_position_ms(),
        play_when_ready: engine.play_when_ready(),
        brightness: Some(brightness),
    }
}

/// Snapshot for the item that was just left.
///
/// Nothing is produced when the previous item never rendered a frame: its
/// stored resume point stays as it was. An item that played to its end
/// resumes from the start next time.
pub fn transition_snapshot(
    old_position: Option<PositionInfo>,
    rendered_first_frame_for: Option<usize>,
    reason: MediaItemTransitionReason,
    play_when_ready: bool,
) -> Option<PersistableState> {
    let old = old_position?;
    if rendered_first_frame_for != Some(old.media_item_index) {
        return None;
    }

    let position_ms = match reason {
        MediaItemTransitionReason::Auto => 0,
        _ => old.position_ms,
    };

    Some(PersistableState {
        media_item_index: old.media_item_index,
        position_ms,
        play_when_ready,
        brightness: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::engine::MockPlaybackEngine;

    fn left(index: usize, position_ms: u64) -> Option<PositionInfo> {
        Some(PositionInfo {
            media_item_index: index,
            position_ms,
        })
    }

    #[test]
    fn test_pause_snapshot_uses_engine_position() {
        let mut engine = MockPlaybackEngine::new();
        engine.expect_current_index().return_const(3usize);
        engine.expect_current_position_ms().return_const(42_500u64);
        engine.expect_play_when_ready().return_const(true);

        let state = pause_snapshot(&engine, 12);

        assert_eq!(
            state,
            PersistableState {
                media_item_index: 3,
                position_ms: 42_500,
                play_when_ready: true,
                brightness: Some(12),
            }
        );
    }

    #[test]
    fn test_auto_transition_without_first_frame_emits_nothing() {
        let state = transition_snapshot(left(0, 9_000), None, MediaItemTransitionReason::Auto, true);
        assert_eq!(state, None);

        // A frame of another item does not count either
        let state =
            transition_snapshot(left(0, 9_000), Some(1), MediaItemTransitionReason::Auto, true);
        assert_eq!(state, None);
    }

    #[test]
    fn test_auto_transition_resets_finished_item() {
        let state =
            transition_snapshot(left(0, 9_000), Some(0), MediaItemTransitionReason::Auto, true)
                .unwrap();
        assert_eq!(state.position_ms, 0);
        assert_eq!(state.media_item_index, 0);
    }

    #[test]
    fn test_seek_transition_keeps_old_position() {
        let state =
            transition_snapshot(left(2, 31_000), Some(2), MediaItemTransitionReason::Seek, false)
                .unwrap();
        assert_eq!(state.position_ms, 31_000);
        assert!(!state.play_when_ready);
    }

    #[test]
    fn test_no_old_position_emits_nothing() {
        assert_eq!(
            transition_snapshot(None, Some(0), MediaItemTransitionReason::Seek, true),
            None
        );
    }
}
