// src/player/mod.rs
//
// Player core: engine abstraction, mirrored state, gestures, track selection
// and lifecycle persistence.

pub mod controller;
pub mod engine;
pub mod gestures;
pub mod persistence;
pub mod property;
pub mod session;
pub mod state_mirror;
pub mod tracks;
pub mod ui_state;

#[cfg(test)]
pub(crate) mod fake_engine;


pub use controller::{PlayerController, PlayerEvent};
pub use engine::{
    DeviceVolume, EngineEvent, EngineListener, Format, ListenerId, ListenerRegistry,
    MediaItemTransitionReason, PlaybackEngine, PlaybackError, PlaybackState, PositionInfo,
    QueueItem, SeekParameters, Timeline, TrackGroup, TrackType, VideoSize,
};
pub use gestures::{GestureConfig, LevelBar, LevelDrag, LevelStep, SeekDrag};
pub use persistence::PersistableState;
pub use property::Property;
pub use session::{PlayerInput, PlayerSession, SessionItem};
pub use state_mirror::{PlayerState, PlayerStateMirror};
pub use tracks::TrackOption;
pub use ui_state::{Orientation, PlayerUiState, ResumePrompt, CONTROLLER_TIMEOUT, MAX_LEVEL};
