// src/player/engine.rs
//
// Playback engine seam
//
// The controller never decodes or renders anything itself. It drives an
// engine through this trait and learns about state changes from
// `EngineEvent` notifications.
//
// RULES:
// - Listeners are notified in registration order
// - A removed listener receives no further notifications
// - Playback errors are notifications, not `Err` returns

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::AppResult;

pub type ListenerId = u64;

/// Receives engine notifications
pub trait EngineListener: Send + Sync {
    fn on_event(&self, event: &EngineEvent);
}

/// Something the engine can play: a local path or an opaque locator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub uri: String,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    Idle,
    Buffering,
    Ready,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackType {
    Video,
    Audio,
    Text,
}

/// Why the current queue item changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaItemTransitionReason {
    /// The same item started over
    Repeat,
    /// The previous item played to its end
    Auto,
    /// The user moved to another item
    Seek,
    /// The queue itself was replaced
    PlaylistChanged,
}

/// How precisely a seek lands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeekParameters {
    Exact,
    ClosestSync,
    PreviousSync,
    NextSync,
}

/// A position inside the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionInfo {
    pub media_item_index: usize,
    pub position_ms: u64,
}

/// Description of one elementary stream
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Format {
    pub id: String,
    pub label: Option<String>,
    pub language: Option<String>,
    pub codec: Option<String>,
}

/// A group of interchangeable formats of one track type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackGroup {
    pub track_type: TrackType,
    pub formats: Vec<Format>,
    pub is_selected: bool,
    pub is_supported: bool,
}

impl TrackGroup {
    pub fn first_format(&self) -> Option<&Format> {
        self.formats.first()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VideoSize {
    pub width: u32,
    pub height: u32,
    /// Clockwise rotation to apply when displaying
    pub rotation_degrees: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceVolume {
    pub volume: u32,
    pub muted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackError {
    pub code: String,
    pub message: String,
}

impl std::fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Queue-level timing information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Timeline {
    pub item_count: usize,
    /// Duration of the current item, `None` while unknown
    pub duration_ms: Option<u64>,
}

/// Notifications emitted by an engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    TimelineChanged(Timeline),
    MediaItemTransition {
        index: usize,
        reason: MediaItemTransitionReason,
    },
    PositionDiscontinuity {
        old: PositionInfo,
        new: PositionInfo,
    },
    PlaybackStateChanged(PlaybackState),
    IsLoadingChanged(bool),
    PlayWhenReadyChanged(bool),
    IsPlayingChanged(bool),
    VideoFormatChanged(Option<Format>),
    AudioFormatChanged(Option<Format>),
    TracksChanged(Vec<TrackGroup>),
    VolumeChanged(f32),
    DeviceVolumeChanged(DeviceVolume),
    VideoSizeChanged(VideoSize),
    PlaybackSpeedChanged(f32),
    RenderedFirstFrame,
    PlayerErrorChanged(Option<PlaybackError>),
}

/// The operations the player needs from a playback engine
#[cfg_attr(test, mockall::automock)]
pub trait PlaybackEngine: Send + Sync {
    fn add_listener(&self, listener: Arc<dyn EngineListener>) -> ListenerId;

    fn remove_listener(&self, id: ListenerId);

    /// Replace the queue and position the engine at `start_index`/`start_position_ms`
    fn set_queue(
        &self,
        items: Vec<QueueItem>,
        start_index: usize,
        start_position_ms: u64,
    ) -> AppResult<()>;

    fn prepare(&self) -> AppResult<()>;

    fn play_when_ready(&self) -> bool;

    fn set_play_when_ready(&self, play_when_ready: bool);

    fn is_playing(&self) -> bool;

    fn playback_state(&self) -> PlaybackState;

    fn current_index(&self) -> usize;

    fn item_count(&self) -> usize;

    fn current_position_ms(&self) -> u64;

    /// Duration of the current item, `None` while unknown
    fn duration_ms(&self) -> Option<u64>;

    fn seek_to(&self, position_ms: u64);

    fn seek_to_item(&self, index: usize, position_ms: u64);

    fn set_seek_parameters(&self, parameters: SeekParameters);

    fn playback_speed(&self) -> f32;

    fn set_playback_speed(&self, speed: f32);

    /// Player volume in `[0.0, 1.0]`
    fn volume(&self) -> f32;

    fn set_volume(&self, volume: f32);

    fn video_format(&self) -> Option<Format>;

    fn audio_format(&self) -> Option<Format>;

    fn video_size(&self) -> VideoSize;

    fn track_groups(&self) -> Vec<TrackGroup>;

    /// Force the given format of `track_type` to be selected
    fn override_track(&self, track_type: TrackType, format_id: &str) -> AppResult<()>;

    /// Turn off every track of `track_type`
    fn disable_track(&self, track_type: TrackType) -> AppResult<()>;

    fn release(&self);
}

/// Fan-out of notifications to registered listeners, shared by engine adapters
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: std::sync::atomic::AtomicU64,
    listeners: std::sync::RwLock<Vec<(ListenerId, Arc<dyn EngineListener>)>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<dyn EngineListener>) -> ListenerId {
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, listener));
        id
    }

    pub fn remove(&self, id: ListenerId) {
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|(listener_id, _)| *listener_id != id);
    }

    pub fn clear(&self) {
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `event` to every listener in registration order
    pub fn dispatch(&self, event: &EngineEvent) {
        // Snapshot first so listeners may (un)register while being notified
        let listeners: Vec<_> = self
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            listener.on_event(event);
        }
    }
}
