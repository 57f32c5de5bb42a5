// src/player/state_mirror.rs
//
// Player State Mirror
//
// Read-only snapshot of an engine, kept current by an engine listener.
//
// RULES:
// - Every notification updates only the field(s) it describes
// - Errors are published as a field, never raised
// - After `dispose` no field changes, and `dispose` may be called repeatedly

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::engine::{
    DeviceVolume, EngineEvent, EngineListener, Format, ListenerId, PlaybackEngine, PlaybackError,
    PlaybackState, PositionInfo, Timeline, TrackGroup, TrackType, VideoSize,
};
use super::property::Property;

/// Observable engine fields
#[derive(Debug)]
pub struct PlayerState {
    pub timeline: Property<Timeline>,
    pub media_item_index: Property<usize>,
    /// Last position reported before a jump to another queue item
    pub old_position: Property<Option<PositionInfo>>,
    /// Queue index of the most recent item that rendered its first frame
    pub rendered_first_frame_for: Property<Option<usize>>,
    pub video_format: Property<Option<Format>>,
    pub audio_format: Property<Option<Format>>,
    pub audio_tracks: Property<Vec<TrackGroup>>,
    pub subtitle_tracks: Property<Vec<TrackGroup>>,
    pub is_loading: Property<bool>,
    pub playback_state: Property<PlaybackState>,
    pub play_when_ready: Property<bool>,
    pub is_playing: Property<bool>,
    pub player_error: Property<Option<PlaybackError>>,
    pub playback_speed: Property<f32>,
    pub volume: Property<f32>,
    pub device_volume: Property<DeviceVolume>,
    pub video_size: Property<VideoSize>,
    disposed: AtomicBool,
}

impl PlayerState {
    fn from_engine(engine: &dyn PlaybackEngine) -> Self {
        let groups = engine.track_groups();
        Self {
            timeline: Property::new(
                Timeline {
                    item_count: engine.item_count(),
                    duration_ms: engine.duration_ms(),
                },
                "timeline",
            ),
            media_item_index: Property::new(engine.current_index(), "media_item_index"),
            old_position: Property::new(None, "old_position"),
            rendered_first_frame_for: Property::new(None, "rendered_first_frame_for"),
            video_format: Property::new(engine.video_format(), "video_format"),
            audio_format: Property::new(engine.audio_format(), "audio_format"),
            audio_tracks: Property::new(groups_of(&groups, TrackType::Audio), "audio_tracks"),
            subtitle_tracks: Property::new(groups_of(&groups, TrackType::Text), "subtitle_tracks"),
            is_loading: Property::new(false, "is_loading"),
            playback_state: Property::new(engine.playback_state(), "playback_state"),
            play_when_ready: Property::new(engine.play_when_ready(), "play_when_ready"),
            is_playing: Property::new(engine.is_playing(), "is_playing"),
            player_error: Property::new(None, "player_error"),
            playback_speed: Property::new(engine.playback_speed(), "playback_speed"),
            volume: Property::new(engine.volume(), "volume"),
            device_volume: Property::new(DeviceVolume::default(), "device_volume"),
            video_size: Property::new(engine.video_size(), "video_size"),
            disposed: AtomicBool::new(false),
        }
    }

    fn apply(&self, event: &EngineEvent) {
        match event {
            EngineEvent::TimelineChanged(timeline) => self.timeline.set(*timeline),
            EngineEvent::MediaItemTransition { index, .. } => self.media_item_index.set(*index),
            EngineEvent::PositionDiscontinuity { old, new } => {
                if old.media_item_index != new.media_item_index {
                    self.old_position.set(Some(*old));
                }
            }
            EngineEvent::PlaybackStateChanged(state) => self.playback_state.set(*state),
            EngineEvent::IsLoadingChanged(loading) => self.is_loading.set(*loading),
            EngineEvent::PlayWhenReadyChanged(value) => self.play_when_ready.set(*value),
            EngineEvent::IsPlayingChanged(playing) => self.is_playing.set(*playing),
            EngineEvent::VideoFormatChanged(format) => self.video_format.set(format.clone()),
            EngineEvent::AudioFormatChanged(format) => self.audio_format.set(format.clone()),
            EngineEvent::TracksChanged(groups) => {
                self.audio_tracks.set(groups_of(groups, TrackType::Audio));
                self.subtitle_tracks.set(groups_of(groups, TrackType::Text));
            }
            EngineEvent::VolumeChanged(volume) => self.volume.set(*volume),
            EngineEvent::DeviceVolumeChanged(device) => self.device_volume.set(*device),
            EngineEvent::VideoSizeChanged(size) => self.video_size.set(*size),
            EngineEvent::PlaybackSpeedChanged(speed) => self.playback_speed.set(*speed),
            EngineEvent::RenderedFirstFrame => self
                .rendered_first_frame_for
                .set(Some(self.media_item_index.get())),
            EngineEvent::PlayerErrorChanged(error) => self.player_error.set(error.clone()),
        }
    }
}

fn groups_of(groups: &[TrackGroup], track_type: TrackType) -> Vec<TrackGroup> {
    groups
        .iter()
        .filter(|g| g.track_type == track_type)
        .cloned()
        .collect()
}

struct MirrorListener {
    state: Arc<PlayerState>,
}

impl EngineListener for MirrorListener {
    fn on_event(&self, event: &EngineEvent) {
        if self.state.disposed.load(Ordering::SeqCst) {
            return;
        }
        self.state.apply(event);
    }
}

/// Keeps a [`PlayerState`] in sync with an engine until disposed
pub struct PlayerStateMirror {
    engine: Arc<dyn PlaybackEngine>,
    state: Arc<PlayerState>,
    listener_id: Mutex<Option<ListenerId>>,
}

impl PlayerStateMirror {
    /// Snapshot the engine and start listening to it
    pub fn attach(engine: Arc<dyn PlaybackEngine>) -> Self {
        let state = Arc::new(PlayerState::from_engine(engine.as_ref()));
        let listener_id = engine.add_listener(Arc::new(MirrorListener {
            state: Arc::clone(&state),
        }));

        Self {
            engine,
            state,
            listener_id: Mutex::new(Some(listener_id)),
        }
    }

    pub fn state(&self) -> &PlayerState {
        &self.state
    }

    pub fn is_disposed(&self) -> bool {
        self.state.disposed.load(Ordering::SeqCst)
    }

    /// Stop mirroring. Safe to call more than once.
    pub fn dispose(&self) {
        self.state.disposed.store(true, Ordering::SeqCst);

        let id = self
            .listener_id
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(id) = id {
            self.engine.remove_listener(id);
            log::debug!("player state mirror detached (listener {})", id);
        }
    }
}

impl Drop for PlayerStateMirror {
    fn drop(&mut self) {
        self.dispose();
    }
}
