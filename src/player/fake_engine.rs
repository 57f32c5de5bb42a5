// src/player/fake_engine.rs
//
// In-memory engine for tests. Notifications are delivered synchronously
// from the calls that cause them, like a real engine on its own thread would
// deliver them shortly after.

use std::sync::{Arc, Mutex, MutexGuard};

use super::engine::{
    EngineEvent, EngineListener, Format, ListenerId, ListenerRegistry, PlaybackEngine,
    PlaybackState, QueueItem, SeekParameters, Timeline, TrackGroup, TrackType, VideoSize,
};
use crate::error::{AppError, AppResult};

#[derive(Debug, Default)]
pub struct FakeState {
    pub queue: Vec<QueueItem>,
    pub index: usize,
    pub position_ms: u64,
    pub duration_ms: Option<u64>,
    pub play_when_ready: bool,
    pub speed: f32,
    pub volume: f32,
    pub groups: Vec<TrackGroup>,
    pub seeks: Vec<u64>,
    pub seek_parameters: Vec<SeekParameters>,
    pub overrides: Vec<(TrackType, String)>,
    pub disabled: Vec<TrackType>,
    pub released: bool,
}

pub struct FakeEngine {
    state: Mutex<FakeState>,
    listeners: ListenerRegistry,
}

impl FakeEngine {
    pub fn new(duration_ms: Option<u64>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState {
                duration_ms,
                speed: 1.0,
                volume: 1.0,
                ..FakeState::default()
            }),
            listeners: ListenerRegistry::new(),
        })
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Deliver a notification as the engine would
    pub fn emit(&self, event: EngineEvent) {
        self.listeners.dispatch(&event);
    }

    pub fn set_position(&self, position_ms: u64) {
        self.state().position_ms = position_ms;
    }

    pub fn set_groups(&self, groups: Vec<TrackGroup>) {
        self.state().groups = groups.clone();
        self.emit(EngineEvent::TracksChanged(groups));
    }
}

impl PlaybackEngine for FakeEngine {
    fn add_listener(&self, listener: Arc<dyn EngineListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    fn remove_listener(&self, id: ListenerId) {
        self.listeners.remove(id);
    }

    fn set_queue(
        &self,
        items: Vec<QueueItem>,
        start_index: usize,
        start_position_ms: u64,
    ) -> AppResult<()> {
        if start_index >= items.len() {
            return Err(AppError::Engine("start index out of range".to_string()));
        }
        let timeline = {
            let mut state = self.state();
            state.queue = items;
            state.index = start_index;
            state.position_ms = start_position_ms;
            Timeline {
                item_count: state.queue.len(),
                duration_ms: state.duration_ms,
            }
        };
        self.emit(EngineEvent::TimelineChanged(timeline));
        Ok(())
    }

    fn prepare(&self) -> AppResult<()> {
        self.emit(EngineEvent::PlaybackStateChanged(PlaybackState::Buffering));
        Ok(())
    }

    fn play_when_ready(&self) -> bool {
        self.state().play_when_ready
    }

    fn set_play_when_ready(&self, play_when_ready: bool) {
        self.state().play_when_ready = play_when_ready;
        self.emit(EngineEvent::PlayWhenReadyChanged(play_when_ready));
    }

    fn is_playing(&self) -> bool {
        self.state().play_when_ready
    }

    fn playback_state(&self) -> PlaybackState {
        PlaybackState::Idle
    }

    fn current_index(&self) -> usize {
        self.state().index
    }

    fn item_count(&self) -> usize {
        self.state().queue.len()
    }

    fn current_position_ms(&self) -> u64 {
        self.state().position_ms
    }

    fn duration_ms(&self) -> Option<u64> {
        self.state().duration_ms
    }

    fn seek_to(&self, position_ms: u64) {
        let mut state = self.state();
        state.position_ms = position_ms;
        state.seeks.push(position_ms);
    }

    fn seek_to_item(&self, index: usize, position_ms: u64) {
        let previous = {
            let mut state = self.state();
            let previous = (state.index, state.position_ms);
            state.index = index;
            state.position_ms = position_ms;
            state.seeks.push(position_ms);
            previous
        };
        if previous.0 != index {
            self.emit(EngineEvent::PositionDiscontinuity {
                old: super::engine::PositionInfo {
                    media_item_index: previous.0,
                    position_ms: previous.1,
                },
                new: super::engine::PositionInfo {
                    media_item_index: index,
                    position_ms,
                },
            });
            self.emit(EngineEvent::MediaItemTransition {
                index,
                reason: super::engine::MediaItemTransitionReason::Seek,
            });
        }
    }

    fn set_seek_parameters(&self, parameters: SeekParameters) {
        self.state().seek_parameters.push(parameters);
    }

    fn playback_speed(&self) -> f32 {
        self.state().speed
    }

    fn set_playback_speed(&self, speed: f32) {
        self.state().speed = speed;
    }

    fn volume(&self) -> f32 {
        self.state().volume
    }

    fn set_volume(&self, volume: f32) {
        self.state().volume = volume;
    }

    fn video_format(&self) -> Option<Format> {
        None
    }

    fn audio_format(&self) -> Option<Format> {
        None
    }

    fn video_size(&self) -> VideoSize {
        VideoSize::default()
    }

    fn track_groups(&self) -> Vec<TrackGroup> {
        self.state().groups.clone()
    }

    fn override_track(&self, track_type: TrackType, format_id: &str) -> AppResult<()> {
        self.state()
            .overrides
            .push((track_type, format_id.to_string()));
        Ok(())
    }

    fn disable_track(&self, track_type: TrackType) -> AppResult<()> {
        self.state().disabled.push(track_type);
        Ok(())
    }

    fn release(&self) {
        self.state().released = true;
        self.listeners.clear();
    }
}
