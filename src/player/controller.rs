// src/player/controller.rs
//
// Player Controller
//
// Owns one engine for the lifetime of a player screen. Interprets user input
// (taps, drags, keys, buttons) into engine calls, reacts to engine
// notifications and emits `PlayerEvent`s for everything that must outlive the
// screen.
//
// RULES:
// - Never holds one of its own locks while calling into the engine
// - The state mirror is attached before the controller's own listener,
//   so the mirror is current whenever the controller handles a notification
// - Does NOT touch the catalog or the preference stores directly

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Instant;
use tokio::sync::{mpsc, watch};

use super::engine::{
    EngineEvent, EngineListener, ListenerId, MediaItemTransitionReason, PlaybackEngine,
    PlaybackError, SeekParameters,
};
use super::gestures::{GestureConfig, LevelBar, LevelDrag, LevelStep, SeekDrag};
use super::persistence::{pause_snapshot, transition_snapshot, PersistableState};
use super::property::Property;
use super::session::PlayerSession;
use super::state_mirror::{PlayerState, PlayerStateMirror};
use super::tracks::{reapply_remembered_tracks, track_options, track_type_for, TrackOption};
use super::ui_state::{
    is_buffering, Orientation, PlayerUiState, ResumePrompt, CONTROLLER_TIMEOUT, MAX_LEVEL,
};
use crate::domain::{AspectRatio, PlayerPreferences, Resume, TrackKind};
use crate::error::AppResult;

/// Restarting the current item instead of going back happens past this position
const PREVIOUS_ITEM_THRESHOLD_MS: u64 = 3000;

/// Scrubbing closer than this to the current position is ignored
const MIN_SCRUB_DISTANCE_MS: u64 = 1000;

/// Facts the rest of the application should persist
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    SaveState {
        path: PathBuf,
        state: PersistableState,
    },
    SaveTrack {
        path: PathBuf,
        kind: TrackKind,
        format_id: Option<String>,
    },
    /// The engine measured the duration of an item the catalog had none for
    SaveDuration {
        path: PathBuf,
        duration_ms: u64,
    },
    SaveAspectRatio(AspectRatio),
    /// Playback speed in percent
    SavePlaybackSpeed(u32),
    PlaybackError {
        path: Option<PathBuf>,
        error: PlaybackError,
    },
}

#[derive(Default)]
struct Gestures {
    seek: Option<SeekDrag>,
    level: Option<LevelDrag>,
    scrubbing: bool,
    controller_shown_at: Option<Instant>,
    paused_state: Option<PersistableState>,
}

struct Shared {
    engine: Arc<dyn PlaybackEngine>,
    mirror: PlayerStateMirror,
    ui: Property<PlayerUiState>,
    gesture_config: GestureConfig,
    preferences: PlayerPreferences,
    session: Mutex<PlayerSession>,
    gestures: Mutex<Gestures>,
    events: mpsc::UnboundedSender<PlayerEvent>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Shared {
    fn emit(&self, event: PlayerEvent) {
        if self.events.send(event).is_err() {
            log::debug!("player event dropped: no receiver");
        }
    }

    fn seek_parameters(&self) -> SeekParameters {
        if self.preferences.fast_seeking {
            SeekParameters::PreviousSync
        } else {
            SeekParameters::Exact
        }
    }

    /// Record a snapshot on its session item and emit it when the item is persistable
    fn save_item_state(&self, state: PersistableState) {
        let path = {
            let mut session = lock(&self.session);
            match session.item_mut(state.media_item_index) {
                Some(item) => {
                    item.last_played_position_ms = match item.duration_ms {
                        Some(duration) => state.position_ms.min(duration),
                        None => state.position_ms,
                    };
                    item.path.clone()
                }
                None => None,
            }
        };

        if let Some(path) = path {
            self.emit(PlayerEvent::SaveState { path, state });
        }
    }

    fn current_path(&self) -> Option<PathBuf> {
        let index = self.mirror.state().media_item_index.get();
        lock(&self.session).item(index).and_then(|i| i.path.clone())
    }

    fn handle_event(&self, event: &EngineEvent) {
        match event {
            EngineEvent::MediaItemTransition { index, reason } => {
                self.on_media_item_transition(*index, *reason)
            }
            EngineEvent::TracksChanged(_) => self.reapply_tracks(),
            EngineEvent::TimelineChanged(timeline) => {
                let duration_ms = timeline.duration_ms;
                self.ui.update(|ui| ui.duration_ms = duration_ms);
                if let Some(duration_ms) = duration_ms {
                    self.learn_duration(duration_ms);
                }
            }
            EngineEvent::IsPlayingChanged(playing) => {
                let playing = *playing;
                self.ui.update(|ui| ui.keep_screen_on = playing);
            }
            EngineEvent::VideoSizeChanged(size) => {
                let orientation = Orientation::for_video(*size);
                self.ui.update(|ui| ui.orientation = orientation);
            }
            EngineEvent::PlaybackStateChanged(_) | EngineEvent::VideoFormatChanged(_) => {
                let state = self.mirror.state();
                let buffering = is_buffering(
                    state.playback_state.get(),
                    state.video_format.get().is_some(),
                );
                self.ui.update(|ui| ui.is_buffering = buffering);
            }
            EngineEvent::PlayerErrorChanged(Some(error)) => {
                log::warn!("playback error: {}", error);
                self.emit(PlayerEvent::PlaybackError {
                    path: self.current_path(),
                    error: error.clone(),
                });
            }
            _ => {}
        }
    }

    /// Fill in the current item's duration once, when the session had none
    fn learn_duration(&self, duration_ms: u64) {
        let index = self.mirror.state().media_item_index.get();
        let path = {
            let mut session = lock(&self.session);
            match session.item_mut(index) {
                Some(item) if item.duration_ms.is_none() => {
                    item.duration_ms = Some(duration_ms);
                    item.path.clone()
                }
                _ => None,
            }
        };

        if let Some(path) = path {
            self.emit(PlayerEvent::SaveDuration { path, duration_ms });
        }
    }

    fn on_media_item_transition(&self, index: usize, reason: MediaItemTransitionReason) {
        let state = self.mirror.state();
        if let Some(snapshot) = transition_snapshot(
            state.old_position.get(),
            state.rendered_first_frame_for.get(),
            reason,
            state.play_when_ready.get(),
        ) {
            self.save_item_state(snapshot);
        }

        if matches!(
            reason,
            MediaItemTransitionReason::Repeat | MediaItemTransitionReason::PlaylistChanged
        ) {
            return;
        }

        let saved = lock(&self.session)
            .item(index)
            .map(|item| item.last_played_position_ms)
            .unwrap_or(0);
        if saved == 0 {
            return;
        }

        match self.preferences.resume {
            Resume::Always => self.engine.seek_to(saved),
            Resume::Ask => self.ui.update(|ui| {
                ui.resume_prompt = Some(ResumePrompt {
                    media_item_index: index,
                    position_ms: saved,
                })
            }),
            Resume::Never => {}
        }
    }

    fn reapply_tracks(&self) {
        let index = self.mirror.state().media_item_index.get();
        let remembered = lock(&self.session)
            .item(index)
            .map(|item| (item.audio_track_id.clone(), item.subtitle_track_id.clone()));

        if let Some((audio, subtitle)) = remembered {
            if let Err(e) = reapply_remembered_tracks(
                self.engine.as_ref(),
                audio.as_deref(),
                subtitle.as_deref(),
            ) {
                log::warn!("could not restore remembered tracks: {}", e);
            }
        }
    }
}

struct ControllerListener {
    shared: Weak<Shared>,
}

impl EngineListener for ControllerListener {
    fn on_event(&self, event: &EngineEvent) {
        if let Some(shared) = self.shared.upgrade() {
            shared.handle_event(event);
        }
    }
}

/// Drives one engine for one player screen
pub struct PlayerController {
    shared: Arc<Shared>,
    listener_id: Mutex<Option<ListenerId>>,
    released: AtomicBool,
}

impl PlayerController {
    /// Start playing `session` on `engine`.
    ///
    /// Returns the controller and the stream of events to persist.
    pub fn open(
        engine: Arc<dyn PlaybackEngine>,
        session: PlayerSession,
        preferences: PlayerPreferences,
        gesture_config: GestureConfig,
    ) -> AppResult<(Self, mpsc::UnboundedReceiver<PlayerEvent>)> {
        let (events, receiver) = mpsc::unbounded_channel();

        let mirror = PlayerStateMirror::attach(Arc::clone(&engine));

        let brightness_level = if preferences.save_brightness_level {
            preferences.brightness_level.min(MAX_LEVEL)
        } else {
            MAX_LEVEL / 2
        };
        let volume_level = (engine.volume().clamp(0.0, 1.0) * MAX_LEVEL as f32).round() as u32;
        let resume_prompt = session.resume_prompt.map(|position_ms| ResumePrompt {
            media_item_index: session.start_index,
            position_ms,
        });

        let ui = Property::new(
            PlayerUiState {
                brightness_level,
                volume_level,
                aspect_ratio: preferences.aspect_ratio,
                resume_prompt,
                duration_ms: session
                    .item(session.start_index)
                    .and_then(|i| i.duration_ms),
                position_ms: session.start_position_ms,
                ..PlayerUiState::default()
            },
            "player_ui",
        );

        let queue = session.queue();
        let start_index = session.start_index;
        let start_position_ms = session.start_position_ms;
        let autoplay = resume_prompt.is_none();

        let shared = Arc::new(Shared {
            engine: Arc::clone(&engine),
            mirror,
            ui,
            gesture_config,
            preferences,
            session: Mutex::new(session),
            gestures: Mutex::new(Gestures::default()),
            events,
        });

        let listener_id = engine.add_listener(Arc::new(ControllerListener {
            shared: Arc::downgrade(&shared),
        }));

        let controller = Self {
            shared,
            listener_id: Mutex::new(Some(listener_id)),
            released: AtomicBool::new(false),
        };

        engine.set_queue(queue, start_index, start_position_ms)?;
        if controller.shared.preferences.save_playback_speed {
            engine.set_playback_speed(controller.shared.preferences.playback_speed_factor());
        }
        engine.prepare()?;
        engine.set_play_when_ready(autoplay);

        log::info!(
            "player opened at item {} position {}ms",
            start_index,
            start_position_ms
        );

        Ok((controller, receiver))
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    /// Mirrored engine state
    pub fn state(&self) -> &PlayerState {
        self.shared.mirror.state()
    }

    pub fn ui_state(&self) -> PlayerUiState {
        self.shared.ui.get()
    }

    pub fn subscribe_ui(&self) -> watch::Receiver<PlayerUiState> {
        self.shared.ui.subscribe()
    }

    pub fn session(&self) -> PlayerSession {
        lock(&self.shared.session).clone()
    }

    fn engine(&self) -> &dyn PlaybackEngine {
        self.shared.engine.as_ref()
    }

    fn is_locked(&self) -> bool {
        self.shared.ui.get().is_locked
    }

    // ------------------------------------------------------------------
    // Taps and buttons
    // ------------------------------------------------------------------

    /// Single tap: show or hide the controller
    pub fn on_tap(&self) {
        let mut visible = false;
        self.shared.ui.update(|ui| {
            ui.is_controller_visible = !ui.is_controller_visible;
            visible = ui.is_controller_visible;
        });
        lock(&self.shared.gestures).controller_shown_at = visible.then(Instant::now);
    }

    /// Double tap: play or pause
    pub fn on_double_tap(&self) {
        if self.is_locked() {
            return;
        }
        self.toggle_play_pause();
    }

    pub fn toggle_play_pause(&self) {
        let play_when_ready = self.engine().play_when_ready();
        self.engine().set_play_when_ready(!play_when_ready);
    }

    pub fn toggle_lock(&self) {
        self.shared.ui.update(|ui| ui.is_locked = !ui.is_locked);
    }

    /// Switch to the next aspect-ratio mode and emit it for persistence
    pub fn cycle_aspect_ratio(&self) -> AspectRatio {
        let mut next = AspectRatio::FitScreen;
        self.shared.ui.update(|ui| {
            ui.aspect_ratio = ui.aspect_ratio.next();
            next = ui.aspect_ratio;
        });
        self.shared.emit(PlayerEvent::SaveAspectRatio(next));
        next
    }

    pub fn seek_to_next(&self) {
        let index = self.engine().current_index();
        if index + 1 < self.engine().item_count() {
            self.engine().seek_to_item(index + 1, 0);
        }
    }

    pub fn seek_to_previous(&self) {
        let index = self.engine().current_index();
        if index == 0 || self.engine().current_position_ms() > PREVIOUS_ITEM_THRESHOLD_MS {
            self.engine().seek_to(0);
        } else {
            self.engine().seek_to_item(index - 1, 0);
        }
    }

    /// Playback speed in percent
    pub fn set_playback_speed(&self, percent: u32) {
        let percent = percent.clamp(25, 400);
        self.engine().set_playback_speed(percent as f32 / 100.0);
        self.shared.emit(PlayerEvent::SavePlaybackSpeed(percent));
    }

    /// Answer the resume prompt: `true` jumps to the saved position
    pub fn answer_resume_prompt(&self, resume: bool) {
        let mut prompt = None;
        self.shared.ui.update(|ui| prompt = ui.resume_prompt.take());

        if let Some(prompt) = prompt {
            if resume {
                self.engine()
                    .seek_to_item(prompt.media_item_index, prompt.position_ms);
            }
            self.engine().set_play_when_ready(true);
        }
    }

    // ------------------------------------------------------------------
    // Seek bar
    // ------------------------------------------------------------------

    pub fn begin_scrub(&self) {
        lock(&self.shared.gestures).scrubbing = true;
    }

    /// Seek from the seek bar
    pub fn scrub_to(&self, position_ms: u64) {
        let current = self.engine().current_position_ms();
        if position_ms.abs_diff(current) <= MIN_SCRUB_DISTANCE_MS {
            return;
        }

        let parameters = if self.shared.preferences.fast_seeking {
            SeekParameters::ClosestSync
        } else {
            SeekParameters::Exact
        };
        self.engine().set_seek_parameters(parameters);
        self.engine().seek_to(position_ms);
        self.shared.ui.update(|ui| ui.position_ms = position_ms);
    }

    pub fn end_scrub(&self) {
        let mut gestures = lock(&self.shared.gestures);
        gestures.scrubbing = false;
        gestures.controller_shown_at = Some(Instant::now());
    }

    // ------------------------------------------------------------------
    // Horizontal drag: seek
    // ------------------------------------------------------------------

    pub fn begin_seek_drag(&self, x: f32) {
        if self.is_locked() {
            return;
        }

        let play_when_ready = self.engine().play_when_ready();
        let drag = SeekDrag::begin(
            x,
            self.engine().current_position_ms(),
            self.engine().duration_ms(),
            play_when_ready,
        );
        lock(&self.shared.gestures).seek = Some(drag);

        self.engine().set_play_when_ready(false);
        self.shared.ui.update(|ui| ui.is_seek_bar_visible = true);
    }

    pub fn seek_drag(&self, x: f32) {
        let target = {
            let mut gestures = lock(&self.shared.gestures);
            match gestures.seek.as_mut() {
                Some(drag) => drag.update(x, &self.shared.gesture_config),
                None => None,
            }
        };

        if let Some(position_ms) = target {
            self.engine().set_seek_parameters(self.shared.seek_parameters());
            self.engine().seek_to(position_ms);
            self.shared.ui.update(|ui| ui.position_ms = position_ms);
        }
    }

    pub fn end_seek_drag(&self) {
        let drag = lock(&self.shared.gestures).seek.take();
        if let Some(drag) = drag {
            self.engine().set_play_when_ready(drag.end());
            self.shared.ui.update(|ui| ui.is_seek_bar_visible = false);
        }
    }

    // ------------------------------------------------------------------
    // Vertical drag: brightness / volume
    // ------------------------------------------------------------------

    pub fn begin_level_drag(&self, x: f32, y: f32) {
        if self.is_locked() {
            return;
        }

        let drag = LevelDrag::begin(x, y, &self.shared.gesture_config);
        let bar = drag.bar();
        lock(&self.shared.gestures).level = Some(drag);
        self.shared.ui.update(|ui| ui.active_bar = Some(bar));
    }

    pub fn level_drag(&self, y: f32) {
        let step = {
            let mut gestures = lock(&self.shared.gestures);
            gestures.level.as_mut().and_then(|drag| {
                drag.update(y, &self.shared.gesture_config)
                    .map(|step| (drag.bar(), step))
            })
        };

        if let Some((bar, step)) = step {
            self.adjust_level(bar, step);
        }
    }

    pub fn end_level_drag(&self) {
        lock(&self.shared.gestures).level = None;
        self.shared.ui.update(|ui| ui.active_bar = None);
    }

    pub fn volume_up(&self) {
        self.adjust_level(LevelBar::Volume, LevelStep::Increase);
    }

    pub fn volume_down(&self) {
        self.adjust_level(LevelBar::Volume, LevelStep::Decrease);
    }

    fn adjust_level(&self, bar: LevelBar, step: LevelStep) {
        let mut volume = None;
        self.shared.ui.update(|ui| match bar {
            LevelBar::Brightness => {
                ui.brightness_level = step.apply(ui.brightness_level, ui.max_level)
            }
            LevelBar::Volume => {
                ui.volume_level = step.apply(ui.volume_level, ui.max_level);
                volume = Some(ui.volume_fraction());
            }
        });

        if let Some(volume) = volume {
            self.engine().set_volume(volume);
        }
    }

    // ------------------------------------------------------------------
    // Tracks
    // ------------------------------------------------------------------

    pub fn track_options(&self, kind: TrackKind) -> Vec<TrackOption> {
        track_options(&self.engine().track_groups(), track_type_for(kind))
    }

    /// Apply the user's track choice; `None` turns the track type off
    pub fn select_track(&self, kind: TrackKind, format_id: Option<&str>) -> AppResult<()> {
        let track_type = track_type_for(kind);
        match format_id {
            Some(id) => self.engine().override_track(track_type, id)?,
            None => self.engine().disable_track(track_type)?,
        }

        let index = self.engine().current_index();
        let path = {
            let mut session = lock(&self.shared.session);
            match session.item_mut(index) {
                Some(item) => {
                    item.set_track_id(kind, format_id.map(str::to_string));
                    item.path.clone()
                }
                None => None,
            }
        };

        if let Some(path) = path {
            self.shared.emit(PlayerEvent::SaveTrack {
                path,
                kind,
                format_id: format_id.map(str::to_string),
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Clock and lifecycle
    // ------------------------------------------------------------------

    /// Periodic refresh: position readout and controller auto-hide
    pub fn tick(&self, now: Instant) {
        let position_ms = self.engine().current_position_ms();
        let duration_ms = self.engine().duration_ms();

        let hide = {
            let gestures = lock(&self.shared.gestures);
            !gestures.scrubbing
                && gestures
                    .controller_shown_at
                    .map(|shown| now.saturating_duration_since(shown) >= CONTROLLER_TIMEOUT)
                    .unwrap_or(false)
        };
        if hide {
            lock(&self.shared.gestures).controller_shown_at = None;
        }

        self.shared.ui.update(|ui| {
            ui.position_ms = position_ms;
            ui.duration_ms = duration_ms;
            if hide {
                ui.is_controller_visible = false;
            }
        });
    }

    /// The screen went to the background: snapshot and pause
    pub fn on_pause(&self) -> PersistableState {
        let brightness = self.shared.ui.get().brightness_level;
        let state = pause_snapshot(self.engine(), brightness);

        lock(&self.shared.gestures).paused_state = Some(state);
        self.shared.save_item_state(state);
        self.engine().set_play_when_ready(false);
        state
    }

    /// The screen came back: unlock and restore play-when-ready
    pub fn on_resume(&self) {
        self.shared.ui.update(|ui| ui.is_locked = false);

        let paused = lock(&self.shared.gestures).paused_state.take();
        if let Some(state) = paused {
            if state.play_when_ready {
                self.engine().set_play_when_ready(true);
            }
        }
    }

    /// Detach listeners, dispose the mirror and release the engine. Idempotent.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }

        let id = lock(&self.listener_id).take();
        if let Some(id) = id {
            self.engine().remove_listener(id);
        }
        self.shared.mirror.dispose();
        self.engine().release();
        log::info!("player released");
    }
}

impl Drop for PlayerController {
    fn drop(&mut self) {
        self.release();
    }
}
