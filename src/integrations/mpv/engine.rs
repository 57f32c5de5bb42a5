// src/integrations/mpv/engine.rs
//
// `PlaybackEngine` over an external mpv process
//
// A background pump polls mpv, diffs consecutive snapshots and dispatches the
// resulting notifications to listeners.
//
// RULES:
// - The snapshot lock is never held while listeners run
// - Listeners may call back into the engine from inside a notification
// - The pump stops on release, on drop, or when mpv exits

use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::client::MpvClient;
use super::properties::{diff, MpvSnapshot, POLLED_PROPERTIES};
use crate::config::MpvConfig;
use crate::error::{AppError, AppResult};
use crate::player::engine::{
    EngineEvent, EngineListener, Format, ListenerId, ListenerRegistry, PlaybackEngine,
    PlaybackError, PlaybackState, QueueItem, SeekParameters, TrackGroup, TrackType, VideoSize,
};

struct EngineState {
    snapshot: MpvSnapshot,
    queue: Vec<QueueItem>,
    play_when_ready: bool,
    seek_parameters: Option<SeekParameters>,
    /// Position to seek to once the item at `.0` is loaded
    pending_seek: Option<(usize, u64)>,
    /// Item a seek-to-item call asked for, until the pump sees it
    requested_index: Option<usize>,
    first_frame_reported: bool,
    process_lost: bool,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            // Nothing polled yet: unit speed and full volume, like a fresh mpv
            snapshot: MpvSnapshot::from_properties(std::iter::empty::<(&str, Option<Value>)>()),
            queue: Vec::new(),
            play_when_ready: false,
            seek_parameters: None,
            pending_seek: None,
            requested_index: None,
            first_frame_reported: false,
            process_lost: false,
        }
    }
}

struct Inner {
    client: MpvClient,
    listeners: ListenerRegistry,
    state: Mutex<EngineState>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn dispatch(&self, events: Vec<EngineEvent>) {
        for event in &events {
            self.listeners.dispatch(event);
        }
    }

    /// One pump iteration. Returns `false` when the pump should stop.
    fn poll(&self) -> bool {
        if !self.client.is_running() {
            let first_loss = {
                let mut state = self.state();
                !std::mem::replace(&mut state.process_lost, true)
            };
            if first_loss {
                log::warn!("mpv is no longer running");
                self.dispatch(vec![EngineEvent::PlayerErrorChanged(Some(PlaybackError {
                    code: "process_exited".to_string(),
                    message: "mpv exited".to_string(),
                }))]);
            }
            return false;
        }

        let next = MpvSnapshot::from_properties(
            POLLED_PROPERTIES
                .iter()
                .map(|name| (*name, self.client.get_property_opt(name))),
        );

        let (events, pending_seek) = {
            let mut state = self.state();
            if next.index != state.snapshot.index {
                state.first_frame_reported = false;
            }
            let events = diff(
                &state.snapshot,
                &next,
                state.requested_index,
                state.first_frame_reported,
            );
            if events.contains(&EngineEvent::RenderedFirstFrame) {
                state.first_frame_reported = true;
            }
            if next.index.is_some() && next.index == state.requested_index {
                state.requested_index = None;
            }

            let pending_seek = match state.pending_seek {
                Some((index, position_ms))
                    if next.index == Some(index) && next.duration_ms.is_some() =>
                {
                    state.pending_seek = None;
                    Some(position_ms)
                }
                _ => None,
            };

            state.snapshot = next;
            (events, pending_seek)
        };

        if let Some(position_ms) = pending_seek {
            if let Err(e) = self.seek(position_ms) {
                log::warn!("deferred seek failed: {}", e);
            }
        }

        self.dispatch(events);
        true
    }

    fn seek(&self, position_ms: u64) -> AppResult<()> {
        let mode = match self.state().seek_parameters {
            Some(SeekParameters::Exact) => "absolute+exact",
            Some(_) => "absolute+keyframes",
            None => "absolute",
        };
        self.client.command(&[
            Value::from("seek"),
            Value::from(position_ms as f64 / 1000.0),
            Value::from(mode),
        ])?;
        Ok(())
    }
}

pub struct MpvEngine {
    inner: Arc<Inner>,
    poll_interval: Duration,
    cancel: CancellationToken,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl MpvEngine {
    pub fn new(config: &MpvConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                client: MpvClient::new(config),
                listeners: ListenerRegistry::new(),
                state: Mutex::new(EngineState::default()),
            }),
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            cancel: CancellationToken::new(),
            pump: Mutex::new(None),
        }
    }

    fn start_pump(&self) -> AppResult<()> {
        let mut pump = self.pump.lock().unwrap_or_else(|e| e.into_inner());
        if pump.is_some() {
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| AppError::Engine("the mpv event pump needs a tokio runtime".to_string()))?;

        let inner = Arc::clone(&self.inner);
        let cancel = self.cancel.clone();
        let interval = self.poll_interval;

        *pump = Some(runtime.spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }

                let inner = Arc::clone(&inner);
                match tokio::task::spawn_blocking(move || inner.poll()).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => {
                        log::error!("mpv poll task failed: {}", e);
                        break;
                    }
                }
            }
            log::debug!("mpv event pump stopped");
        }));
        Ok(())
    }

    fn stop_pump(&self) {
        self.cancel.cancel();
        if let Some(task) = self.pump.lock().unwrap_or_else(|e| e.into_inner()).take() {
            task.abort();
        }
    }

    fn set_property(&self, name: &str, value: Value) {
        if let Err(e) = self.inner.client.set_property(name, value) {
            log::warn!("mpv set {} failed: {}", name, e);
        }
    }

    fn snapshot(&self) -> MpvSnapshot {
        self.inner.state().snapshot.clone()
    }
}

fn track_property(track_type: TrackType) -> &'static str {
    match track_type {
        TrackType::Video => "vid",
        TrackType::Audio => "aid",
        TrackType::Text => "sid",
    }
}

impl PlaybackEngine for MpvEngine {
    fn add_listener(&self, listener: Arc<dyn EngineListener>) -> ListenerId {
        self.inner.listeners.add(listener)
    }

    fn remove_listener(&self, id: ListenerId) {
        self.inner.listeners.remove(id);
    }

    fn set_queue(
        &self,
        items: Vec<QueueItem>,
        start_index: usize,
        start_position_ms: u64,
    ) -> AppResult<()> {
        if start_index >= items.len() {
            return Err(AppError::Engine(format!(
                "start index {} outside a queue of {}",
                start_index,
                items.len()
            )));
        }

        let mut state = self.inner.state();
        state.queue = items;
        state.pending_seek = (start_position_ms > 0).then_some((start_index, start_position_ms));
        state.requested_index = Some(start_index);
        Ok(())
    }

    fn prepare(&self) -> AppResult<()> {
        let (queue, start_index, play_when_ready) = {
            let state = self.inner.state();
            (
                state.queue.clone(),
                state.requested_index.unwrap_or(0),
                state.play_when_ready,
            )
        };

        self.inner.client.launch()?;
        self.inner
            .client
            .set_property("pause", Value::from(!play_when_ready))?;

        for (i, item) in queue.iter().enumerate() {
            let mode = if i == 0 { "replace" } else { "append" };
            self.inner.client.command(&[
                Value::from("loadfile"),
                Value::from(item.uri.as_str()),
                Value::from(mode),
            ])?;
        }
        if start_index > 0 {
            self.inner
                .client
                .set_property("playlist-pos", Value::from(start_index))?;
        }

        self.start_pump()?;
        log::debug!("mpv prepared with {} items", queue.len());
        Ok(())
    }

    fn play_when_ready(&self) -> bool {
        self.inner.state().play_when_ready
    }

    fn set_play_when_ready(&self, play_when_ready: bool) {
        let changed = {
            let mut state = self.inner.state();
            std::mem::replace(&mut state.play_when_ready, play_when_ready) != play_when_ready
        };
        if self.inner.client.is_running() {
            self.set_property("pause", Value::from(!play_when_ready));
        }
        if changed {
            self.inner
                .dispatch(vec![EngineEvent::PlayWhenReadyChanged(play_when_ready)]);
        }
    }

    fn is_playing(&self) -> bool {
        self.snapshot().is_playing()
    }

    fn playback_state(&self) -> PlaybackState {
        self.snapshot().playback_state()
    }

    fn current_index(&self) -> usize {
        self.snapshot().index.unwrap_or(0)
    }

    fn item_count(&self) -> usize {
        self.inner.state().queue.len()
    }

    fn current_position_ms(&self) -> u64 {
        // Fresh read: snapshots lag by up to one poll interval
        self.inner
            .client
            .get_property_opt("time-pos")
            .and_then(|v| v.as_f64())
            .map(|s| (s.max(0.0) * 1000.0).round() as u64)
            .or(self.snapshot().position_ms)
            .unwrap_or(0)
    }

    fn duration_ms(&self) -> Option<u64> {
        self.snapshot().duration_ms
    }

    fn seek_to(&self, position_ms: u64) {
        {
            let mut state = self.inner.state();
            if state.snapshot.duration_ms.is_none() {
                // Nothing loaded yet: mpv would reject the seek
                let index = state
                    .requested_index
                    .or(state.snapshot.index)
                    .unwrap_or(0);
                state.pending_seek = Some((index, position_ms));
                return;
            }
        }
        if let Err(e) = self.inner.seek(position_ms) {
            log::warn!("mpv seek failed: {}", e);
        }
    }

    fn seek_to_item(&self, index: usize, position_ms: u64) {
        if index == self.current_index() {
            self.seek_to(position_ms);
            return;
        }

        {
            let mut state = self.inner.state();
            state.requested_index = Some(index);
            state.pending_seek = (position_ms > 0).then_some((index, position_ms));
        }
        self.set_property("playlist-pos", Value::from(index));
    }

    fn set_seek_parameters(&self, parameters: SeekParameters) {
        self.inner.state().seek_parameters = Some(parameters);
    }

    fn playback_speed(&self) -> f32 {
        self.snapshot().speed
    }

    fn set_playback_speed(&self, speed: f32) {
        self.set_property("speed", Value::from(speed as f64));
    }

    fn volume(&self) -> f32 {
        self.snapshot().volume
    }

    fn set_volume(&self, volume: f32) {
        let percent = (volume.clamp(0.0, 1.0) * 100.0) as f64;
        self.set_property("volume", Value::from(percent));
    }

    fn video_format(&self) -> Option<Format> {
        self.snapshot().video_format()
    }

    fn audio_format(&self) -> Option<Format> {
        self.snapshot().audio_format()
    }

    fn video_size(&self) -> VideoSize {
        self.snapshot().video_size
    }

    fn track_groups(&self) -> Vec<TrackGroup> {
        self.snapshot().groups
    }

    fn override_track(&self, track_type: TrackType, format_id: &str) -> AppResult<()> {
        let id: i64 = format_id
            .parse()
            .map_err(|_| AppError::Engine(format!("not an mpv track id: {}", format_id)))?;
        self.inner
            .client
            .set_property(track_property(track_type), Value::from(id))
    }

    fn disable_track(&self, track_type: TrackType) -> AppResult<()> {
        self.inner
            .client
            .set_property(track_property(track_type), Value::from("no"))
    }

    fn release(&self) {
        self.stop_pump();
        self.inner.listeners.clear();
        self.inner.client.stop();
        log::debug!("mpv engine released");
    }
}

impl Drop for MpvEngine {
    fn drop(&mut self) {
        self.stop_pump();
    }
}
