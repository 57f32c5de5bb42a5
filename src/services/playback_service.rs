// src/services/playback_service.rs
//
// Playback Service - Player Integration
//
// Resolves what the player should open and writes back what it reports.
//
// RULES:
// - A catalog path opens its whole folder as a queue, sorted by title
// - Anything outside the catalog opens as a single ad-hoc item, never persisted
// - Resume points are clamped into [0, duration] by the catalog
// - Brightness and speed are only remembered when the matching preference is on

use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use crate::domain::{AspectRatio, MediaItem, Resume, TrackKind};
use crate::error::AppResult;
use crate::events::{EventBus, PlaybackErrorOccurred, PlaybackStateSaved, TrackSelectionSaved};
use crate::player::{PersistableState, PlayerEvent, PlayerInput, PlayerSession, SessionItem};
use crate::repositories::MediaRepository;
use crate::services::preferences_service::PreferencesService;

pub struct PlaybackService {
    media_repo: Arc<dyn MediaRepository>,
    preferences: Arc<PreferencesService>,
    event_bus: Arc<EventBus>,
}

impl PlaybackService {
    pub fn new(
        media_repo: Arc<dyn MediaRepository>,
        preferences: Arc<PreferencesService>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            media_repo,
            preferences,
            event_bus,
        }
    }

    // ------------------------------------------------------------------
    // Opening
    // ------------------------------------------------------------------

    /// Build the session for a player request
    pub fn open(&self, input: PlayerInput) -> AppResult<PlayerSession> {
        match input {
            PlayerInput::FilePath(path) => match self.media_repo.get_by_path(&path)? {
                Some(media) => self.open_catalog_item(media),
                None => {
                    log::info!("opening {:?} outside the catalog", path);
                    Ok(PlayerSession::single(SessionItem::ad_hoc(
                        path.to_string_lossy().to_string(),
                        title_from_path(&path),
                    )))
                }
            },
            PlayerInput::ContentLocator(locator) => {
                let title = locator
                    .rsplit('/')
                    .find(|segment| !segment.is_empty())
                    .unwrap_or(locator.as_str())
                    .to_string();
                Ok(PlayerSession::single(SessionItem::ad_hoc(locator, title)))
            }
        }
    }

    fn open_catalog_item(&self, media: MediaItem) -> AppResult<PlayerSession> {
        let mut siblings = self.media_repo.list_by_folder(media.folder_id)?;
        siblings.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()));

        let items: Vec<SessionItem> = siblings.iter().map(SessionItem::from_media).collect();
        let start_index = items
            .iter()
            .position(|item| item.path.as_deref() == Some(media.path.as_path()))
            .unwrap_or(0);

        let saved = media.last_played_position_ms;
        let (start_position_ms, resume_prompt) = match self.preferences.player_preferences().resume {
            Resume::Always => (saved, None),
            Resume::Never => (0, None),
            Resume::Ask if saved > 0 => (0, Some(saved)),
            Resume::Ask => (0, None),
        };

        log::debug!(
            "opening {:?} at {} of {} (start {}ms)",
            media.path,
            start_index,
            items.len(),
            start_position_ms
        );

        Ok(PlayerSession {
            items,
            start_index,
            start_position_ms,
            resume_prompt,
        })
    }

    // ------------------------------------------------------------------
    // Write-back
    // ------------------------------------------------------------------

    /// Persist a playback snapshot for the item at `path`
    pub fn save_state(&self, path: &Path, state: PersistableState) -> AppResult<()> {
        if self
            .media_repo
            .update_last_played_position(path, state.position_ms)?
        {
            self.event_bus
                .emit(PlaybackStateSaved::new(path.to_path_buf(), state.position_ms));
        } else {
            log::debug!("no catalog entry for {:?}; resume point dropped", path);
        }

        if let Some(brightness) = state.brightness {
            if self.preferences.player_preferences().save_brightness_level {
                self.preferences.set_brightness_level(brightness)?;
            }
        }
        Ok(())
    }

    pub fn save_track(
        &self,
        path: &Path,
        kind: TrackKind,
        format_id: Option<String>,
    ) -> AppResult<()> {
        if self
            .media_repo
            .update_track(path, kind, format_id.as_deref())?
        {
            self.event_bus.emit(TrackSelectionSaved::new(
                path.to_path_buf(),
                kind,
                format_id,
            ));
        }
        Ok(())
    }

    /// Store a duration the engine measured for an item scanned without one
    pub fn save_duration(&self, path: &Path, duration_ms: u64) -> AppResult<()> {
        if self.media_repo.update_duration(path, duration_ms)? {
            log::debug!("learned duration {}ms for {:?}", duration_ms, path);
        }
        Ok(())
    }

    pub fn save_aspect_ratio(&self, aspect_ratio: AspectRatio) -> AppResult<()> {
        self.preferences.set_aspect_ratio(aspect_ratio)?;
        Ok(())
    }

    /// Speed in percent; ignored unless `save_playback_speed` is on
    pub fn save_playback_speed(&self, percent: u32) -> AppResult<()> {
        if self.preferences.player_preferences().save_playback_speed {
            self.preferences.set_playback_speed(percent)?;
        }
        Ok(())
    }

    pub fn handle_player_event(&self, event: PlayerEvent) -> AppResult<()> {
        match event {
            PlayerEvent::SaveState { path, state } => self.save_state(&path, state),
            PlayerEvent::SaveTrack {
                path,
                kind,
                format_id,
            } => self.save_track(&path, kind, format_id),
            PlayerEvent::SaveDuration { path, duration_ms } => {
                self.save_duration(&path, duration_ms)
            }
            PlayerEvent::SaveAspectRatio(aspect_ratio) => self.save_aspect_ratio(aspect_ratio),
            PlayerEvent::SavePlaybackSpeed(percent) => self.save_playback_speed(percent),
            PlayerEvent::PlaybackError { path, error } => {
                self.event_bus
                    .emit(PlaybackErrorOccurred::new(path, error.to_string()));
                Ok(())
            }
        }
    }

    /// Drain a controller's event stream on the blocking pool until it closes
    pub fn spawn_persistence(
        self: Arc<Self>,
        mut events: UnboundedReceiver<PlayerEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let service = Arc::clone(&self);
                match tokio::task::spawn_blocking(move || service.handle_player_event(event)).await
                {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => log::warn!("failed to persist player event: {}", e),
                    Err(e) => log::error!("persistence task failed: {}", e),
                }
            }
            log::debug!("player event stream closed");
        })
    }
}

fn title_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_memory_pool, initialize_database, InvalidationTracker};
    use crate::domain::{Folder, MediaInfo};
    use crate::infrastructure::open_preference_stores;
    use crate::player::PlaybackError;
    use crate::repositories::{FolderRepository, SqliteFolderRepository, SqliteMediaRepository};
    use chrono::Utc;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        media: Arc<SqliteMediaRepository>,
        folder: Folder,
        preferences: Arc<PreferencesService>,
        bus: Arc<EventBus>,
        service: Arc<PlaybackService>,
    }

    fn setup() -> Fixture {
        let pool = Arc::new(create_memory_pool().unwrap());
        {
            let conn = pool.get().unwrap();
            initialize_database(&conn).unwrap();
        }
        let tracker = InvalidationTracker::new();
        let folders = SqliteFolderRepository::new(Arc::clone(&pool), tracker.clone());
        let media = Arc::new(SqliteMediaRepository::new(pool, tracker));

        let folder = Folder::new(PathBuf::from("/videos/show"));
        folders.save(&folder).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let (interface, player) = open_preference_stores(dir.path());
        let bus = Arc::new(EventBus::new());
        let preferences = Arc::new(PreferencesService::new(
            Arc::new(interface),
            Arc::new(player),
            bus.clone(),
        ));
        let service = Arc::new(PlaybackService::new(
            media.clone(),
            preferences.clone(),
            bus.clone(),
        ));

        Fixture {
            _dir: dir,
            media,
            folder,
            preferences,
            bus,
            service,
        }
    }

    fn add(f: &Fixture, name: &str, last_played_position_ms: u64) -> PathBuf {
        let path = f.folder.path.join(format!("{}.mp4", name));
        let mut item = MediaItem::new(
            f.folder.id,
            MediaInfo {
                path: path.clone(),
                title: name.to_string(),
                size: 1,
                duration_ms: Some(600_000),
                width: 0,
                height: 0,
                frame_rate: 0.0,
                thumbnail_path: None,
                modified_at: Utc::now(),
            },
        );
        item.set_last_played_position(last_played_position_ms);
        f.media.save(&item).unwrap();
        path
    }

    fn snapshot(position_ms: u64, brightness: Option<u32>) -> PersistableState {
        PersistableState {
            media_item_index: 0,
            position_ms,
            play_when_ready: true,
            brightness,
        }
    }

    #[test]
    fn test_catalog_path_opens_folder_queue() {
        let f = setup();
        add(&f, "Episode 2", 0);
        let target = add(&f, "episode 1", 42_000);
        add(&f, "Episode 3", 0);

        let session = f.service.open(PlayerInput::FilePath(target)).unwrap();

        let titles: Vec<&str> = session
            .items
            .iter()
            .map(|i| i.queue_item.title.as_str())
            .collect();
        assert_eq!(titles, vec!["episode 1", "Episode 2", "Episode 3"]);
        assert_eq!(session.start_index, 0);
        assert_eq!(session.start_position_ms, 42_000);
        assert_eq!(session.resume_prompt, None);
    }

    #[test]
    fn test_resume_policies() {
        let f = setup();
        let path = add(&f, "a", 42_000);

        f.preferences.set_resume(Resume::Never).unwrap();
        let session = f.service.open(PlayerInput::FilePath(path.clone())).unwrap();
        assert_eq!((session.start_position_ms, session.resume_prompt), (0, None));

        f.preferences.set_resume(Resume::Ask).unwrap();
        let session = f.service.open(PlayerInput::FilePath(path)).unwrap();
        assert_eq!(
            (session.start_position_ms, session.resume_prompt),
            (0, Some(42_000))
        );
    }

    #[test]
    fn test_ask_without_saved_position_does_not_prompt() {
        let f = setup();
        let path = add(&f, "fresh", 0);
        f.preferences.set_resume(Resume::Ask).unwrap();

        let session = f.service.open(PlayerInput::FilePath(path)).unwrap();

        assert_eq!(session.resume_prompt, None);
    }

    #[test]
    fn test_unknown_inputs_open_ad_hoc() {
        let f = setup();

        let session = f
            .service
            .open(PlayerInput::FilePath(PathBuf::from("/tmp/elsewhere.mkv")))
            .unwrap();
        assert_eq!(session.items.len(), 1);
        assert!(!session.items[0].is_persistable());
        assert_eq!(session.items[0].queue_item.title, "elsewhere");

        let session = f
            .service
            .open(PlayerInput::ContentLocator(
                "content://media/external/video/42".to_string(),
            ))
            .unwrap();
        assert_eq!(session.items[0].queue_item.title, "42");
        assert!(!session.items[0].is_persistable());
    }

    #[test]
    fn test_save_state_clamps_and_remembers_brightness() {
        let f = setup();
        let path = add(&f, "a", 0);

        f.service
            .save_state(&path, snapshot(900_000, Some(20)))
            .unwrap();

        let media = f.media.get_by_path(&path).unwrap().unwrap();
        assert_eq!(media.last_played_position_ms, 600_000);
        assert_eq!(f.preferences.player_preferences().brightness_level, 20);
        assert_eq!(
            f.bus
                .get_event_log()
                .iter()
                .filter(|e| e.event_type == "PlaybackStateSaved")
                .count(),
            1
        );
    }

    #[test]
    fn test_brightness_ignored_when_not_saved() {
        let f = setup();
        let path = add(&f, "a", 0);
        f.preferences.toggle_save_brightness_level().unwrap();

        f.service.save_state(&path, snapshot(1_000, Some(3))).unwrap();

        assert_eq!(f.preferences.player_preferences().brightness_level, 15);
    }

    #[test]
    fn test_speed_saved_only_when_enabled() {
        let f = setup();

        f.service
            .handle_player_event(PlayerEvent::SavePlaybackSpeed(150))
            .unwrap();
        assert_eq!(f.preferences.player_preferences().playback_speed, 100);

        f.preferences.toggle_save_playback_speed().unwrap();
        f.service
            .handle_player_event(PlayerEvent::SavePlaybackSpeed(150))
            .unwrap();
        assert_eq!(f.preferences.player_preferences().playback_speed, 150);
    }

    #[test]
    fn test_engine_duration_fills_the_catalog() {
        let f = setup();
        let path = f.folder.path.join("unprobed.mp4");
        let mut item = MediaItem::new(
            f.folder.id,
            MediaInfo {
                path: path.clone(),
                title: "unprobed".to_string(),
                size: 1,
                duration_ms: None,
                width: 0,
                height: 0,
                frame_rate: 0.0,
                thumbnail_path: None,
                modified_at: Utc::now(),
            },
        );
        item.set_last_played_position(700_000);
        f.media.save(&item).unwrap();

        f.service
            .handle_player_event(PlayerEvent::SaveDuration {
                path: path.clone(),
                duration_ms: 500_000,
            })
            .unwrap();

        let media = f.media.get_by_path(&path).unwrap().unwrap();
        assert_eq!(media.duration_ms, Some(500_000));
        assert_eq!(media.last_played_position_ms, 500_000);
    }

    #[test]
    fn test_track_and_aspect_ratio_events() {
        let f = setup();
        let path = add(&f, "a", 0);

        f.service
            .handle_player_event(PlayerEvent::SaveTrack {
                path: path.clone(),
                kind: TrackKind::Subtitle,
                format_id: Some("s2".to_string()),
            })
            .unwrap();
        f.service
            .handle_player_event(PlayerEvent::SaveAspectRatio(AspectRatio::Crop))
            .unwrap();

        let media = f.media.get_by_path(&path).unwrap().unwrap();
        assert_eq!(media.subtitle_track_id.as_deref(), Some("s2"));
        assert_eq!(
            f.preferences.player_preferences().aspect_ratio,
            AspectRatio::Crop
        );
    }

    #[tokio::test]
    async fn test_persistence_task_drains_events() {
        let f = setup();
        let path = add(&f, "a", 0);
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();

        let handle = Arc::clone(&f.service).spawn_persistence(receiver);
        sender
            .send(PlayerEvent::SaveState {
                path: path.clone(),
                state: snapshot(12_345, None),
            })
            .unwrap();
        sender
            .send(PlayerEvent::PlaybackError {
                path: Some(path.clone()),
                error: PlaybackError {
                    code: "decoding_failed".to_string(),
                    message: "decoder failed".to_string(),
                },
            })
            .unwrap();
        drop(sender);
        handle.await.unwrap();

        let media = f.media.get_by_path(&path).unwrap().unwrap();
        assert_eq!(media.last_played_position_ms, 12_345);
        assert!(f
            .bus
            .get_event_log()
            .iter()
            .any(|e| e.event_type == "PlaybackErrorOccurred"));
    }
}
