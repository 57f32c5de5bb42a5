// src/application/state.rs
//
// Application wiring
//
// Builds the catalog, the preference stores and the services once, from the
// configuration. Screens borrow what they need from here.

use std::sync::Arc;

use crate::config::Config;
use crate::db::{
    create_connection_pool, get_connection, initialize_database, ConnectionPool,
    InvalidationTracker,
};
use crate::error::AppResult;
use crate::events::{DirectoryScanned, EventBus, PlaybackErrorOccurred};
use crate::infrastructure::open_preference_stores;
use crate::repositories::{
    FolderRepository, MediaRepository, SqliteFolderRepository, SqliteMediaRepository,
};
use crate::services::{
    FfprobeProbe, LibraryService, PlaybackService, PreferencesService, ScanService,
};

use super::media_screen::MediaScreenViewModel;
use super::settings::{InterfaceSettingsViewModel, PlayerSettingsViewModel};

/// Shared application state.
/// All fields are Arc-wrapped for thread-safe sharing across screens.
pub struct AppState {
    pub config: Config,
    pub pool: Arc<ConnectionPool>,
    pub event_bus: Arc<EventBus>,
    pub library_service: Arc<LibraryService>,
    pub scan_service: Arc<ScanService>,
    pub preferences_service: Arc<PreferencesService>,
    pub playback_service: Arc<PlaybackService>,
}

impl AppState {
    /// Open the catalog at the configured path and wire everything to it
    pub fn new(config: Config) -> AppResult<Self> {
        let pool = Arc::new(create_connection_pool(&config.storage.database_path()?)?);
        Self::with_pool(config, pool)
    }

    pub fn with_pool(config: Config, pool: Arc<ConnectionPool>) -> AppResult<Self> {
        config.validate()?;

        // Schema is idempotent
        {
            let conn = get_connection(&pool)?;
            initialize_database(&conn)?;
        }

        // 1. INFRASTRUCTURE
        let event_bus = Arc::new(EventBus::new());
        subscribe_logging(&event_bus);
        let tracker = InvalidationTracker::new();
        let preferences_dir = config.storage.preferences_dir()?;
        let (interface_store, player_store) = open_preference_stores(&preferences_dir);
        let interface_store = Arc::new(interface_store);

        // 2. REPOSITORIES
        let folder_repo: Arc<dyn FolderRepository> =
            Arc::new(SqliteFolderRepository::new(pool.clone(), tracker.clone()));
        let media_repo: Arc<dyn MediaRepository> =
            Arc::new(SqliteMediaRepository::new(pool.clone(), tracker));

        // 3. SERVICES
        let library_service = Arc::new(LibraryService::new(
            folder_repo.clone(),
            media_repo.clone(),
            interface_store.clone(),
            config.library.roots.clone(),
        ));
        let scan_service = Arc::new(ScanService::new(
            folder_repo,
            media_repo.clone(),
            Arc::new(FfprobeProbe::new(config.library.ffprobe_binary.clone())),
            event_bus.clone(),
        ));
        let preferences_service = Arc::new(PreferencesService::new(
            interface_store,
            Arc::new(player_store),
            event_bus.clone(),
        ));
        let playback_service = Arc::new(PlaybackService::new(
            media_repo,
            preferences_service.clone(),
            event_bus.clone(),
        ));

        log::info!(
            "application state ready ({} library roots, preferences in {:?})",
            config.library.roots.len(),
            preferences_dir
        );

        Ok(Self {
            config,
            pool,
            event_bus,
            library_service,
            scan_service,
            preferences_service,
            playback_service,
        })
    }

    /// Media screen view-model; syncs on open when configured to
    pub fn media_screen(&self) -> AppResult<MediaScreenViewModel> {
        MediaScreenViewModel::new(
            &self.library_service,
            &self.preferences_service,
            self.scan_service.clone(),
            self.config.library.scan_on_start,
        )
    }

    pub fn interface_settings(&self) -> InterfaceSettingsViewModel {
        InterfaceSettingsViewModel::new(self.preferences_service.clone())
    }

    pub fn player_settings(&self) -> PlayerSettingsViewModel {
        PlayerSettingsViewModel::new(self.preferences_service.clone())
    }
}

/// Surface scan results and playback failures in the application log
fn subscribe_logging(event_bus: &EventBus) {
    event_bus.subscribe::<PlaybackErrorOccurred, _>(|event| match &event.path {
        Some(path) => log::error!("playback of {:?} failed: {}", path, event.message),
        None => log::error!("playback failed: {}", event.message),
    });

    event_bus.subscribe::<DirectoryScanned, _>(|event| {
        log::info!(
            "scanned {:?}: {} videos, {} updated, {} removed",
            event.directory_path,
            event.files_found,
            event.files_updated,
            event.files_removed
        );
    });
}
