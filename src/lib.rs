// src/lib.rs
// NextPlayer - Local video player core
//
// Architecture:
// - Catalog: folders and media items in SQLite, observed through live queries
// - Preferences: two JSON documents behind watch channels
// - Player: a controller over the `PlaybackEngine` trait, with mirrored state
// - Application: view-models a UI shell drives
// - Explicit: No implicit behavior, no magic

// ============================================================================
// FOUNDATION
// ============================================================================

pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod events;
pub mod infrastructure;
pub mod repositories;
pub mod services;

// ============================================================================
// PLAYER + APPLICATION LAYER
// ============================================================================

pub mod application;
pub mod integrations;
pub mod player;

// ============================================================================
// PUBLIC API - Configuration
// ============================================================================

pub use config::{Config, DisplayConfig, LibraryConfig, MpvConfig, StorageConfig};

// ============================================================================
// PUBLIC API - Domain Entities
// ============================================================================

pub use domain::{
    validate_folder,
    validate_media,
    AspectRatio,
    DomainError,
    // Folder
    Folder,
    FolderWithMedia,
    // Preferences
    InterfacePreferences,
    MediaInfo,
    // Media
    MediaItem,
    PlayerPreferences,
    Resume,
    SortBy,
    SortOrder,
    Theme,
    TrackKind,
};

// ============================================================================
// PUBLIC API - Error Types
// ============================================================================

pub use error::{AppError, AppResult};

// ============================================================================
// PUBLIC API - Events
// ============================================================================

pub use events::{
    create_event_bus,
    DirectoryScanned,
    DomainEvent,
    EventBus,
    EventLogEntry,
    InterfacePreferencesUpdated,
    MediaItemDiscovered,
    MediaItemRemoved,
    PlaybackErrorOccurred,
    PlaybackStateSaved,
    PlayerPreferencesUpdated,
    TrackSelectionSaved,
};

// ============================================================================
// PUBLIC API - Database
// ============================================================================

pub use db::{
    create_connection_pool, initialize_database, ConnectionPool, InvalidationTracker, LiveQuery,
    Table,
};

// ============================================================================
// PUBLIC API - Repositories
// ============================================================================

pub use repositories::{
    FolderRepository, MediaRepository, SqliteFolderRepository, SqliteMediaRepository,
};

// ============================================================================
// PUBLIC API - Infrastructure
// ============================================================================

pub use infrastructure::{
    open_preference_stores, InterfacePreferencesStore, PlayerPreferencesStore, PreferencesStore,
};

// ============================================================================
// PUBLIC API - Services
// ============================================================================

pub use services::{
    // Library
    LibraryService,
    // Scanning
    FfprobeProbe,
    MediaProbe,
    // Playback
    PlaybackService,
    // Preferences
    PreferencesService,
    ScanService,
    ScanSummary,
    SortedStream,
};

// ============================================================================
// PUBLIC API - Player
// ============================================================================

pub use player::{
    EngineEvent, GestureConfig, PlaybackEngine, PlayerController, PlayerEvent, PlayerInput,
    PlayerSession, PlayerState, PlayerStateMirror, PlayerUiState,
};

// ============================================================================
// PUBLIC API - Application Layer
// ============================================================================

pub use application::{
    AppState, FolderUiState, InterfaceSettingsViewModel, MediaScreenViewModel, MediaUiState,
    PlayerSettingsViewModel, SyncState,
};

#[cfg(unix)]
pub use integrations::MpvEngine;
