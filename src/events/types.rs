// src/events/types.rs
//
// All domain events in the system.
// Each event represents an immutable fact that has already occurred.
//
// RULES:
// - Events are facts, not commands
// - Events carry only the data needed to react
// - No business logic in event types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::domain::{InterfacePreferences, PlayerPreferences, TrackKind};

/// Trait that all domain events must implement
pub trait DomainEvent: std::fmt::Debug + Clone {
    /// Unique identifier for this event instance
    fn event_id(&self) -> Uuid;

    /// When this event occurred
    fn occurred_at(&self) -> DateTime<Utc>;

    /// Human-readable event type name
    fn event_type(&self) -> &'static str;
}

// ============================================================================
// LIBRARY SCANNING EVENTS
// ============================================================================

/// Emitted when a library root has been scanned
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryScanned {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub directory_path: PathBuf,
    pub files_found: usize,
    pub files_updated: usize,
    pub files_removed: usize,
}

impl DirectoryScanned {
    pub fn new(
        directory_path: PathBuf,
        files_found: usize,
        files_updated: usize,
        files_removed: usize,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            directory_path,
            files_found,
            files_updated,
            files_removed,
        }
    }
}

impl DomainEvent for DirectoryScanned {
    fn event_id(&self) -> Uuid { self.event_id }
    fn occurred_at(&self) -> DateTime<Utc> { self.occurred_at }
    fn event_type(&self) -> &'static str { "DirectoryScanned" }
}

/// Emitted for each video newly added to the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItemDiscovered {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub media_id: Uuid,
    pub path: PathBuf,
}

impl MediaItemDiscovered {
    pub fn new(media_id: Uuid, path: PathBuf) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            media_id,
            path,
        }
    }
}

impl DomainEvent for MediaItemDiscovered {
    fn event_id(&self) -> Uuid { self.event_id }
    fn occurred_at(&self) -> DateTime<Utc> { self.occurred_at }
    fn event_type(&self) -> &'static str { "MediaItemDiscovered" }
}

/// Emitted when a video disappeared from disk and left the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItemRemoved {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub media_id: Uuid,
    pub path: PathBuf,
}

impl MediaItemRemoved {
    pub fn new(media_id: Uuid, path: PathBuf) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            media_id,
            path,
        }
    }
}

impl DomainEvent for MediaItemRemoved {
    fn event_id(&self) -> Uuid { self.event_id }
    fn occurred_at(&self) -> DateTime<Utc> { self.occurred_at }
    fn event_type(&self) -> &'static str { "MediaItemRemoved" }
}

// ============================================================================
// PLAYBACK EVENTS
// ============================================================================

/// Emitted when a resume point was written back to the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackStateSaved {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub path: PathBuf,
    pub position_ms: u64,
}

impl PlaybackStateSaved {
    pub fn new(path: PathBuf, position_ms: u64) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            path,
            position_ms,
        }
    }
}

impl DomainEvent for PlaybackStateSaved {
    fn event_id(&self) -> Uuid { self.event_id }
    fn occurred_at(&self) -> DateTime<Utc> { self.occurred_at }
    fn event_type(&self) -> &'static str { "PlaybackStateSaved" }
}

/// Emitted when the user's audio or subtitle choice was remembered
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackSelectionSaved {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub path: PathBuf,
    pub kind: TrackKind,
    pub format_id: Option<String>,
}

impl TrackSelectionSaved {
    pub fn new(path: PathBuf, kind: TrackKind, format_id: Option<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            path,
            kind,
            format_id,
        }
    }
}

impl DomainEvent for TrackSelectionSaved {
    fn event_id(&self) -> Uuid { self.event_id }
    fn occurred_at(&self) -> DateTime<Utc> { self.occurred_at }
    fn event_type(&self) -> &'static str { "TrackSelectionSaved" }
}

/// Emitted when the engine reported a playback error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackErrorOccurred {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub path: Option<PathBuf>,
    pub message: String,
}

impl PlaybackErrorOccurred {
    pub fn new(path: Option<PathBuf>, message: String) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            path,
            message,
        }
    }
}

impl DomainEvent for PlaybackErrorOccurred {
    fn event_id(&self) -> Uuid { self.event_id }
    fn occurred_at(&self) -> DateTime<Utc> { self.occurred_at }
    fn event_type(&self) -> &'static str { "PlaybackErrorOccurred" }
}

// ============================================================================
// PREFERENCES EVENTS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfacePreferencesUpdated {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub preferences: InterfacePreferences,
}

impl InterfacePreferencesUpdated {
    pub fn new(preferences: InterfacePreferences) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            preferences,
        }
    }
}

impl DomainEvent for InterfacePreferencesUpdated {
    fn event_id(&self) -> Uuid { self.event_id }
    fn occurred_at(&self) -> DateTime<Utc> { self.occurred_at }
    fn event_type(&self) -> &'static str { "InterfacePreferencesUpdated" }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerPreferencesUpdated {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub preferences: PlayerPreferences,
}

impl PlayerPreferencesUpdated {
    pub fn new(preferences: PlayerPreferences) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            preferences,
        }
    }
}

impl DomainEvent for PlayerPreferencesUpdated {
    fn event_id(&self) -> Uuid { self.event_id }
    fn occurred_at(&self) -> DateTime<Utc> { self.occurred_at }
    fn event_type(&self) -> &'static str { "PlayerPreferencesUpdated" }
}
