// src/player/session.rs
//
// What the player was asked to open, resolved into an engine queue

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::engine::QueueItem;
use crate::domain::{MediaItem, TrackKind};

/// Entry point of the player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerInput {
    /// A local file, possibly known to the catalog
    FilePath(PathBuf),
    /// An opaque locator handed over by another application
    ContentLocator(String),
}

/// One queue entry plus what the player remembers about it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionItem {
    pub queue_item: QueueItem,
    /// Catalog path; `None` for ad-hoc items, which are never persisted
    pub path: Option<PathBuf>,
    pub duration_ms: Option<u64>,
    pub last_played_position_ms: u64,
    pub audio_track_id: Option<String>,
    pub subtitle_track_id: Option<String>,
}

impl SessionItem {
    pub fn from_media(media: &MediaItem) -> Self {
        Self {
            queue_item: QueueItem {
                uri: media.path.to_string_lossy().to_string(),
                title: media.title.clone(),
            },
            path: Some(media.path.clone()),
            duration_ms: media.duration_ms,
            last_played_position_ms: media.last_played_position_ms,
            audio_track_id: media.audio_track_id.clone(),
            subtitle_track_id: media.subtitle_track_id.clone(),
        }
    }

    /// An item outside the catalog
    pub fn ad_hoc(uri: String, title: String) -> Self {
        Self {
            queue_item: QueueItem { uri, title },
            path: None,
            duration_ms: None,
            last_played_position_ms: 0,
            audio_track_id: None,
            subtitle_track_id: None,
        }
    }

    pub fn is_persistable(&self) -> bool {
        self.path.is_some()
    }

    pub fn track_id(&self, kind: TrackKind) -> Option<&str> {
        match kind {
            TrackKind::Audio => self.audio_track_id.as_deref(),
            TrackKind::Subtitle => self.subtitle_track_id.as_deref(),
        }
    }

    pub fn set_track_id(&mut self, kind: TrackKind, format_id: Option<String>) {
        match kind {
            TrackKind::Audio => self.audio_track_id = format_id,
            TrackKind::Subtitle => self.subtitle_track_id = format_id,
        }
    }
}

/// A resolved playback request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSession {
    pub items: Vec<SessionItem>,
    pub start_index: usize,
    pub start_position_ms: u64,
    /// Saved position the user should be asked about before resuming
    pub resume_prompt: Option<u64>,
}

impl PlayerSession {
    pub fn single(item: SessionItem) -> Self {
        Self {
            items: vec![item],
            start_index: 0,
            start_position_ms: 0,
            resume_prompt: None,
        }
    }

    pub fn queue(&self) -> Vec<QueueItem> {
        self.items.iter().map(|i| i.queue_item.clone()).collect()
    }

    pub fn item(&self, index: usize) -> Option<&SessionItem> {
        self.items.get(index)
    }

    pub fn item_mut(&mut self, index: usize) -> Option<&mut SessionItem> {
        self.items.get_mut(index)
    }

    pub fn index_of(&self, path: &Path) -> Option<usize> {
        self.items
            .iter()
            .position(|i| i.path.as_deref() == Some(path))
    }
}
