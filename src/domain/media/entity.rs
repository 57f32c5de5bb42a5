use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A video file known to the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: Uuid,

    /// Owning folder (parent directory)
    pub folder_id: Uuid,

    /// Absolute path, unique across the catalog
    pub path: PathBuf,

    pub title: String,

    /// Duration in milliseconds, `None` until probed
    pub duration_ms: Option<u64>,

    /// File size in bytes
    pub size: u64,

    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,

    pub thumbnail_path: Option<PathBuf>,

    /// Resume point in milliseconds
    pub last_played_position_ms: u64,

    /// Format identifiers of the tracks the user picked last time
    pub audio_track_id: Option<String>,
    pub subtitle_track_id: Option<String>,

    /// Filesystem modification time, used to detect changed files on rescan
    pub modified_at: DateTime<Utc>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Metadata extracted from a file by a [`crate::services::MediaProbe`]
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    pub path: PathBuf,
    pub title: String,
    pub size: u64,
    pub duration_ms: Option<u64>,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub thumbnail_path: Option<PathBuf>,
    pub modified_at: DateTime<Utc>,
}

impl MediaItem {
    pub fn new(folder_id: Uuid, info: MediaInfo) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            folder_id,
            path: info.path,
            title: info.title,
            duration_ms: info.duration_ms,
            size: info.size,
            width: info.width,
            height: info.height,
            frame_rate: info.frame_rate,
            thumbnail_path: info.thumbnail_path,
            last_played_position_ms: 0,
            audio_track_id: None,
            subtitle_track_id: None,
            modified_at: info.modified_at,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the file likely changed based on size and mtime
    pub fn has_changed(&self, size: u64, modified_at: DateTime<Utc>) -> bool {
        self.size != size || self.modified_at != modified_at
    }

    /// Refresh probed metadata, keeping the resume point and track choices
    pub fn update_metadata(&mut self, info: MediaInfo) {
        self.title = info.title;
        self.duration_ms = info.duration_ms;
        self.size = info.size;
        self.width = info.width;
        self.height = info.height;
        self.frame_rate = info.frame_rate;
        self.thumbnail_path = info.thumbnail_path;
        self.modified_at = info.modified_at;
        // A shorter replacement file must not leave the resume point past its end
        self.last_played_position_ms = self.clamp_position(self.last_played_position_ms);
        self.updated_at = Utc::now();
    }

    /// Store a resume point, clamped into `[0, duration]` when the duration is known
    pub fn set_last_played_position(&mut self, position_ms: u64) {
        self.last_played_position_ms = self.clamp_position(position_ms);
        self.updated_at = Utc::now();
    }

    pub fn clamp_position(&self, position_ms: u64) -> u64 {
        match self.duration_ms {
            Some(duration) => position_ms.min(duration),
            None => position_ms,
        }
    }

    pub fn set_track(&mut self, kind: TrackKind, format_id: Option<String>) {
        match kind {
            TrackKind::Audio => self.audio_track_id = format_id,
            TrackKind::Subtitle => self.subtitle_track_id = format_id,
        }
        self.updated_at = Utc::now();
    }

    /// Whether the file or one of its parent directories (below `root`) is hidden
    pub fn is_hidden_below(&self, root: &Path) -> bool {
        is_hidden_path(&self.path, root)
    }
}

/// Which remembered track a choice applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Audio,
    Subtitle,
}

/// A path is hidden when any component after `root` starts with a dot
pub fn is_hidden_path(path: &Path, root: &Path) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Subtitle => write!(f, "subtitle"),
        }
    }
}
