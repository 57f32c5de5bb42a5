use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::domain::media::MediaItem;

/// A directory on disk that contains at least one scanned video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    pub id: Uuid,

    /// Absolute path of the directory
    pub path: PathBuf,

    /// Display name (last path component)
    pub name: String,

    pub created_at: DateTime<Utc>,
}

impl Folder {
    pub fn new(path: PathBuf) -> Self {
        let name = folder_name(&path);
        Self {
            id: Uuid::new_v4(),
            path,
            name,
            created_at: Utc::now(),
        }
    }
}

/// Folder joined with the media items it owns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderWithMedia {
    pub folder: Folder,
    pub media: Vec<MediaItem>,
}

impl FolderWithMedia {
    /// Sum of the known durations of the contained media
    pub fn total_duration_ms(&self) -> u64 {
        self.media.iter().filter_map(|m| m.duration_ms).sum()
    }
}

fn folder_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}
