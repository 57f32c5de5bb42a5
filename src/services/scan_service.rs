// src/services/scan_service.rs
//
// Library Scan
//
// Walks the library roots and reconciles the catalog with what is on disk.
//
// RULES:
// - One folder row per directory that directly contains a video
// - Unchanged files (same size and mtime) are not probed again
// - Rescans keep resume points and remembered tracks
// - A root that cannot be read is reported as denied and left untouched in the catalog
// - Scans run one at a time; a path already cataloged is never inserted twice

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::domain::{validate_folder, validate_media, Folder, MediaItem};
use crate::error::{AppError, AppResult};
use crate::events::{DirectoryScanned, EventBus, MediaItemDiscovered, MediaItemRemoved};
use crate::repositories::{FolderRepository, MediaRepository};
use crate::services::probe::{modified_at, MediaProbe};

/// Extensions recognised as video files (lowercase)
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "3gp", "avi", "flv", "m2ts", "m4v", "mkv", "mov", "mp4", "mpeg", "mpg", "mts", "ogv", "ts",
    "webm", "wmv",
];

pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| VIDEO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------

/// Outcome of scanning one or more roots
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub discovered: usize,
    pub updated: usize,
    pub removed: usize,
    /// Roots the process is not allowed to read
    pub denied_roots: Vec<PathBuf>,
}

impl ScanSummary {
    pub fn is_permission_denied(&self) -> bool {
        !self.denied_roots.is_empty()
    }

    fn absorb(&mut self, other: ScanSummary) {
        self.discovered += other.discovered;
        self.updated += other.updated;
        self.removed += other.removed;
        self.denied_roots.extend(other.denied_roots);
    }
}

// ---------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------

pub struct ScanService {
    folder_repo: Arc<dyn FolderRepository>,
    media_repo: Arc<dyn MediaRepository>,
    probe: Arc<dyn MediaProbe>,
    event_bus: Arc<EventBus>,
    scan_lock: Mutex<()>,
}

impl ScanService {
    pub fn new(
        folder_repo: Arc<dyn FolderRepository>,
        media_repo: Arc<dyn MediaRepository>,
        probe: Arc<dyn MediaProbe>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            folder_repo,
            media_repo,
            probe,
            event_bus,
            scan_lock: Mutex::new(()),
        }
    }

    /// Scan every root. Blocking; run it off the async executor.
    /// A caller arriving while another scan runs waits for it, then scans again.
    pub fn scan_roots(&self, roots: &[PathBuf]) -> AppResult<ScanSummary> {
        let _scan = self.scan_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut summary = ScanSummary::default();
        for root in roots {
            summary.absorb(self.scan_one(root)?);
        }

        log::info!(
            "library scan: {} new, {} updated, {} removed, {} denied",
            summary.discovered,
            summary.updated,
            summary.removed,
            summary.denied_roots.len()
        );
        Ok(summary)
    }

    pub fn scan_root(&self, root: &Path) -> AppResult<ScanSummary> {
        let _scan = self.scan_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.scan_one(root)
    }

    fn scan_one(&self, root: &Path) -> AppResult<ScanSummary> {
        let mut summary = ScanSummary::default();

        match fs::read_dir(root) {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                log::warn!("no permission to read library root {:?}", root);
                summary.denied_roots.push(root.to_path_buf());
                return Ok(summary);
            }
            Err(e) => {
                log::warn!("skipping library root {:?}: {}", root, e);
                return Ok(summary);
            }
        }

        let mut folders: HashMap<PathBuf, Uuid> = HashMap::new();
        let mut seen: HashSet<PathBuf> = HashSet::new();

        for entry in WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(err) => {
                    log::debug!("unreadable entry under {:?}: {}", root, err);
                    None
                }
            })
        {
            if !entry.file_type().is_file() || !is_video_file(entry.path()) {
                continue;
            }

            let path = entry.path().to_path_buf();
            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    log::debug!("no metadata for {:?}: {}", path, e);
                    continue;
                }
            };
            seen.insert(path.clone());

            let parent = match path.parent() {
                Some(parent) => parent.to_path_buf(),
                None => continue,
            };
            let folder_id = match folders.get(&parent) {
                Some(id) => *id,
                None => {
                    let id = self.ensure_folder(&parent)?;
                    folders.insert(parent, id);
                    id
                }
            };

            match self.media_repo.get_by_path(&path)? {
                Some(existing) => {
                    if existing.has_changed(metadata.len(), modified_at(&metadata))
                        && self.refresh_media(existing)?
                    {
                        summary.updated += 1;
                    }
                }
                None => {
                    if self.register_media(folder_id, &path)? {
                        summary.discovered += 1;
                    }
                }
            }
        }

        summary.removed = self.remove_missing(root, &seen)?;
        self.folder_repo.delete_empty()?;

        self.event_bus.emit(DirectoryScanned::new(
            root.to_path_buf(),
            seen.len(),
            summary.updated,
            summary.removed,
        ));

        Ok(summary)
    }

    fn ensure_folder(&self, path: &Path) -> AppResult<Uuid> {
        if let Some(folder) = self.folder_repo.get_by_path(path)? {
            return Ok(folder.id);
        }

        let folder = Folder::new(path.to_path_buf());
        validate_folder(&folder).map_err(AppError::Domain)?;
        if self.folder_repo.insert_if_absent(&folder)? {
            return Ok(folder.id);
        }

        // Another writer cataloged the directory first
        self.folder_repo
            .get_by_path(path)?
            .map(|folder| folder.id)
            .ok_or(AppError::NotFound)
    }

    /// Probe and insert a new file. Returns `false` when the probe failed
    /// or the path was already cataloged.
    fn register_media(&self, folder_id: Uuid, path: &Path) -> AppResult<bool> {
        let info = match self.probe.probe(path) {
            Ok(info) => info,
            Err(e) => {
                log::warn!("could not probe {:?}: {}", path, e);
                return Ok(false);
            }
        };

        let media = MediaItem::new(folder_id, info);
        validate_media(&media).map_err(AppError::Domain)?;
        if !self.media_repo.insert_if_absent(&media)? {
            log::debug!("{:?} is already cataloged", path);
            return Ok(false);
        }

        self.event_bus
            .emit(MediaItemDiscovered::new(media.id, media.path.clone()));
        Ok(true)
    }

    fn refresh_media(&self, mut media: MediaItem) -> AppResult<bool> {
        let info = match self.probe.probe(&media.path) {
            Ok(info) => info,
            Err(e) => {
                log::warn!("could not probe {:?}: {}", media.path, e);
                return Ok(false);
            }
        };

        media.update_metadata(info);
        validate_media(&media).map_err(AppError::Domain)?;
        self.media_repo.save(&media)?;
        Ok(true)
    }

    /// Drop catalog entries under `root` that were not seen on disk
    fn remove_missing(&self, root: &Path, seen: &HashSet<PathBuf>) -> AppResult<usize> {
        let mut removed = 0;
        for media in self.media_repo.list_all()? {
            if !media.path.starts_with(root) || seen.contains(&media.path) {
                continue;
            }
            self.media_repo.delete(media.id)?;
            self.event_bus
                .emit(MediaItemRemoved::new(media.id, media.path.clone()));
            removed += 1;
        }
        Ok(removed)
    }
}
