// src/services/library_service.rs
//
// Library Use-Cases
//
// Sorted, filtered views of the catalog that follow the interface preferences.
//
// RULES:
// - Streams emit again when the catalog OR the preferences change
// - Hidden entries are dropped unless `show_hidden` is on
// - Only folders that still list at least one item are shown

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

use crate::db::LiveQuery;
use crate::domain::{is_hidden_path, FolderWithMedia, InterfacePreferences, MediaItem, SortBy};
use crate::error::AppResult;
use crate::infrastructure::InterfacePreferencesStore;
use crate::repositories::{FolderRepository, MediaRepository};

type Present<T> = fn(Vec<T>, &InterfacePreferences, &[PathBuf]) -> Vec<T>;

/// A catalog live query combined with the interface preferences
pub struct SortedStream<T> {
    query: LiveQuery<Vec<T>>,
    preferences: watch::Receiver<InterfacePreferences>,
    preferences_open: bool,
    roots: Arc<[PathBuf]>,
    latest: Option<Vec<T>>,
    present: Present<T>,
}

impl<T: Clone + Send + 'static> SortedStream<T> {
    fn new(
        query: LiveQuery<Vec<T>>,
        preferences: watch::Receiver<InterfacePreferences>,
        roots: Arc<[PathBuf]>,
        present: Present<T>,
    ) -> Self {
        Self {
            query,
            preferences,
            preferences_open: true,
            roots,
            latest: None,
            present,
        }
    }

    /// Next presented list; `None` once the catalog has gone away.
    ///
    /// The first call loads immediately. Cancel-safe.
    pub async fn next(&mut self) -> Option<AppResult<Vec<T>>> {
        if self.latest.is_none() {
            match self.query.next().await? {
                Ok(items) => self.latest = Some(items),
                Err(e) => return Some(Err(e)),
            }
        } else {
            loop {
                tokio::select! {
                    changed = self.query.changed() => {
                        if !changed {
                            return None;
                        }
                        match self.query.fetch().await {
                            Ok(items) => self.latest = Some(items),
                            Err(e) => return Some(Err(e)),
                        }
                        break;
                    }
                    result = self.preferences.changed(), if self.preferences_open => {
                        if result.is_ok() {
                            break;
                        }
                        // Store dropped: keep following the catalog alone
                        self.preferences_open = false;
                    }
                }
            }
        }

        let preferences = self.preferences.borrow_and_update().clone();
        let items = self.latest.clone().unwrap_or_default();
        Some(Ok((self.present)(items, &preferences, &self.roots)))
    }
}

// ---------------------------------------------------------------------
// Presentation
// ---------------------------------------------------------------------

/// Library root containing `path`, if any
fn root_of<'a>(path: &Path, roots: &'a [PathBuf]) -> &'a Path {
    roots
        .iter()
        .filter(|root| path.starts_with(root))
        .max_by_key(|root| root.components().count())
        .map(PathBuf::as_path)
        .unwrap_or_else(|| Path::new(""))
}

fn is_hidden(path: &Path, roots: &[PathBuf]) -> bool {
    is_hidden_path(path, root_of(path, roots))
}

fn compare_titles(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

pub fn sort_media(items: &mut [MediaItem], preferences: &InterfacePreferences) {
    items.sort_by(|a, b| {
        let ordering = match preferences.sort_by {
            SortBy::Title => compare_titles(&a.title, &b.title),
            SortBy::Length => a.duration_ms.unwrap_or(0).cmp(&b.duration_ms.unwrap_or(0)),
        };
        preferences.sort_order.apply(ordering)
    });
}

pub fn sort_folders(folders: &mut [FolderWithMedia], preferences: &InterfacePreferences) {
    folders.sort_by(|a, b| {
        let ordering = match preferences.sort_by {
            SortBy::Title => compare_titles(&a.folder.name, &b.folder.name),
            SortBy::Length => a.total_duration_ms().cmp(&b.total_duration_ms()),
        };
        preferences.sort_order.apply(ordering)
    });
}

pub fn present_media(
    items: Vec<MediaItem>,
    preferences: &InterfacePreferences,
    roots: &[PathBuf],
) -> Vec<MediaItem> {
    let mut items: Vec<MediaItem> = items
        .into_iter()
        .filter(|m| preferences.show_hidden || !is_hidden(&m.path, roots))
        .collect();
    sort_media(&mut items, preferences);
    items
}

pub fn present_folders(
    folders: Vec<FolderWithMedia>,
    preferences: &InterfacePreferences,
    roots: &[PathBuf],
) -> Vec<FolderWithMedia> {
    let mut folders: Vec<FolderWithMedia> = folders
        .into_iter()
        .map(|mut entry| {
            entry.media = present_media(entry.media, preferences, roots);
            entry
        })
        .filter(|entry| !entry.media.is_empty())
        .collect();
    sort_folders(&mut folders, preferences);
    folders
}

// ---------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------

pub struct LibraryService {
    folder_repo: Arc<dyn FolderRepository>,
    media_repo: Arc<dyn MediaRepository>,
    preferences: Arc<InterfacePreferencesStore>,
    roots: Arc<[PathBuf]>,
}

impl LibraryService {
    pub fn new(
        folder_repo: Arc<dyn FolderRepository>,
        media_repo: Arc<dyn MediaRepository>,
        preferences: Arc<InterfacePreferencesStore>,
        roots: Vec<PathBuf>,
    ) -> Self {
        Self {
            folder_repo,
            media_repo,
            preferences,
            roots: roots.into(),
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Non-empty folders, filtered and sorted
    pub fn sorted_folders_stream(&self) -> SortedStream<FolderWithMedia> {
        SortedStream::new(
            self.folder_repo.watch_with_media(),
            self.preferences.data(),
            Arc::clone(&self.roots),
            present_folders,
        )
    }

    /// Every media item, filtered and sorted
    pub fn sorted_media_stream(&self) -> SortedStream<MediaItem> {
        SortedStream::new(
            self.media_repo.watch_all(),
            self.preferences.data(),
            Arc::clone(&self.roots),
            present_media,
        )
    }

    /// The media of one folder, filtered and sorted
    pub fn folder_media(&self, folder_id: Uuid) -> AppResult<Vec<MediaItem>> {
        let media = self.media_repo.list_by_folder(folder_id)?;
        Ok(present_media(media, &self.preferences.get(), &self.roots))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_memory_pool, initialize_database, InvalidationTracker, Table};
    use crate::domain::{Folder, MediaInfo, SortOrder};
    use crate::error::AppError;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use crate::infrastructure::PreferencesStore;
    use crate::repositories::{SqliteFolderRepository, SqliteMediaRepository};
    use chrono::Utc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn media(path: &str, title: &str, duration_ms: Option<u64>) -> MediaItem {
        MediaItem::new(
            Uuid::new_v4(),
            MediaInfo {
                path: PathBuf::from(path),
                title: title.to_string(),
                size: 1,
                duration_ms,
                width: 0,
                height: 0,
                frame_rate: 0.0,
                thumbnail_path: None,
                modified_at: Utc::now(),
            },
        )
    }

    fn prefs(sort_by: SortBy, sort_order: SortOrder, show_hidden: bool) -> InterfacePreferences {
        InterfacePreferences {
            sort_by,
            sort_order,
            show_hidden,
            ..InterfacePreferences::default()
        }
    }

    fn titles(items: &[MediaItem]) -> Vec<&str> {
        items.iter().map(|m| m.title.as_str()).collect()
    }

    #[test]
    fn test_media_sorted_by_title_ignoring_case() {
        let roots = vec![PathBuf::from("/videos")];
        let items = vec![
            media("/videos/b.mp4", "beta", None),
            media("/videos/a.mp4", "Alpha", None),
            media("/videos/c.mp4", "Gamma", None),
        ];

        let sorted = present_media(
            items.clone(),
            &prefs(SortBy::Title, SortOrder::Ascending, false),
            &roots,
        );
        assert_eq!(titles(&sorted), vec!["Alpha", "beta", "Gamma"]);

        let sorted = present_media(
            items,
            &prefs(SortBy::Title, SortOrder::Descending, false),
            &roots,
        );
        assert_eq!(titles(&sorted), vec!["Gamma", "beta", "Alpha"]);
    }

    #[test]
    fn test_unknown_length_sorts_as_zero() {
        let items = vec![
            media("/videos/a.mp4", "long", Some(90_000)),
            media("/videos/b.mp4", "unknown", None),
            media("/videos/c.mp4", "short", Some(10_000)),
        ];

        let sorted = present_media(
            items,
            &prefs(SortBy::Length, SortOrder::Ascending, false),
            &[PathBuf::from("/videos")],
        );

        assert_eq!(titles(&sorted), vec!["unknown", "short", "long"]);
    }

    #[test]
    fn test_hidden_media_filtered_unless_enabled() {
        let roots = vec![PathBuf::from("/home/u/.videos")];
        let items = vec![
            media("/home/u/.videos/a.mp4", "visible", None),
            media("/home/u/.videos/.secret/b.mp4", "nested", None),
            media("/home/u/.videos/.c.mp4", "dotfile", None),
        ];

        // The root itself being hidden does not count
        let shown = present_media(
            items.clone(),
            &prefs(SortBy::Title, SortOrder::Ascending, false),
            &roots,
        );
        assert_eq!(titles(&shown), vec!["visible"]);

        let shown = present_media(
            items,
            &prefs(SortBy::Title, SortOrder::Ascending, true),
            &roots,
        );
        assert_eq!(shown.len(), 3);
    }

    #[test]
    fn test_folders_left_empty_by_filtering_are_dropped() {
        let roots = vec![PathBuf::from("/videos")];
        let visible = FolderWithMedia {
            folder: Folder::new(PathBuf::from("/videos/trips")),
            media: vec![media("/videos/trips/a.mp4", "a", Some(5_000))],
        };
        let hidden = FolderWithMedia {
            folder: Folder::new(PathBuf::from("/videos/.cache")),
            media: vec![media("/videos/.cache/b.mp4", "b", Some(9_000))],
        };

        let folders = present_folders(
            vec![hidden.clone(), visible.clone()],
            &prefs(SortBy::Title, SortOrder::Ascending, false),
            &roots,
        );
        assert_eq!(folders, vec![visible.clone()]);

        let folders = present_folders(
            vec![visible, hidden],
            &prefs(SortBy::Length, SortOrder::Descending, true),
            &roots,
        );
        assert_eq!(folders[0].folder.name, ".cache");
    }

    struct Fixture {
        _dir: TempDir,
        folders: Arc<SqliteFolderRepository>,
        media: Arc<SqliteMediaRepository>,
        store: Arc<InterfacePreferencesStore>,
        service: LibraryService,
    }

    fn setup() -> Fixture {
        let pool = Arc::new(create_memory_pool().unwrap());
        {
            let conn = pool.get().unwrap();
            initialize_database(&conn).unwrap();
        }
        let tracker = InvalidationTracker::new();
        let folders = Arc::new(SqliteFolderRepository::new(Arc::clone(&pool), tracker.clone()));
        let media = Arc::new(SqliteMediaRepository::new(pool, tracker));

        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(PreferencesStore::open(dir.path().join("interface.json")));
        let service = LibraryService::new(
            folders.clone(),
            media.clone(),
            store.clone(),
            vec![PathBuf::from("/videos")],
        );

        Fixture {
            _dir: dir,
            folders,
            media,
            store,
            service,
        }
    }

    fn save(f: &Fixture, path: &str, title: &str) {
        let dir = Path::new(path).parent().unwrap().to_path_buf();
        let folder = match f.folders.get_by_path(&dir).unwrap() {
            Some(folder) => folder,
            None => {
                let folder = Folder::new(dir);
                f.folders.save(&folder).unwrap();
                folder
            }
        };
        let mut item = media(path, title, None);
        item.folder_id = folder.id;
        f.media.save(&item).unwrap();
    }

    #[tokio::test]
    async fn test_media_stream_follows_catalog_and_preferences() {
        let f = setup();
        save(&f, "/videos/b.mp4", "b");
        save(&f, "/videos/a.mp4", "a");

        let mut stream = f.service.sorted_media_stream();
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(titles(&first), vec!["a", "b"]);

        f.store
            .update_data(|p| InterfacePreferences {
                sort_order: SortOrder::Descending,
                ..p.clone()
            })
            .unwrap();
        let resorted = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(titles(&resorted), vec!["b", "a"]);

        save(&f, "/videos/c.mp4", "c");
        let grown = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(titles(&grown), vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn test_folder_stream_lists_non_empty_folders() {
        let f = setup();
        save(&f, "/videos/trips/a.mp4", "a");
        f.folders
            .save(&Folder::new(PathBuf::from("/videos/empty")))
            .unwrap();

        let mut stream = f.service.sorted_folders_stream();
        let folders = stream.next().await.unwrap().unwrap();

        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].folder.name, "trips");
    }

    #[tokio::test]
    async fn test_stream_recovers_from_failed_first_load() {
        let f = setup();
        save(&f, "/videos/a.mp4", "a");
        let tracker = InvalidationTracker::new();
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = Arc::clone(&attempts);
        let media_repo = f.media.clone();
        let query = LiveQuery::new(&tracker, &[Table::Media], move || {
            if attempts_clone.fetch_add(1, AtomicOrdering::SeqCst) == 0 {
                return Err(AppError::Other("database is locked".to_string()));
            }
            media_repo.list_all()
        });
        let mut stream = SortedStream::new(
            query,
            f.store.data(),
            Arc::from(vec![PathBuf::from("/videos")]),
            present_media,
        );

        assert!(stream.next().await.unwrap().is_err());

        // No write and no preference change: the load is retried anyway
        let loaded = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(titles(&loaded), vec!["a"]);
        assert_eq!(attempts.load(AtomicOrdering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stream_survives_dropped_preferences_store() {
        let f = setup();
        save(&f, "/videos/a.mp4", "a");
        let mut stream = f.service.sorted_media_stream();
        stream.next().await.unwrap().unwrap();

        let Fixture {
            _dir,
            folders,
            media: media_repo,
            store,
            service,
        } = f;
        drop(service);
        drop(store);

        let mut item = media("/videos/b.mp4", "b", None);
        item.folder_id = folders.get_by_path(Path::new("/videos")).unwrap().unwrap().id;
        media_repo.save(&item).unwrap();

        let next = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(next.len(), 2);
    }
}
