// src/application/media_screen.rs
//
// Media Screen View-Model
//
// Holds the observable state of the library screen: sorted folders, sorted
// media, the interface preferences and the state of the last library sync.
//
// RULES:
// - Every state starts out as `Loading` and becomes `Success` on first load
// - Background tasks stop when the view-model is dropped
// - A denied library root is a screen state, never an error

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;

use crate::domain::{FolderWithMedia, InterfacePreferences, MediaItem};
use crate::error::{AppError, AppResult};
use crate::services::{LibraryService, PreferencesService, ScanService, ScanSummary, SortedStream};

#[derive(Debug, Clone, PartialEq)]
pub enum FolderUiState {
    Loading,
    Success(Vec<FolderWithMedia>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MediaUiState {
    Loading,
    Success(Vec<MediaItem>),
}

/// Progress of the library sync
#[derive(Debug, Clone, PartialEq)]
pub enum SyncState {
    Idle,
    Scanning,
    Done(ScanSummary),
    /// Storage access was refused; the screen shows a rationale for these roots
    PermissionDenied(Vec<PathBuf>),
    Failed(String),
}

pub struct MediaScreenViewModel {
    preferences: watch::Receiver<InterfacePreferences>,
    folders: watch::Receiver<FolderUiState>,
    media: watch::Receiver<MediaUiState>,
    sync: Arc<watch::Sender<SyncState>>,
    /// Held for the whole of a sync so only one runs at a time
    sync_lock: Arc<Mutex<()>>,
    scan_service: Arc<ScanService>,
    roots: Vec<PathBuf>,
    cancel: CancellationToken,
}

impl MediaScreenViewModel {
    /// Subscribe to the library and start a sync when `sync_on_start` is set.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        library: &LibraryService,
        preferences: &PreferencesService,
        scan_service: Arc<ScanService>,
        sync_on_start: bool,
    ) -> AppResult<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| AppError::Other("media screen needs a tokio runtime".to_string()))?;

        let cancel = CancellationToken::new();

        let (folders_tx, folders) = watch::channel(FolderUiState::Loading);
        runtime.spawn(drive(
            library.sorted_folders_stream(),
            folders_tx,
            FolderUiState::Success,
            cancel.clone(),
        ));

        let (media_tx, media) = watch::channel(MediaUiState::Loading);
        runtime.spawn(drive(
            library.sorted_media_stream(),
            media_tx,
            MediaUiState::Success,
            cancel.clone(),
        ));

        let view_model = Self {
            preferences: preferences.interface_stream(),
            folders,
            media,
            sync: Arc::new(watch::channel(SyncState::Idle).0),
            sync_lock: Arc::new(Mutex::new(())),
            scan_service,
            roots: library.roots().to_vec(),
            cancel,
        };

        if sync_on_start {
            let scan_service = Arc::clone(&view_model.scan_service);
            let roots = view_model.roots.clone();
            let sync = Arc::clone(&view_model.sync);
            let sync_lock = Arc::clone(&view_model.sync_lock);
            let cancel = view_model.cancel.clone();
            runtime.spawn(async move {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = sync_roots(scan_service, roots, sync, sync_lock) => {}
                }
            });
        }

        Ok(view_model)
    }

    pub fn preferences(&self) -> watch::Receiver<InterfacePreferences> {
        self.preferences.clone()
    }

    pub fn folder_ui_state(&self) -> watch::Receiver<FolderUiState> {
        self.folders.clone()
    }

    pub fn media_ui_state(&self) -> watch::Receiver<MediaUiState> {
        self.media.clone()
    }

    pub fn sync_state(&self) -> watch::Receiver<SyncState> {
        self.sync.subscribe()
    }

    /// Rescan the library roots. The catalog streams pick up the changes.
    /// Waits for a sync already in flight, then scans again.
    pub async fn sync_media(&self) -> AppResult<ScanSummary> {
        sync_roots(
            Arc::clone(&self.scan_service),
            self.roots.clone(),
            Arc::clone(&self.sync),
            Arc::clone(&self.sync_lock),
        )
        .await
    }
}

impl Drop for MediaScreenViewModel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Forward a sorted stream into a watch channel until cancelled
async fn drive<T, S>(
    mut stream: SortedStream<T>,
    state: watch::Sender<S>,
    success: fn(Vec<T>) -> S,
    cancel: CancellationToken,
) where
    T: Clone + Send + 'static,
{
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = stream.next() => next,
        };

        match next {
            Some(Ok(items)) => {
                if state.send(success(items)).is_err() {
                    break;
                }
            }
            Some(Err(e)) => log::warn!("library query failed: {}", e),
            None => break,
        }
    }
    log::debug!("media screen stream stopped");
}

async fn sync_roots(
    scan_service: Arc<ScanService>,
    roots: Vec<PathBuf>,
    sync: Arc<watch::Sender<SyncState>>,
    sync_lock: Arc<Mutex<()>>,
) -> AppResult<ScanSummary> {
    let _sync = sync_lock.lock().await;
    sync.send_replace(SyncState::Scanning);

    let result = tokio::task::spawn_blocking(move || scan_service.scan_roots(&roots))
        .await
        .map_err(|e| AppError::Other(format!("scan task failed: {}", e)))
        .and_then(|result| result);

    let state = match &result {
        Ok(summary) if summary.is_permission_denied() => {
            SyncState::PermissionDenied(summary.denied_roots.clone())
        }
        Ok(summary) => SyncState::Done(summary.clone()),
        Err(e) => {
            log::warn!("library sync failed: {}", e);
            SyncState::Failed(e.to_string())
        }
    };
    sync.send_replace(state);

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_memory_pool, initialize_database, InvalidationTracker};
    use crate::events::EventBus;
    use crate::infrastructure::open_preference_stores;
    use crate::repositories::{SqliteFolderRepository, SqliteMediaRepository};
    use crate::services::BasicProbe;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        _prefs_dir: TempDir,
        library_dir: TempDir,
        library: LibraryService,
        preferences: PreferencesService,
        scan: Arc<ScanService>,
        bus: Arc<EventBus>,
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

        let prefs_dir = tempfile::tempdir().unwrap();
        let (interface, player) = open_preference_stores(prefs_dir.path());
        let interface = Arc::new(interface);
        let bus = Arc::new(EventBus::new());

        let library_dir = tempfile::tempdir().unwrap();
        let library = LibraryService::new(
            folders.clone(),
            media.clone(),
            Arc::clone(&interface),
            vec![library_dir.path().to_path_buf()],
        );
        let preferences = PreferencesService::new(interface, Arc::new(player), bus.clone());
        let scan = Arc::new(ScanService::new(folders, media, Arc::new(BasicProbe), bus.clone()));

        Fixture {
            _prefs_dir: prefs_dir,
            library_dir,
            library,
            preferences,
            scan,
            bus,
        }
    }

    async fn wait_for<T, F>(rx: &mut watch::Receiver<T>, ready: F) -> T
    where
        T: Clone,
        F: Fn(&T) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let current = rx.borrow_and_update().clone();
                if ready(&current) {
                    return current;
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_states_load_from_empty_catalog() {
        let fx = setup();
        let vm = MediaScreenViewModel::new(&fx.library, &fx.preferences, fx.scan.clone(), false)
            .unwrap();

        let mut media = vm.media_ui_state();
        let mut folders = vm.folder_ui_state();

        let loaded = wait_for(&mut media, |s| matches!(s, MediaUiState::Success(_))).await;
        assert_eq!(loaded, MediaUiState::Success(vec![]));
        let loaded = wait_for(&mut folders, |s| matches!(s, FolderUiState::Success(_))).await;
        assert_eq!(loaded, FolderUiState::Success(vec![]));
        assert_eq!(*vm.sync_state().borrow(), SyncState::Idle);
    }

    #[tokio::test]
    async fn test_sync_on_start_fills_the_lists() {
        let fx = setup();
        let season = fx.library_dir.path().join("season1");
        fs::create_dir(&season).unwrap();
        fs::write(season.join("b.mkv"), b"bb").unwrap();
        fs::write(season.join("a.mp4"), b"a").unwrap();
        fs::write(season.join("notes.txt"), b"x").unwrap();

        let vm = MediaScreenViewModel::new(&fx.library, &fx.preferences, fx.scan.clone(), true)
            .unwrap();

        let mut media = vm.media_ui_state();
        let state = wait_for(&mut media, |s| {
            matches!(s, MediaUiState::Success(items) if items.len() == 2)
        })
        .await;
        let MediaUiState::Success(items) = state else {
            unreachable!()
        };
        let titles: Vec<_> = items.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b"]);

        let mut folders = vm.folder_ui_state();
        let state = wait_for(&mut folders, |s| {
            matches!(s, FolderUiState::Success(f) if f.len() == 1)
        })
        .await;
        let FolderUiState::Success(folders) = state else {
            unreachable!()
        };
        assert_eq!(folders[0].folder.name, "season1");

        let mut sync = vm.sync_state();
        let done = wait_for(&mut sync, |s| matches!(s, SyncState::Done(_))).await;
        assert!(matches!(done, SyncState::Done(summary) if summary.discovered == 2));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_manual_sync_during_startup_sync() {
        let fx = setup();
        for i in 0..120 {
            let dir = fx.library_dir.path().join(format!("disc{}", i % 4));
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(format!("episode{:03}.mp4", i)), b"v").unwrap();
        }

        let vm = MediaScreenViewModel::new(&fx.library, &fx.preferences, fx.scan.clone(), true)
            .unwrap();
        let summary = vm.sync_media().await.unwrap();
        assert!(summary.discovered <= 120);

        // Both scans finish without error
        let finished = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let scanned = fx
                    .bus
                    .get_event_log()
                    .iter()
                    .filter(|e| e.event_type == "DirectoryScanned")
                    .count();
                if scanned >= 2 {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(finished.is_ok());

        let discovered = fx
            .bus
            .get_event_log()
            .iter()
            .filter(|e| e.event_type == "MediaItemDiscovered")
            .count();
        assert_eq!(discovered, 120);

        let mut media = vm.media_ui_state();
        wait_for(&mut media, |s| {
            matches!(s, MediaUiState::Success(items) if items.len() == 120)
        })
        .await;
        let mut sync = vm.sync_state();
        let done = wait_for(&mut sync, |s| !matches!(s, SyncState::Scanning)).await;
        assert!(matches!(done, SyncState::Done(_)));
    }

    #[tokio::test]
    async fn test_sorting_follows_preference_changes() {
        let fx = setup();
        fs::write(fx.library_dir.path().join("alpha.mp4"), b"1").unwrap();
        fs::write(fx.library_dir.path().join("beta.mp4"), b"2").unwrap();

        let vm = MediaScreenViewModel::new(&fx.library, &fx.preferences, fx.scan.clone(), false)
            .unwrap();
        vm.sync_media().await.unwrap();

        let mut media = vm.media_ui_state();
        wait_for(&mut media, |s| {
            matches!(s, MediaUiState::Success(items) if items.len() == 2)
        })
        .await;

        fx.preferences
            .set_sort_order(crate::domain::SortOrder::Descending)
            .unwrap();

        let state = wait_for(&mut media, |s| {
            matches!(s, MediaUiState::Success(items)
                if items.first().map(|m| m.title.as_str()) == Some("beta"))
        })
        .await;
        assert!(matches!(state, MediaUiState::Success(items) if items.len() == 2));
        assert_eq!(
            vm.preferences().borrow().sort_order,
            crate::domain::SortOrder::Descending
        );
    }

    #[tokio::test]
    async fn test_missing_root_is_not_a_denial() {
        let fx = setup();
        fs::remove_dir(fx.library_dir.path()).unwrap();

        let vm = MediaScreenViewModel::new(&fx.library, &fx.preferences, fx.scan.clone(), false)
            .unwrap();
        let summary = vm.sync_media().await.unwrap();

        assert!(!summary.is_permission_denied());
        assert!(matches!(*vm.sync_state().borrow(), SyncState::Done(_)));
    }

    #[test]
    fn test_requires_runtime() {
        let fx = setup();
        assert!(MediaScreenViewModel::new(&fx.library, &fx.preferences, fx.scan.clone(), false)
            .is_err());
    }

    #[tokio::test]
    async fn test_drop_stops_the_streams() {
        let fx = setup();
        let vm = MediaScreenViewModel::new(&fx.library, &fx.preferences, fx.scan.clone(), false)
            .unwrap();
        let mut media = vm.media_ui_state();
        wait_for(&mut media, |s| matches!(s, MediaUiState::Success(_))).await;

        drop(vm);

        // The forwarding task drops its sender once it sees the cancellation
        let closed = tokio::time::timeout(Duration::from_secs(5), async {
            while media.changed().await.is_ok() {}
        })
        .await;
        assert!(closed.is_ok());
    }
}
