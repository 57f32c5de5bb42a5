// src/infrastructure/preferences_store.rs
//
// Preferences Store
//
// One JSON document per preferences singleton.
//
// RULES:
// - Exactly one value per store at any time
// - Writes are read-modify-write under a lock, never lost to interleaving
// - Files are replaced atomically (temp file + rename)
// - Missing or unreadable documents fall back to defaults

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::watch;

use crate::domain::{InterfacePreferences, PlayerPreferences};
use crate::error::{AppError, AppResult};

pub const INTERFACE_PREFERENCES_FILE: &str = "interface_preferences.json";
pub const PLAYER_PREFERENCES_FILE: &str = "player_preferences.json";

/// Observable, file-backed singleton value
pub struct PreferencesStore<T> {
    path: PathBuf,
    sender: watch::Sender<T>,
    write_lock: Mutex<()>,
}

impl<T> PreferencesStore<T>
where
    T: Serialize + DeserializeOwned + Clone + PartialEq + Default + Send + Sync + 'static,
{
    /// Open the store at `path`, loading the current document
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let initial = load_or_default(&path);
        let (sender, _) = watch::channel(initial);

        Self {
            path,
            sender,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current value
    pub fn get(&self) -> T {
        self.sender.borrow().clone()
    }

    /// Stream of values: the receiver holds the current value and wakes on every change
    pub fn data(&self) -> watch::Receiver<T> {
        self.sender.subscribe()
    }

    /// Atomically transform the stored value and persist it.
    ///
    /// Returns the new value. Unchanged values are neither written nor published.
    pub fn update_data<F>(&self, transform: F) -> AppResult<T>
    where
        F: FnOnce(&T) -> T,
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| AppError::Other("Preferences lock poisoned".to_string()))?;

        let current = self.get();
        let updated = transform(&current);
        if updated == current {
            return Ok(updated);
        }

        write_atomically(&self.path, &updated)?;
        self.sender.send_replace(updated.clone());
        log::debug!("preferences written to {:?}", self.path);

        Ok(updated)
    }
}

fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(e) => {
            log::warn!("could not read preferences {:?}: {}; using defaults", path, e);
            return T::default();
        }
    };

    match serde_json::from_str(&contents) {
        Ok(value) => value,
        Err(e) => {
            log::warn!("corrupt preferences {:?}: {}; using defaults", path, e);
            T::default()
        }
    }
}

fn write_atomically<T: Serialize>(path: &Path, value: &T) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(value)?;
    let temp = path.with_extension("json.tmp");
    fs::write(&temp, json)?;
    fs::rename(&temp, path)?;
    Ok(())
}

pub type InterfacePreferencesStore = PreferencesStore<InterfacePreferences>;
pub type PlayerPreferencesStore = PreferencesStore<PlayerPreferences>;

/// Open both preference stores inside `dir`
pub fn open_preference_stores(dir: &Path) -> (InterfacePreferencesStore, PlayerPreferencesStore) {
    (
        PreferencesStore::open(dir.join(INTERFACE_PREFERENCES_FILE)),
        PreferencesStore::open(dir.join(PLAYER_PREFERENCES_FILE)),
    )
}
