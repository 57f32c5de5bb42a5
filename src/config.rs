// src/config.rs
//
// Application configuration: {CONFIG_DIR}/nextplayer/config.toml
//
// Created with defaults on first run. Every section tolerates missing keys.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub library: LibraryConfig,
    pub storage: StorageConfig,
    pub display: DisplayConfig,
    pub mpv: MpvConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Directories scanned for videos
    pub roots: Vec<PathBuf>,
    /// Rescan when the media screen opens
    pub scan_on_start: bool,
    /// `ffprobe` used to read durations and dimensions
    pub ffprobe_binary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// Catalog database; platform data dir when unset
    pub database_path: Option<PathBuf>,
    /// Directory holding the preference documents; platform config dir when unset
    pub preferences_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Pixels per dp
    pub density: f32,
    pub screen_width_px: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MpvConfig {
    pub binary: String,
    /// IPC socket; a temp-dir path when unset
    pub socket_path: Option<PathBuf>,
    pub poll_interval_ms: u64,
    /// Seconds to wait for the IPC socket after launching
    pub startup_timeout_secs: u64,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            roots: dirs::video_dir().into_iter().collect(),
            scan_on_start: true,
            ffprobe_binary: "ffprobe".to_string(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            density: 1.0,
            screen_width_px: 1920.0,
        }
    }
}

impl Default for MpvConfig {
    fn default() -> Self {
        Self {
            binary: "mpv".to_string(),
            socket_path: None,
            poll_interval_ms: 250,
            startup_timeout_secs: 5,
        }
    }
}

impl MpvConfig {
    pub fn socket_path(&self) -> PathBuf {
        self.socket_path
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("nextplayer-mpv.sock"))
    }
}

impl StorageConfig {
    pub fn database_path(&self) -> AppResult<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => crate::db::default_database_path(),
        }
    }

    pub fn preferences_dir(&self) -> AppResult<PathBuf> {
        match &self.preferences_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(config_dir()?.join("preferences")),
        }
    }
}

fn config_dir() -> AppResult<PathBuf> {
    let dir = dirs::config_dir()
        .ok_or_else(|| AppError::Config("Could not determine config directory".to_string()))?;
    Ok(dir.join("nextplayer"))
}

impl Config {
    /// Load from the default location, writing defaults when missing
    pub fn load() -> AppResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        if path.exists() {
            log::debug!("Loading config from {:?}", path);
            let contents = fs::read_to_string(path)?;
            let config: Config = toml::from_str(&contents)?;
            log::info!("Config loaded from {:?}", path);
            Ok(config)
        } else {
            log::info!("No config file at {:?}, using defaults", path);
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save(&self) -> AppResult<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;

        log::debug!("Config saved to {:?}", path);
        Ok(())
    }

    pub fn config_path() -> AppResult<PathBuf> {
        Ok(config_dir()?.join("config.toml"))
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.display.density <= 0.0 {
            return Err(AppError::Config("display.density must be positive".to_string()));
        }
        if self.mpv.poll_interval_ms == 0 {
            return Err(AppError::Config(
                "mpv.poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
