// src/player/ui_state.rs
//
// Transient state of the player overlay. Never persisted as a whole.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::engine::{PlaybackState, VideoSize};
use super::gestures::LevelBar;
use crate::domain::AspectRatio;

/// Highest brightness and volume level
pub const MAX_LEVEL: u32 = 25;

/// How long the controller stays visible without interaction
pub const CONTROLLER_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Landscape,
    Portrait,
}

impl Orientation {
    /// Orientation that fits a video, taking its rotation into account
    pub fn for_video(size: VideoSize) -> Self {
        let (width, height) = if size.rotation_degrees % 180 == 90 {
            (size.height, size.width)
        } else {
            (size.width, size.height)
        };

        if height > width {
            Orientation::Portrait
        } else {
            Orientation::Landscape
        }
    }
}

/// A pending "resume from saved position?" question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumePrompt {
    pub media_item_index: usize,
    pub position_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerUiState {
    pub position_ms: u64,
    pub duration_ms: Option<u64>,
    pub brightness_level: u32,
    pub volume_level: u32,
    pub max_level: u32,
    pub is_controller_visible: bool,
    /// Indicator shown while a vertical drag is in progress
    pub active_bar: Option<LevelBar>,
    pub is_locked: bool,
    pub is_seek_bar_visible: bool,
    pub is_buffering: bool,
    pub keep_screen_on: bool,
    pub orientation: Orientation,
    pub aspect_ratio: AspectRatio,
    pub resume_prompt: Option<ResumePrompt>,
}

impl Default for PlayerUiState {
    fn default() -> Self {
        Self {
            position_ms: 0,
            duration_ms: None,
            brightness_level: 0,
            volume_level: MAX_LEVEL,
            max_level: MAX_LEVEL,
            is_controller_visible: false,
            active_bar: None,
            is_locked: false,
            is_seek_bar_visible: false,
            is_buffering: false,
            keep_screen_on: false,
            orientation: Orientation::Landscape,
            aspect_ratio: AspectRatio::FitScreen,
            resume_prompt: None,
        }
    }
}

impl PlayerUiState {
    /// Brightness as a fraction of the maximum, for the window
    pub fn brightness_fraction(&self) -> f32 {
        self.brightness_level as f32 / self.max_level.max(1) as f32
    }

    pub fn volume_fraction(&self) -> f32 {
        self.volume_level as f32 / self.max_level.max(1) as f32
    }
}

/// The buffering spinner only shows before the first video format is known
pub fn is_buffering(state: PlaybackState, has_video_format: bool) -> bool {
    state == PlaybackState::Buffering && !has_video_format
}
