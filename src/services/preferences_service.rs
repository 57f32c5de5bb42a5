// src/services/preferences_service.rs
//
// Preferences Service
//
// Field-level operations on the two preference singletons. Every accepted
// change is announced on the event bus.

use std::sync::Arc;
use tokio::sync::watch;

use crate::domain::{
    AspectRatio, InterfacePreferences, PlayerPreferences, Resume, SortBy, SortOrder, Theme,
};
use crate::error::AppResult;
use crate::events::{EventBus, InterfacePreferencesUpdated, PlayerPreferencesUpdated};
use crate::infrastructure::{InterfacePreferencesStore, PlayerPreferencesStore};
use crate::player::MAX_LEVEL;

/// Playback speed bounds, in percent
pub const MIN_PLAYBACK_SPEED: u32 = 25;
pub const MAX_PLAYBACK_SPEED: u32 = 400;

pub struct PreferencesService {
    interface: Arc<InterfacePreferencesStore>,
    player: Arc<PlayerPreferencesStore>,
    event_bus: Arc<EventBus>,
}

impl PreferencesService {
    pub fn new(
        interface: Arc<InterfacePreferencesStore>,
        player: Arc<PlayerPreferencesStore>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            interface,
            player,
            event_bus,
        }
    }

    // ------------------------------------------------------------------
    // Interface
    // ------------------------------------------------------------------

    pub fn interface_preferences(&self) -> InterfacePreferences {
        self.interface.get()
    }

    pub fn interface_stream(&self) -> watch::Receiver<InterfacePreferences> {
        self.interface.data()
    }

    fn update_interface<F>(&self, transform: F) -> AppResult<InterfacePreferences>
    where
        F: FnOnce(&InterfacePreferences) -> InterfacePreferences,
    {
        let mut changed = false;
        let updated = self.interface.update_data(|current| {
            let next = transform(current);
            changed = next != *current;
            next
        })?;
        if changed {
            self.event_bus
                .emit(InterfacePreferencesUpdated::new(updated.clone()));
        }
        Ok(updated)
    }

    /// Replace the whole interface record
    pub fn set_interface_preferences(
        &self,
        preferences: InterfacePreferences,
    ) -> AppResult<InterfacePreferences> {
        self.update_interface(|_| preferences)
    }

    pub fn set_theme(&self, theme: Theme) -> AppResult<InterfacePreferences> {
        self.update_interface(|p| InterfacePreferences {
            theme,
            ..p.clone()
        })
    }

    pub fn set_sort_by(&self, sort_by: SortBy) -> AppResult<InterfacePreferences> {
        self.update_interface(|p| InterfacePreferences {
            sort_by,
            ..p.clone()
        })
    }

    pub fn set_sort_order(&self, sort_order: SortOrder) -> AppResult<InterfacePreferences> {
        self.update_interface(|p| InterfacePreferences {
            sort_order,
            ..p.clone()
        })
    }

    pub fn toggle_show_floating_button(&self) -> AppResult<InterfacePreferences> {
        self.update_interface(|p| InterfacePreferences {
            show_floating_button: !p.show_floating_button,
            ..p.clone()
        })
    }

    pub fn toggle_show_hidden(&self) -> AppResult<InterfacePreferences> {
        self.update_interface(|p| InterfacePreferences {
            show_hidden: !p.show_hidden,
            ..p.clone()
        })
    }

    pub fn toggle_group_videos(&self) -> AppResult<InterfacePreferences> {
        self.update_interface(|p| InterfacePreferences {
            group_videos: !p.group_videos,
            ..p.clone()
        })
    }

    // ------------------------------------------------------------------
    // Player
    // ------------------------------------------------------------------

    pub fn player_preferences(&self) -> PlayerPreferences {
        self.player.get()
    }

    pub fn player_stream(&self) -> watch::Receiver<PlayerPreferences> {
        self.player.data()
    }

    fn update_player<F>(&self, transform: F) -> AppResult<PlayerPreferences>
    where
        F: FnOnce(&PlayerPreferences) -> PlayerPreferences,
    {
        let mut changed = false;
        let updated = self.player.update_data(|current| {
            let next = transform(current);
            changed = next != *current;
            next
        })?;
        if changed {
            self.event_bus
                .emit(PlayerPreferencesUpdated::new(updated.clone()));
        }
        Ok(updated)
    }

    pub fn set_player_preferences(
        &self,
        preferences: PlayerPreferences,
    ) -> AppResult<PlayerPreferences> {
        self.update_player(|_| preferences)
    }

    pub fn toggle_save_brightness_level(&self) -> AppResult<PlayerPreferences> {
        self.update_player(|p| PlayerPreferences {
            save_brightness_level: !p.save_brightness_level,
            ..p.clone()
        })
    }

    pub fn toggle_save_playback_speed(&self) -> AppResult<PlayerPreferences> {
        self.update_player(|p| PlayerPreferences {
            save_playback_speed: !p.save_playback_speed,
            ..p.clone()
        })
    }

    pub fn toggle_fast_seeking(&self) -> AppResult<PlayerPreferences> {
        self.update_player(|p| PlayerPreferences {
            fast_seeking: !p.fast_seeking,
            ..p.clone()
        })
    }

    pub fn set_resume(&self, resume: Resume) -> AppResult<PlayerPreferences> {
        self.update_player(|p| PlayerPreferences {
            resume,
            ..p.clone()
        })
    }

    pub fn set_aspect_ratio(&self, aspect_ratio: AspectRatio) -> AppResult<PlayerPreferences> {
        self.update_player(|p| PlayerPreferences {
            aspect_ratio,
            ..p.clone()
        })
    }

    /// Clamped to `[0, MAX_LEVEL]`
    pub fn set_brightness_level(&self, level: u32) -> AppResult<PlayerPreferences> {
        let brightness_level = level.min(MAX_LEVEL);
        self.update_player(|p| PlayerPreferences {
            brightness_level,
            ..p.clone()
        })
    }

    /// Percent, clamped to `[MIN_PLAYBACK_SPEED, MAX_PLAYBACK_SPEED]`
    pub fn set_playback_speed(&self, percent: u32) -> AppResult<PlayerPreferences> {
        let playback_speed = percent.clamp(MIN_PLAYBACK_SPEED, MAX_PLAYBACK_SPEED);
        self.update_player(|p| PlayerPreferences {
            playback_speed,
            ..p.clone()
        })
    }
}
