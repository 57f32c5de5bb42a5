// src/application/settings.rs
//
// Settings View-Models
//
// One per settings screen. Each exposes the current preferences as a watch
// channel and one action per control; actions write through the
// preferences service, so the channel reflects them immediately.

use std::sync::Arc;
use tokio::sync::watch;

use crate::domain::{
    AspectRatio, InterfacePreferences, PlayerPreferences, Resume, SortBy, SortOrder, Theme,
};
use crate::error::AppResult;
use crate::services::PreferencesService;

// ---------------------------------------------------------------------
// Interface
// ---------------------------------------------------------------------

pub struct InterfaceSettingsViewModel {
    preferences: Arc<PreferencesService>,
}

impl InterfaceSettingsViewModel {
    pub fn new(preferences: Arc<PreferencesService>) -> Self {
        Self { preferences }
    }

    pub fn preferences(&self) -> watch::Receiver<InterfacePreferences> {
        self.preferences.interface_stream()
    }

    pub fn current(&self) -> InterfacePreferences {
        self.preferences.interface_preferences()
    }

    pub fn set_theme(&self, theme: Theme) -> AppResult<()> {
        self.preferences.set_theme(theme)?;
        Ok(())
    }

    pub fn set_sort_by(&self, sort_by: SortBy) -> AppResult<()> {
        self.preferences.set_sort_by(sort_by)?;
        Ok(())
    }

    pub fn set_sort_order(&self, sort_order: SortOrder) -> AppResult<()> {
        self.preferences.set_sort_order(sort_order)?;
        Ok(())
    }

    pub fn toggle_floating_button(&self) -> AppResult<()> {
        self.preferences.toggle_show_floating_button()?;
        Ok(())
    }

    pub fn toggle_group_videos(&self) -> AppResult<()> {
        self.preferences.toggle_group_videos()?;
        Ok(())
    }

    pub fn toggle_show_hidden(&self) -> AppResult<()> {
        self.preferences.toggle_show_hidden()?;
        Ok(())
    }

    /// Put every interface setting back to its default
    pub fn reset(&self) -> AppResult<()> {
        self.preferences
            .set_interface_preferences(InterfacePreferences::default())?;
        Ok(())
    }
}

// ---------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------

pub struct PlayerSettingsViewModel {
    preferences: Arc<PreferencesService>,
}

impl PlayerSettingsViewModel {
    pub fn new(preferences: Arc<PreferencesService>) -> Self {
        Self { preferences }
    }

    pub fn preferences(&self) -> watch::Receiver<PlayerPreferences> {
        self.preferences.player_stream()
    }

    pub fn current(&self) -> PlayerPreferences {
        self.preferences.player_preferences()
    }

    pub fn toggle_save_brightness_level(&self) -> AppResult<()> {
        self.preferences.toggle_save_brightness_level()?;
        Ok(())
    }

    pub fn toggle_save_playback_speed(&self) -> AppResult<()> {
        self.preferences.toggle_save_playback_speed()?;
        Ok(())
    }

    pub fn toggle_fast_seeking(&self) -> AppResult<()> {
        self.preferences.toggle_fast_seeking()?;
        Ok(())
    }

    pub fn set_resume(&self, resume: Resume) -> AppResult<()> {
        self.preferences.set_resume(resume)?;
        Ok(())
    }

    pub fn set_aspect_ratio(&self, aspect_ratio: AspectRatio) -> AppResult<()> {
        self.preferences.set_aspect_ratio(aspect_ratio)?;
        Ok(())
    }

    pub fn set_brightness_level(&self, level: u32) -> AppResult<()> {
        self.preferences.set_brightness_level(level)?;
        Ok(())
    }

    /// Speed in percent; clamped to the supported range
    pub fn set_playback_speed(&self, percent: u32) -> AppResult<()> {
        self.preferences.set_playback_speed(percent)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::infrastructure::open_preference_stores;
    use crate::services::{MAX_PLAYBACK_SPEED, MIN_PLAYBACK_SPEED};
    use tempfile::TempDir;

    fn service() -> (TempDir, Arc<PreferencesService>) {
        let dir = tempfile::tempdir().unwrap();
        let (interface, player) = open_preference_stores(dir.path());
        let service = PreferencesService::new(
            Arc::new(interface),
            Arc::new(player),
            Arc::new(EventBus::new()),
        );
        (dir, Arc::new(service))
    }

    #[test]
    fn test_interface_toggles_flip_the_published_value() {
        let (_dir, service) = service();
        let vm = InterfaceSettingsViewModel::new(service);
        let rx = vm.preferences();
        let before = vm.current();

        vm.toggle_floating_button().unwrap();
        vm.toggle_group_videos().unwrap();
        vm.toggle_show_hidden().unwrap();

        let after = rx.borrow().clone();
        assert_eq!(after.show_floating_button, !before.show_floating_button);
        assert_eq!(after.group_videos, !before.group_videos);
        assert_eq!(after.show_hidden, !before.show_hidden);
    }

    #[test]
    fn test_interface_reset_restores_defaults() {
        let (_dir, service) = service();
        let vm = InterfaceSettingsViewModel::new(service);

        vm.set_theme(Theme::Light).unwrap();
        vm.set_sort_by(SortBy::Length).unwrap();
        vm.set_sort_order(SortOrder::Descending).unwrap();
        assert_eq!(vm.current().theme, Theme::Light);

        vm.reset().unwrap();
        assert_eq!(vm.current(), InterfacePreferences::default());
    }

    #[test]
    fn test_player_settings_write_through() {
        let (_dir, service) = service();
        let vm = PlayerSettingsViewModel::new(service.clone());

        vm.toggle_save_brightness_level().unwrap();
        vm.toggle_save_playback_speed().unwrap();
        vm.toggle_fast_seeking().unwrap();
        vm.set_resume(Resume::Ask).unwrap();
        vm.set_aspect_ratio(AspectRatio::Crop).unwrap();

        let current = service.player_preferences();
        assert!(!current.save_brightness_level);
        assert!(current.save_playback_speed);
        assert!(!current.fast_seeking);
        assert_eq!(current.resume, Resume::Ask);
        assert_eq!(current.aspect_ratio, AspectRatio::Crop);
    }

    #[test]
    fn test_playback_speed_is_clamped() {
        let (_dir, service) = service();
        let vm = PlayerSettingsViewModel::new(service);

        vm.set_playback_speed(1_000).unwrap();
        assert_eq!(vm.current().playback_speed, MAX_PLAYBACK_SPEED);

        vm.set_playback_speed(1).unwrap();
        assert_eq!(vm.current().playback_speed, MIN_PLAYBACK_SPEED);
    }
}
