// src/application/mod.rs
//
// Application Layer
//
// ARCHITECTURE:
// - Sits above services and the player
// - View-models expose observable state and take user actions
// - No UI toolkit code; a shell drives these types

pub mod media_screen;
pub mod settings;
pub mod state;

pub use media_screen::{FolderUiState, MediaScreenViewModel, MediaUiState, SyncState};
pub use settings::{InterfaceSettingsViewModel, PlayerSettingsViewModel};
pub use state::AppState;
