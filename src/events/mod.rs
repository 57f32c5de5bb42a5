// src/events/mod.rs
//
// Internal Event System - Public API

pub mod bus;
pub mod types;

pub use types::DomainEvent;

pub use types::{
    // Library scanning
    DirectoryScanned,
    MediaItemDiscovered,
    MediaItemRemoved,

    // Playback
    PlaybackErrorOccurred,
    PlaybackStateSaved,
    TrackSelectionSaved,

    // Preferences
    InterfacePreferencesUpdated,
    PlayerPreferencesUpdated,
};

pub use bus::{EventBus, EventLogEntry};

/// Initialize a new event bus
pub fn create_event_bus() -> EventBus {
    EventBus::new()
}
