// src/infrastructure/mod.rs
//
// Infrastructure Layer
//
// Implementation details that support the domain
// but are not part of the domain itself.

pub mod preferences_store;

pub use preferences_store::{
    open_preference_stores, InterfacePreferencesStore, PlayerPreferencesStore, PreferencesStore,
};
