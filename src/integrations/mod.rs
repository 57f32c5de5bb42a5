// src/integrations/mod.rs
//
// External Integrations Module
//
// Concrete playback engines live here; everything above `player` only sees
// the `PlaybackEngine` trait.

pub mod mpv;

#[cfg(unix)]
pub use mpv::{MpvClient, MpvEngine};
