// src/integrations/mpv/mod.rs
//
// mpv-backed playback engine
//
// `properties` is pure translation and builds everywhere. The process and
// socket parts need Unix domain sockets.

pub mod properties;

#[cfg(unix)]
pub mod client;
#[cfg(unix)]
pub mod engine;

pub use properties::{diff, parse_track_list, parse_video_params, MpvSnapshot, POLLED_PROPERTIES};

#[cfg(unix)]
pub use client::MpvClient;
#[cfg(unix)]
pub use engine::MpvEngine;
