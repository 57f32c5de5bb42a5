// src/services/mod.rs
//
// Services Module - Orchestration Layer

pub mod library_service;
pub mod playback_service;
pub mod preferences_service;
pub mod probe;
pub mod scan_service;

// Re-export all services and their types
pub use library_service::{
    present_folders,
    present_media,
    LibraryService,
    SortedStream,
};

pub use playback_service::PlaybackService;

pub use preferences_service::{
    PreferencesService,
    MAX_PLAYBACK_SPEED,
    MIN_PLAYBACK_SPEED,
};

pub use probe::{
    parse_ffprobe_output,
    BasicProbe,
    FfprobeProbe,
    MediaProbe,
    StreamInfo,
};

pub use scan_service::{
    is_video_file,
    ScanService,
    ScanSummary,
    VIDEO_EXTENSIONS,
};
