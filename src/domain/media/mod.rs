pub mod entity;
pub mod invariants;

pub use entity::{is_hidden_path, MediaInfo, MediaItem, TrackKind};
pub use invariants::validate_media;
