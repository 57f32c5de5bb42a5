// src/domain/mod.rs
//
// Domain Root - The Single Source of Truth for Domain API
//
// All other modules import from `crate::domain::*`

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod folder;
pub mod media;
pub mod preferences;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Folder Domain
pub use folder::{validate_folder, Folder, FolderWithMedia};

// Media Domain
pub use media::{is_hidden_path, validate_media, MediaInfo, MediaItem, TrackKind};

// Preferences Domain
pub use preferences::{
    AspectRatio, InterfacePreferences, PlayerPreferences, Resume, SortBy, SortOrder, Theme,
};

// ============================================================================
// DOMAIN ERROR TYPES
// ============================================================================

use thiserror::Error;

/// Domain-level errors
/// These represent violations of business rules and invariants
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Position {position}ms exceeds duration {duration}ms")]
    PositionExceedsDuration { position: u64, duration: u64 },

    #[error("Entity not found: {0}")]
    NotFound(String),
}

/// Domain result type
pub type DomainResult<T> = Result<T, DomainError>;
