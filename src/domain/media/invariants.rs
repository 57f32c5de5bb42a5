use super::entity::MediaItem;
use crate::domain::{DomainError, DomainResult};

/// Validates all MediaItem invariants
pub fn validate_media(media: &MediaItem) -> DomainResult<()> {
    validate_path(media)?;
    validate_position(media)?;
    Ok(())
}

fn validate_path(media: &MediaItem) -> DomainResult<()> {
    if !media.path.is_absolute() {
        return Err(DomainError::InvariantViolation(format!(
            "Media path must be absolute: {:?}",
            media.path
        )));
    }
    Ok(())
}

/// Resume point never exceeds the duration (if known)
fn validate_position(media: &MediaItem) -> DomainResult<()> {
    if let Some(duration) = media.duration_ms {
        if media.last_played_position_ms > duration {
            return Err(DomainError::PositionExceedsDuration {
                position: media.last_played_position_ms,
                duration,
            });
        }
    }
    Ok(())
}
