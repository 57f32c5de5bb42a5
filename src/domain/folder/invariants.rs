use super::entity::Folder;
use crate::domain::{DomainError, DomainResult};

/// Validates all Folder invariants
pub fn validate_folder(folder: &Folder) -> DomainResult<()> {
    if !folder.path.is_absolute() {
        return Err(DomainError::InvariantViolation(format!(
            "Folder path must be absolute: {:?}",
            folder.path
        )));
    }
    Ok(())
}
