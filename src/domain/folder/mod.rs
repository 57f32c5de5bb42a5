pub mod entity;
pub mod invariants;

pub use entity::{Folder, FolderWithMedia};
pub use invariants::validate_folder;
