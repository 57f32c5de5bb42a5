// src/repositories/mod.rs
//
// Repository layer
//
// RULES:
// - Repositories are plain data mappers over the catalog tables
// - No business logic, no event emission
// - Writes announce the touched table to the invalidation tracker
// - Explicit SQL only

pub mod folder_repository;
pub mod media_repository;
mod rows;

pub use folder_repository::{FolderRepository, SqliteFolderRepository};
pub use media_repository::{MediaRepository, SqliteMediaRepository};
