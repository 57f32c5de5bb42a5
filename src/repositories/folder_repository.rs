// src/repositories/folder_repository.rs
//
// Folder Repository
//
// Plain data mapping over the `folder` table plus the folder → media join.
// Writes announce `Table::Folder` so live queries refresh.

use crate::db::{ConnectionPool, InvalidationTracker, LiveQuery, Table};
use crate::domain::folder::{Folder, FolderWithMedia};
use crate::error::{AppError, AppResult};
use crate::repositories::media_repository::SqliteMediaRepository;
use crate::repositories::rows::{parse_timestamp, parse_uuid};
use rusqlite::Row;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

const FOLDER_COLUMNS: &str = "id, path, name, created_at";

// ---------------------------------------------------------------------
// Repository contract
// ---------------------------------------------------------------------
pub trait FolderRepository: Send + Sync {
    fn save(&self, folder: &Folder) -> AppResult<()>;

    /// Insert unless a folder with the same path exists. Returns `false` when it did.
    fn insert_if_absent(&self, folder: &Folder) -> AppResult<bool>;

    fn get_by_id(&self, id: Uuid) -> AppResult<Option<Folder>>;

    fn get_by_path(&self, path: &Path) -> AppResult<Option<Folder>>;

    fn exists(&self, path: &Path) -> AppResult<bool>;

    fn list_all(&self) -> AppResult<Vec<Folder>>;

    fn delete(&self, id: Uuid) -> AppResult<()>;

    /// Remove folders that no longer own any media. Returns how many were removed.
    fn delete_empty(&self) -> AppResult<usize>;

    fn list_with_media(&self) -> AppResult<Vec<FolderWithMedia>>;

    fn get_with_media(&self, id: Uuid) -> AppResult<Option<FolderWithMedia>>;

    /// Live join of every folder with its media
    fn watch_with_media(&self) -> LiveQuery<Vec<FolderWithMedia>>;

    /// Live join for a single folder
    fn watch_folder(&self, id: Uuid) -> LiveQuery<Option<FolderWithMedia>>;
}

pub struct SqliteFolderRepository {
    pool: Arc<ConnectionPool>,
    tracker: InvalidationTracker,
}

impl SqliteFolderRepository {
    pub fn new(pool: Arc<ConnectionPool>, tracker: InvalidationTracker) -> Self {
        Self { pool, tracker }
    }

    pub(crate) fn row_to_folder(row: &Row) -> rusqlite::Result<Folder> {
        let id_str: String = row.get("id")?;
        let path_str: String = row.get("path")?;
        let created_at_str: String = row.get("created_at")?;

        Ok(Folder {
            id: parse_uuid(0, "folder", &id_str)?,
            path: PathBuf::from(path_str),
            name: row.get("name")?,
            created_at: parse_timestamp(3, "created_at", &created_at_str)?,
        })
    }

    fn query_with_media(pool: &ConnectionPool) -> AppResult<Vec<FolderWithMedia>> {
        let conn = pool.get()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM folder ORDER BY path",
            FOLDER_COLUMNS
        ))?;
        let folders = stmt
            .query_map([], Self::row_to_folder)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut by_folder: HashMap<Uuid, Vec<_>> = HashMap::new();
        for media in SqliteMediaRepository::query_all(&conn)? {
            by_folder.entry(media.folder_id).or_default().push(media);
        }

        Ok(folders
            .into_iter()
            .map(|folder| {
                let media = by_folder.remove(&folder.id).unwrap_or_default();
                FolderWithMedia { folder, media }
            })
            .collect())
    }

    fn query_folder_with_media(
        pool: &ConnectionPool,
        id: Uuid,
    ) -> AppResult<Option<FolderWithMedia>> {
        let conn = pool.get()?;

        let result = conn.query_row(
            &format!("SELECT {} FROM folder WHERE id = ?1", FOLDER_COLUMNS),
            rusqlite::params![id.to_string()],
            Self::row_to_folder,
        );
        let folder = match result {
            Ok(folder) => folder,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(AppError::Database(e)),
        };

        let media = SqliteMediaRepository::query_by_folder(&conn, id)?;
        Ok(Some(FolderWithMedia { folder, media }))
    }

    fn query_one(&self, sql: &str, param: String) -> AppResult<Option<Folder>> {
        let conn = self.pool.get()?;
        let result = conn.query_row(sql, rusqlite::params![param], Self::row_to_folder);

        match result {
            Ok(folder) => Ok(Some(folder)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AppError::Database(e)),
        }
    }
}

// ---------------------------------------------------------------------
// SQLite Implementation
// ---------------------------------------------------------------------
impl FolderRepository for SqliteFolderRepository {
    fn save(&self, folder: &Folder) -> AppResult<()> {
        let conn = self.pool.get()?;
        // Upsert rather than REPLACE: a replace would cascade-delete the folder's media
        conn.execute(
            "INSERT INTO folder (id, path, name, created_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET path = excluded.path, name = excluded.name",
            rusqlite::params![
                folder.id.to_string(),
                folder.path.to_string_lossy().to_string(),
                folder.name,
                folder.created_at.to_rfc3339(),
            ],
        )?;
        self.tracker.notify(Table::Folder);
        Ok(())
    }

    fn insert_if_absent(&self, folder: &Folder) -> AppResult<bool> {
        let conn = self.pool.get()?;
        let written = conn.execute(
            "INSERT INTO folder (id, path, name, created_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(path) DO NOTHING",
            rusqlite::params![
                folder.id.to_string(),
                folder.path.to_string_lossy().to_string(),
                folder.name,
                folder.created_at.to_rfc3339(),
            ],
        )?;
        if written > 0 {
            self.tracker.notify(Table::Folder);
        }
        Ok(written > 0)
    }

    fn get_by_id(&self, id: Uuid) -> AppResult<Option<Folder>> {
        self.query_one(
            &format!("SELECT {} FROM folder WHERE id = ?1", FOLDER_COLUMNS),
            id.to_string(),
        )
    }

    fn get_by_path(&self, path: &Path) -> AppResult<Option<Folder>> {
        self.query_one(
            &format!("SELECT {} FROM folder WHERE path = ?1", FOLDER_COLUMNS),
            path.to_string_lossy().to_string(),
        )
    }

    fn exists(&self, path: &Path) -> AppResult<bool> {
        let conn = self.pool.get()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM folder WHERE path = ?1)",
            rusqlite::params![path.to_string_lossy().to_string()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn list_all(&self) -> AppResult<Vec<Folder>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM folder ORDER BY path",
            FOLDER_COLUMNS
        ))?;
        let folders = stmt
            .query_map([], Self::row_to_folder)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(folders)
    }

    fn delete(&self, id: Uuid) -> AppResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "DELETE FROM folder WHERE id = ?1",
            rusqlite::params![id.to_string()],
        )?;
        self.tracker.notify(Table::Folder);
        self.tracker.notify(Table::Media);
        Ok(())
    }

    fn delete_empty(&self) -> AppResult<usize> {
        let conn = self.pool.get()?;
        let removed = conn.execute(
            "DELETE FROM folder WHERE NOT EXISTS (SELECT 1 FROM media WHERE media.folder_id = folder.id)",
            [],
        )?;
        if removed > 0 {
            self.tracker.notify(Table::Folder);
        }
        Ok(removed)
    }

    fn list_with_media(&self) -> AppResult<Vec<FolderWithMedia>> {
        Self::query_with_media(&self.pool)
    }

    fn get_with_media(&self, id: Uuid) -> AppResult<Option<FolderWithMedia>> {
        Self::query_folder_with_media(&self.pool, id)
    }

    fn watch_with_media(&self) -> LiveQuery<Vec<FolderWithMedia>> {
        let pool = Arc::clone(&self.pool);
        LiveQuery::new(&self.tracker, &[Table::Folder, Table::Media], move || {
            Self::query_with_media(&pool)
        })
    }

    fn watch_folder(&self, id: Uuid) -> LiveQuery<Option<FolderWithMedia>> {
        let pool = Arc::clone(&self.pool);
        LiveQuery::new(&self.tracker, &[Table::Folder, Table::Media], move || {
            Self::query_folder_with_media(&pool, id)
        })
    }
}
