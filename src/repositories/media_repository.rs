// src/repositories/media_repository.rs
//
// Media Repository
//
// Mapping over the `media` table. Every write announces `Table::Media`.

use crate::db::{ConnectionPool, InvalidationTracker, LiveQuery, Table};
use crate::domain::media::{MediaItem, TrackKind};
use crate::error::{AppError, AppResult};
use crate::repositories::rows::{parse_timestamp, parse_uuid};
use chrono::Utc;
use rusqlite::{Connection, Row};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

const MEDIA_COLUMNS: &str = "id, folder_id, path, title, duration_ms, size, width, height, \
     frame_rate, thumbnail_path, last_played_position_ms, audio_track_id, subtitle_track_id, \
     modified_at, created_at, updated_at";

// ---------------------------------------------------------------------
// Repository contract
// ---------------------------------------------------------------------
pub trait MediaRepository: Send + Sync {
    /// Insert or update by id. Keyed by id so the row never gets re-created.
    fn save(&self, media: &MediaItem) -> AppResult<()>;

    /// Insert unless an item with the same path exists. Returns `false` when it did.
    fn insert_if_absent(&self, media: &MediaItem) -> AppResult<bool>;

    fn get_by_id(&self, id: Uuid) -> AppResult<Option<MediaItem>>;

    fn get_by_path(&self, path: &Path) -> AppResult<Option<MediaItem>>;

    fn exists(&self, path: &Path) -> AppResult<bool>;

    fn list_all(&self) -> AppResult<Vec<MediaItem>>;

    fn list_by_folder(&self, folder_id: Uuid) -> AppResult<Vec<MediaItem>>;

    fn delete(&self, id: Uuid) -> AppResult<()>;

    /// Store a resume point for the item at `path`.
    /// Clamped into `[0, duration]` when the duration is known. Returns `false` for unknown paths.
    fn update_last_played_position(&self, path: &Path, position_ms: u64) -> AppResult<bool>;

    /// Record a duration measured after the scan. Only fills an unknown duration,
    /// and pulls the resume point back inside it. Returns `false` when nothing changed.
    fn update_duration(&self, path: &Path, duration_ms: u64) -> AppResult<bool>;

    /// Remember the audio or subtitle track chosen for the item at `path`
    fn update_track(&self, path: &Path, kind: TrackKind, format_id: Option<&str>)
        -> AppResult<bool>;

    /// Live list of every media item
    fn watch_all(&self) -> LiveQuery<Vec<MediaItem>>;
}

pub struct SqliteMediaRepository {
    pool: Arc<ConnectionPool>,
    tracker: InvalidationTracker,
}

impl SqliteMediaRepository {
    pub fn new(pool: Arc<ConnectionPool>, tracker: InvalidationTracker) -> Self {
        Self { pool, tracker }
    }

    fn row_to_media(row: &Row) -> rusqlite::Result<MediaItem> {
        let id_str: String = row.get("id")?;
        let folder_id_str: String = row.get("folder_id")?;
        let path_str: String = row.get("path")?;
        let duration_ms: Option<i64> = row.get("duration_ms")?;
        let size: i64 = row.get("size")?;
        let width: i64 = row.get("width")?;
        let height: i64 = row.get("height")?;
        let thumbnail: Option<String> = row.get("thumbnail_path")?;
        let position: i64 = row.get("last_played_position_ms")?;
        let modified_at_str: String = row.get("modified_at")?;
        let created_at_str: String = row.get("created_at")?;
        let updated_at_str: String = row.get("updated_at")?;

        Ok(MediaItem {
            id: parse_uuid(0, "media", &id_str)?,
            folder_id: parse_uuid(1, "folder_id", &folder_id_str)?,
            path: PathBuf::from(path_str),
            title: row.get("title")?,
            duration_ms: duration_ms.map(|d| d.max(0) as u64),
            size: size.max(0) as u64,
            width: width.max(0) as u32,
            height: height.max(0) as u32,
            frame_rate: row.get("frame_rate")?,
            thumbnail_path: thumbnail.map(PathBuf::from),
            last_played_position_ms: position.max(0) as u64,
            audio_track_id: row.get("audio_track_id")?,
            subtitle_track_id: row.get("subtitle_track_id")?,
            modified_at: parse_timestamp(13, "modified_at", &modified_at_str)?,
            created_at: parse_timestamp(14, "created_at", &created_at_str)?,
            updated_at: parse_timestamp(15, "updated_at", &updated_at_str)?,
        })
    }

    pub(crate) fn query_all(conn: &Connection) -> AppResult<Vec<MediaItem>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM media ORDER BY path",
            MEDIA_COLUMNS
        ))?;
        let media = stmt
            .query_map([], Self::row_to_media)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(media)
    }

    pub(crate) fn query_by_folder(conn: &Connection, folder_id: Uuid) -> AppResult<Vec<MediaItem>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM media WHERE folder_id = ?1 ORDER BY path",
            MEDIA_COLUMNS
        ))?;
        let media = stmt
            .query_map(rusqlite::params![folder_id.to_string()], Self::row_to_media)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(media)
    }

    /// `INSERT` every column, resolving conflicts with `on_conflict`. Returns the rows written.
    fn insert(&self, media: &MediaItem, on_conflict: &str) -> AppResult<usize> {
        let conn = self.pool.get()?;
        let written = conn.execute(
            &format!(
                "INSERT INTO media ({}) VALUES
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
                 {}",
                MEDIA_COLUMNS, on_conflict
            ),
            rusqlite::params![
                media.id.to_string(),
                media.folder_id.to_string(),
                media.path.to_string_lossy().to_string(),
                media.title,
                media.duration_ms.map(|d| d as i64),
                media.size as i64,
                media.width as i64,
                media.height as i64,
                media.frame_rate,
                media
                    .thumbnail_path
                    .as_ref()
                    .map(|p| p.to_string_lossy().to_string()),
                media.last_played_position_ms as i64,
                media.audio_track_id,
                media.subtitle_track_id,
                media.modified_at.to_rfc3339(),
                media.created_at.to_rfc3339(),
                media.updated_at.to_rfc3339(),
            ],
        )?;
        if written > 0 {
            self.tracker.notify(Table::Media);
        }
        Ok(written)
    }

    fn query_one(&self, sql: &str, param: String) -> AppResult<Option<MediaItem>> {
        let conn = self.pool.get()?;
        let result = conn.query_row(sql, rusqlite::params![param], Self::row_to_media);

        match result {
            Ok(media) => Ok(Some(media)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AppError::Database(e)),
        }
    }
}

// ---------------------------------------------------------------------
// SQLite Implementation
// ---------------------------------------------------------------------
impl MediaRepository for SqliteMediaRepository {
    fn save(&self, media: &MediaItem) -> AppResult<()> {
        self.insert(
            media,
            "ON CONFLICT(id) DO UPDATE SET
                folder_id = excluded.folder_id,
                path = excluded.path,
                title = excluded.title,
                duration_ms = excluded.duration_ms,
                size = excluded.size,
                width = excluded.width,
                height = excluded.height,
                frame_rate = excluded.frame_rate,
                thumbnail_path = excluded.thumbnail_path,
                last_played_position_ms = excluded.last_played_position_ms,
                audio_track_id = excluded.audio_track_id,
                subtitle_track_id = excluded.subtitle_track_id,
                modified_at = excluded.modified_at,
                updated_at = excluded.updated_at",
        )?;
        Ok(())
    }

    fn insert_if_absent(&self, media: &MediaItem) -> AppResult<bool> {
        Ok(self.insert(media, "ON CONFLICT(path) DO NOTHING")? > 0)
    }

    fn get_by_id(&self, id: Uuid) -> AppResult<Option<MediaItem>> {
        self.query_one(
            &format!("SELECT {} FROM media WHERE id = ?1", MEDIA_COLUMNS),
            id.to_string(),
        )
    }

    fn get_by_path(&self, path: &Path) -> AppResult<Option<MediaItem>> {
        self.query_one(
            &format!("SELECT {} FROM media WHERE path = ?1", MEDIA_COLUMNS),
            path.to_string_lossy().to_string(),
        )
    }

    fn exists(&self, path: &Path) -> AppResult<bool> {
        let conn = self.pool.get()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM media WHERE path = ?1)",
            rusqlite::params![path.to_string_lossy().to_string()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn list_all(&self) -> AppResult<Vec<MediaItem>> {
        let conn = self.pool.get()?;
        Self::query_all(&conn)
    }

    fn list_by_folder(&self, folder_id: Uuid) -> AppResult<Vec<MediaItem>> {
        let conn = self.pool.get()?;
        Self::query_by_folder(&conn, folder_id)
    }

    fn delete(&self, id: Uuid) -> AppResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "DELETE FROM media WHERE id = ?1",
            rusqlite::params![id.to_string()],
        )?;
        self.tracker.notify(Table::Media);
        Ok(())
    }

    fn update_last_played_position(&self, path: &Path, position_ms: u64) -> AppResult<bool> {
        let conn = self.pool.get()?;
        let updated = conn.execute(
            "UPDATE media
             SET last_played_position_ms = CASE
                     WHEN duration_ms IS NOT NULL AND ?2 > duration_ms THEN duration_ms
                     ELSE ?2
                 END,
                 updated_at = ?3
             WHERE path = ?1",
            rusqlite::params![
                path.to_string_lossy().to_string(),
                position_ms.min(i64::MAX as u64) as i64,
                Utc::now().to_rfc3339(),
            ],
        )?;
        if updated > 0 {
            self.tracker.notify(Table::Media);
        }
        Ok(updated > 0)
    }

    fn update_duration(&self, path: &Path, duration_ms: u64) -> AppResult<bool> {
        let duration = duration_ms.min(i64::MAX as u64) as i64;
        let conn = self.pool.get()?;
        let updated = conn.execute(
            "UPDATE media
             SET duration_ms = ?2,
                 last_played_position_ms = MIN(last_played_position_ms, ?2),
                 updated_at = ?3
             WHERE path = ?1 AND duration_ms IS NULL",
            rusqlite::params![
                path.to_string_lossy().to_string(),
                duration,
                Utc::now().to_rfc3339(),
            ],
        )?;
        if updated > 0 {
            self.tracker.notify(Table::Media);
        }
        Ok(updated > 0)
    }

    fn update_track(
        &self,
        path: &Path,
        kind: TrackKind,
        format_id: Option<&str>,
    ) -> AppResult<bool> {
        let column = match kind {
            TrackKind::Audio => "audio_track_id",
            TrackKind::Subtitle => "subtitle_track_id",
        };
        let conn = self.pool.get()?;
        let updated = conn.execute(
            &format!(
                "UPDATE media SET {} = ?2, updated_at = ?3 WHERE path = ?1",
                column
            ),
            rusqlite::params![
                path.to_string_lossy().to_string(),
                format_id,
                Utc::now().to_rfc3339(),
            ],
        )?;
        if updated > 0 {
            self.tracker.notify(Table::Media);
        }
        Ok(updated > 0)
    }

    fn watch_all(&self) -> LiveQuery<Vec<MediaItem>> {
        let pool = Arc::clone(&self.pool);
        LiveQuery::new(&self.tracker, &[Table::Media], move || {
            let conn = pool.get()?;
            Self::query_all(&conn)
        })
    }
}
