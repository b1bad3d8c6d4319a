//! SQLite catalog of uploaded videos and rendered word clouds.
//!
//! Schema:
//! - videos: id, stem, filename, size, upload_time
//! - wordclouds: stem, size, created_at

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use vscribe_models::{ArtifactKind, Stem, VideoRecord, WordCloudRecord};

use crate::error::{StorageError, StorageResult};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS videos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    stem TEXT NOT NULL UNIQUE,
    filename TEXT NOT NULL,
    size INTEGER NOT NULL,
    upload_time TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS wordclouds (
    stem TEXT PRIMARY KEY,
    size INTEGER NOT NULL,
    created_at TEXT NOT NULL
);
";

/// Catalog connection wrapper.
pub struct Catalog {
    conn: Mutex<Connection>,
}

impl Catalog {
    /// Open or create the catalog at `path`.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory catalog (for testing).
    pub fn in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::catalog("catalog connection lock poisoned"))
    }

    pub fn ping(&self) -> StorageResult<()> {
        self.conn()?.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // videos
    // ------------------------------------------------------------------

    pub fn insert_video(&self, stem: &Stem, filename: &str, size: u64) -> StorageResult<VideoRecord> {
        let upload_time = Utc::now();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO videos (stem, filename, size, upload_time) VALUES (?1, ?2, ?3, ?4)",
            params![stem.as_str(), filename, size as i64, upload_time],
        )?;
        Ok(VideoRecord {
            id: conn.last_insert_rowid(),
            stem: stem.to_string(),
            filename: filename.to_string(),
            size,
            upload_time,
        })
    }

    pub fn list_videos(&self) -> StorageResult<Vec<VideoRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT id, stem, filename, size, upload_time FROM videos ORDER BY id",
        )?;
        let rows = stmt.query_map([], video_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn get_video(&self, id: i64) -> StorageResult<Option<VideoRecord>> {
        Ok(self
            .conn()?
            .query_row(
                "SELECT id, stem, filename, size, upload_time FROM videos WHERE id = ?1",
                params![id],
                video_from_row,
            )
            .optional()?)
    }

    /// Returns true if a row was removed.
    pub fn delete_video(&self, id: i64) -> StorageResult<bool> {
        let rows = self
            .conn()?
            .execute("DELETE FROM videos WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // ------------------------------------------------------------------
    // wordclouds
    // ------------------------------------------------------------------

    /// Insert or refresh the row for a rendered word cloud.
    pub fn upsert_wordcloud(&self, stem: &Stem, size: u64) -> StorageResult<WordCloudRecord> {
        let created_at = Utc::now();
        self.conn()?.execute(
            "INSERT INTO wordclouds (stem, size, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(stem) DO UPDATE SET size = excluded.size, created_at = excluded.created_at",
            params![stem.as_str(), size as i64, created_at],
        )?;
        Ok(WordCloudRecord {
            stem: stem.to_string(),
            size,
            created_at,
        })
    }

    pub fn get_wordcloud(&self, stem: &Stem) -> StorageResult<Option<WordCloudRecord>> {
        Ok(self
            .conn()?
            .query_row(
                "SELECT stem, size, created_at FROM wordclouds WHERE stem = ?1",
                params![stem.as_str()],
                |row| {
                    Ok(WordCloudRecord {
                        stem: row.get(0)?,
                        size: row.get::<_, i64>(1)? as u64,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    /// Remove the row tied to an artifact. Kinds without rows are a no-op.
    pub fn remove_rows_for(&self, kind: ArtifactKind, stem: &Stem) -> StorageResult<bool> {
        let sql = match kind {
            ArtifactKind::Video => "DELETE FROM videos WHERE stem = ?1",
            ArtifactKind::WordCloudImage => "DELETE FROM wordclouds WHERE stem = ?1",
            _ => return Ok(false),
        };
        let rows = self.conn()?.execute(sql, params![stem.as_str()])?;
        Ok(rows > 0)
    }
}

fn video_from_row(row: &Row<'_>) -> rusqlite::Result<VideoRecord> {
    let upload_time: DateTime<Utc> = row.get(4)?;
    Ok(VideoRecord {
        id: row.get(0)?,
        stem: row.get(1)?,
        filename: row.get(2)?,
        size: row.get::<_, i64>(3)? as u64,
        upload_time,
    })
}
