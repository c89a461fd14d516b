/*!
 * Repository layer for database operations.
 *
 * High-level access to the `words` table: selecting rows that still need a
 * caption window and writing outcomes back, one commit per write.
 */

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use rusqlite::{params, OptionalExtension};

use super::connection::DatabaseConnection;
use super::models::{PendingItem, StoredWindow, SENTINEL_TEXT};
use super::PersistenceGateway;
use crate::sentence_window::WindowResult;

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    /// Database connection
    db: DatabaseConnection,
}

impl Repository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Open the database file at `path`
    pub fn open(path: &str) -> Result<Self> {
        Ok(Self::new(DatabaseConnection::new(path)?))
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let db = DatabaseConnection::new_in_memory()?;
        Ok(Self::new(db))
    }

    /// Underlying connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Insert a vocabulary row, returning its rowid
    pub async fn insert_word(&self, word: &str, video_id: Option<&str>) -> Result<i64> {
        let word = word.to_string();
        let video_id = video_id.map(str::to_string);

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    "INSERT INTO words (original, videoId) VALUES (?1, ?2)",
                    params![word, video_id],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
    }

    /// Rows that need a caption window, in rowid order.
    ///
    /// Without a threshold: rows with a video and no usable caption text (NULL,
    /// blank or the placeholder). With a threshold: rows that already have text
    /// but a window longer than `threshold` seconds.
    pub async fn select_pending(&self, limit: usize, reprocess_threshold: Option<f64>) -> Result<Vec<PendingItem>> {
        let limit = i64::try_from(limit).map_err(|_| anyhow!("Batch limit too large: {}", limit))?;

        self.db
            .execute_async(move |conn| {
                let map_row = |row: &rusqlite::Row| -> rusqlite::Result<PendingItem> {
                    Ok(PendingItem {
                        id: row.get(0)?,
                        word: row.get(1)?,
                        video_id: row.get(2)?,
                    })
                };

                let items = match reprocess_threshold {
                    Some(threshold) => {
                        let mut stmt = conn.prepare(
                            r#"
                            SELECT rowid, original, videoId FROM words
                            WHERE COALESCE(videoId, '') != ''
                              AND length(COALESCE(original, '')) >= 2
                              AND subtitleText IS NOT NULL
                              AND TRIM(subtitleText) != ''
                              AND (endTime - startTime) > ?1
                            ORDER BY rowid
                            LIMIT ?2
                            "#,
                        )?;
                        let rows = stmt.query_map(params![threshold, limit], map_row)?;
                        rows.collect::<rusqlite::Result<Vec<_>>>()?
                    }
                    None => {
                        let mut stmt = conn.prepare(
                            r#"
                            SELECT rowid, original, videoId FROM words
                            WHERE COALESCE(videoId, '') != ''
                              AND length(COALESCE(original, '')) >= 2
                              AND (subtitleText IS NULL OR TRIM(subtitleText) IN ('', ?1))
                            ORDER BY rowid
                            LIMIT ?2
                            "#,
                        )?;
                        let rows = stmt.query_map(params![SENTINEL_TEXT, limit], map_row)?;
                        rows.collect::<rusqlite::Result<Vec<_>>>()?
                    }
                };

                debug!("Selected {} pending rows", items.len());
                Ok(items)
            })
            .await
    }

    /// Store a caption window with its language and update time
    pub async fn write_result(&self, id: i64, window: &WindowResult, lang: &str, timestamp: DateTime<Utc>) -> Result<()> {
        let window = window.clone();
        let lang = lang.to_string();
        let updated_at = format_timestamp(timestamp);

        self.db
            .transaction_async(move |tx| {
                let changed = tx.execute(
                    r#"
                    UPDATE words
                    SET startTime = ?1, endTime = ?2, subtitleText = ?3,
                        subtitleLang = ?4, subtitleUpdatedAt = ?5
                    WHERE rowid = ?6
                    "#,
                    params![window.start, window.end, window.sentence, lang, updated_at, id],
                )?;
                ensure_row_updated(changed, id)
            })
            .await
    }

    /// Store placeholder text; timing columns are left untouched
    pub async fn write_sentinel(&self, id: i64, text: &str) -> Result<()> {
        let text = text.to_string();

        self.db
            .transaction_async(move |tx| {
                let changed = tx.execute("UPDATE words SET subtitleText = ?1 WHERE rowid = ?2", params![text, id])?;
                ensure_row_updated(changed, id)
            })
            .await
    }

    /// Caption columns for one row
    pub async fn get_window(&self, id: i64) -> Result<Option<StoredWindow>> {
        self.db
            .execute_async(move |conn| {
                let window = conn
                    .query_row(
                        r#"
                        SELECT startTime, endTime, subtitleText, subtitleLang, subtitleUpdatedAt
                        FROM words WHERE rowid = ?1
                        "#,
                        [id],
                        |row| {
                            Ok(StoredWindow {
                                start_time: row.get(0)?,
                                end_time: row.get(1)?,
                                subtitle_text: row.get(2)?,
                                subtitle_lang: row.get(3)?,
                                subtitle_updated_at: row.get(4)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(window)
            })
            .await
    }
}

/// RFC 3339, UTC, whole seconds
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, false)
}

fn ensure_row_updated(changed: usize, id: i64) -> Result<()> {
    if changed == 0 {
        return Err(anyhow!("No words row with rowid {}", id));
    }
    Ok(())
}

#[async_trait]
impl PersistenceGateway for Repository {
    async fn select_pending(&self, limit: usize, reprocess_threshold: Option<f64>) -> Result<Vec<PendingItem>> {
        Repository::select_pending(self, limit, reprocess_threshold).await
    }

    async fn write_result(&self, id: i64, window: &WindowResult, lang: &str, timestamp: DateTime<Utc>) -> Result<()> {
        Repository::write_result(self, id, window, lang, timestamp).await
    }

    async fn write_sentinel(&self, id: i64, text: &str) -> Result<()> {
        Repository::write_sentinel(self, id, text).await
    }
}
