/*!
 * Vocabulary table layout.
 *
 * The `words` table belongs to the vocabulary application; this tool only
 * reads pending rows and writes caption windows back. A fresh database gets the
 * table created, an existing one is checked for the columns we touch.
 */

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use rusqlite::Connection;

/// Columns read or written by the refiner
pub const REQUIRED_COLUMNS: [&str; 7] = [
    "original",
    "videoId",
    "startTime",
    "endTime",
    "subtitleText",
    "subtitleLang",
    "subtitleUpdatedAt",
];

/// Make sure the `words` table is usable
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    if !table_exists(conn, "words")? {
        info!("Creating words table in fresh database");
        conn.execute_batch(
            r#"
            CREATE TABLE words (
                original          TEXT NOT NULL,
                videoId           TEXT,
                startTime         REAL,
                endTime           REAL,
                subtitleText      TEXT,
                subtitleLang      TEXT,
                subtitleUpdatedAt TEXT
            );
            "#,
        )
        .context("Failed to create words table")?;
        return Ok(());
    }

    let missing = missing_columns(conn)?;
    if !missing.is_empty() {
        return Err(anyhow!(
            "Table 'words' is missing required column(s): {}",
            missing.join(", ")
        ));
    }

    debug!("words table has all required columns");
    Ok(())
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            [name],
            |row| row.get(0),
        )
        .with_context(|| format!("Failed to check {} table existence", name))?;
    Ok(count > 0)
}

/// Required columns absent from an existing `words` table
pub fn missing_columns(conn: &Connection) -> Result<Vec<&'static str>> {
    let mut stmt = conn.prepare("PRAGMA table_info(words)")?;
    let present = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<String>>>()?;

    Ok(REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|column| !present.iter().any(|p| p.eq_ignore_ascii_case(column)))
        .collect())
}
