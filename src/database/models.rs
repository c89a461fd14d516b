/*!
 * Database entity models.
 */

use serde::{Deserialize, Serialize};

/// Placeholder stored when no caption window could be produced
pub const SENTINEL_TEXT: &str = "Check video for context";

/// A vocabulary row awaiting a caption window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingItem {
    /// SQLite rowid
    pub id: i64,
    /// The vocabulary word
    pub word: String,
    /// Video the word was collected from
    pub video_id: String,
}

impl PendingItem {
    pub fn new(id: i64, word: impl Into<String>, video_id: impl Into<String>) -> Self {
        Self {
            id,
            word: word.into(),
            video_id: video_id.into(),
        }
    }

    /// Rows without a word or video cannot be processed
    pub fn is_processable(&self) -> bool {
        !self.word.trim().is_empty() && !self.video_id.trim().is_empty()
    }
}

/// Caption window as stored on a row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredWindow {
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub subtitle_text: Option<String>,
    pub subtitle_lang: Option<String>,
    pub subtitle_updated_at: Option<String>,
}

impl StoredWindow {
    /// Whether this row carries the no-captions placeholder
    pub fn is_sentinel(&self) -> bool {
        self.subtitle_text.as_deref().map(str::trim) == Some(SENTINEL_TEXT)
    }
}
