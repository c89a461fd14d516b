/*!
 * Persistence for the vocabulary database.
 *
 * - `schema`: `words` table creation and column checks
 * - `connection`: thread-safe SQLite handle
 * - `repository`: pending-row selection and outcome writes
 * - `models`: row types and the placeholder text
 */

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::sentence_window::WindowResult;

pub mod schema;
pub mod connection;
pub mod repository;
pub mod models;

// Re-export main types
pub use connection::DatabaseConnection;
pub use models::{PendingItem, SENTINEL_TEXT};
pub use repository::Repository;

/// Storage the batch controller reads work from and writes outcomes to.
///
/// Every write is committed before it returns.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Rows to process, in store order
    async fn select_pending(&self, limit: usize, reprocess_threshold: Option<f64>) -> Result<Vec<PendingItem>>;

    /// Store a caption window
    async fn write_result(&self, id: i64, window: &WindowResult, lang: &str, timestamp: DateTime<Utc>) -> Result<()>;

    /// Store placeholder text for a row with no usable window
    async fn write_sentinel(&self, id: i64, text: &str) -> Result<()>;
}
