/*!
 * # vocabclip - caption windows for vocabulary words
 *
 * Finds, for each word in a vocabulary database, the short stretch of its
 * source video where the word is spoken, and stores the window and sentence
 * back on the row.
 *
 * ## Features
 *
 * - Timed-caption decoding with non-speech annotation cleanup
 * - Sentence-aware window extraction with a hard duration bound
 * - Egress rotation over a proxy pool or Tor, with identity renewal
 * - Rate-limit retries, randomized pacing and a consecutive-failure breaker
 * - Resumable batches over a SQLite vocabulary table
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `caption_parser`: Caption payload decoding into chunks
 * - `sentence_window`: Window extraction around a word
 * - `proxy`: Egress identity rotation:
 *   - `proxy::rotator`: pool/Tor rotation state
 *   - `proxy::tor_control`: Tor control-port client
 * - `providers`: Caption provider boundary:
 *   - `providers::youtube`: HTTP caption adapter
 *   - `providers::mock`: scripted provider for tests
 * - `database`: Vocabulary persistence
 * - `app_controller`: Batch controller
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod caption_parser;
pub mod sentence_window;
pub mod proxy;
pub mod providers;
pub mod database;
pub mod app_controller;
pub mod errors;

// Re-export main types for easier usage
pub use app_config::Config;
pub use app_controller::{BatchReport, BatchTermination, Controller, ItemOutcome};
pub use caption_parser::{Chunk, ChunkParser};
pub use database::{PersistenceGateway, Repository};
pub use errors::{CaptionError, ProviderError, ProxyError};
pub use providers::{CaptionProvider, FetchOutcome};
pub use proxy::ProxyRotator;
pub use sentence_window::{WindowFinder, WindowResult};
