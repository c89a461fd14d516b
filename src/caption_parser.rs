use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use log::trace;

use crate::errors::CaptionError;

// @module: Caption payload decoding into timed text chunks

// @const: Bracketed non-speech annotations such as [Music] or [ Applause ]
static ANNOTATION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\[(?:music|applause|laughter|noise|\s)+\]").unwrap()
});

// @const: Any run of whitespace
static WHITESPACE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// A timed piece of caption text, in seconds
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    // @field: Cleaned caption text
    pub text: String,

    // @field: Start in seconds
    pub start: f64,

    // @field: End in seconds
    pub end: f64,
}

impl Chunk {
    /// Creates a chunk verbatim; text is not cleaned
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }

    /// Duration covered by this chunk
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

// json3 wire shapes; absent fields fall back to zero/empty like the provider does
#[derive(Debug, Deserialize)]
struct TimedTextDocument {
    #[serde(default)]
    events: Vec<TimedEvent>,
}

#[derive(Debug, Deserialize)]
struct TimedEvent {
    #[serde(rename = "tStartMs", default)]
    start_ms: u64,
    #[serde(rename = "dDurationMs", default)]
    duration_ms: u64,
    #[serde(default)]
    segs: Vec<TimedSegment>,
}

#[derive(Debug, Deserialize)]
struct TimedSegment {
    #[serde(default)]
    utf8: String,
}

/// Normalizes raw caption payloads into ordered chunks
pub struct ChunkParser;

impl ChunkParser {
    /// Parse a json3 timed-text payload.
    ///
    /// Returns an empty vector when the document has no textual events; callers
    /// must treat that as "no usable captions" rather than an error.
    pub fn parse(raw_payload: &str) -> Result<Vec<Chunk>, CaptionError> {
        let document: TimedTextDocument = serde_json::from_str(raw_payload)
            .map_err(|e| CaptionError::MalformedPayload(e.to_string()))?;

        let chunks: Vec<Chunk> = document
            .events
            .into_iter()
            .filter_map(|event| {
                let text: String = event.segs.iter().map(|s| s.utf8.as_str()).collect();
                let start_ms = event.start_ms;
                let end_ms = start_ms.saturating_add(event.duration_ms);
                Self::make_chunk(&text, start_ms as f64 / 1000.0, end_ms as f64 / 1000.0)
            })
            .collect();

        trace!("Parsed {} caption chunks", chunks.len());
        Ok(chunks)
    }

    /// Clean caption text: newlines to spaces, drop non-speech annotations,
    /// collapse whitespace
    pub fn clean(text: &str) -> String {
        let text = text.replace('\n', " ");
        let text = ANNOTATION_REGEX.replace_all(&text, "");
        WHITESPACE_REGEX.replace_all(&text, " ").trim().to_string()
    }

    fn make_chunk(raw_text: &str, start: f64, end: f64) -> Option<Chunk> {
        let text = Self::clean(raw_text);
        if text.is_empty() {
            return None;
        }
        Some(Chunk { text, start, end })
    }
}
