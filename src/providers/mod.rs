/*!
 * Caption provider boundary.
 *
 * Providers fetch timed captions for one video through a given egress identity.
 * Whatever went wrong on the wire is mapped once, here, into the closed
 * [`FetchOutcome`] set so the batch controller never inspects error text.
 *
 * - `youtube`: HTTP adapter for the public watch page and timed-text endpoint
 * - `mock`: scripted provider for tests
 */

use async_trait::async_trait;
use std::fmt;

use crate::caption_parser::Chunk;
use crate::errors::ProviderError;

/// Opaque credential forwarded to the provider untouched
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// never print the credential itself
impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthToken(***)")
    }
}

/// Result of one fetch attempt
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Ordered chunks and the language of the track they came from
    Success { chunks: Vec<Chunk>, lang: String },
    /// No usable captions in the requested language; terminal for the item
    NoCaptions,
    /// Throttled or blocked; worth retrying from another identity
    RateLimited(String),
    /// Anything else
    Fatal(String),
}

impl FetchOutcome {
    /// Short label for log lines
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::NoCaptions => "no captions",
            Self::RateLimited(_) => "rate limited",
            Self::Fatal(_) => "fatal",
        }
    }
}

impl From<Result<(Vec<Chunk>, String), ProviderError>> for FetchOutcome {
    fn from(result: Result<(Vec<Chunk>, String), ProviderError>) -> Self {
        match result {
            Ok((chunks, _)) if chunks.is_empty() => Self::NoCaptions,
            Ok((chunks, lang)) => Self::Success { chunks, lang },
            Err(ProviderError::NoCaptions(_)) => Self::NoCaptions,
            Err(e) if e.is_rate_limited() => Self::RateLimited(e.to_string()),
            Err(e) => Self::Fatal(e.to_string()),
        }
    }
}

/// Source of timed captions
#[async_trait]
pub trait CaptionProvider: Send + Sync {
    /// Fetch captions for `video_id`, sending traffic through `egress` when given
    async fn fetch_captions(
        &self,
        video_id: &str,
        egress: Option<&str>,
        auth: Option<&AuthToken>,
    ) -> FetchOutcome;
}

pub mod mock;
pub mod youtube;
