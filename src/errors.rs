/*!
 * Error types for the vocabclip application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 */

use thiserror::Error;

/// Errors raised by the caption provider transport before they are mapped
/// into a [`crate::providers::FetchOutcome`]
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The video has no captions in the requested language
    #[error("No captions found for language '{0}'")]
    NoCaptions(String),

    /// The provider throttled the request
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// The provider refused to serve the egress identity (bot check, ban page)
    #[error("Request blocked: {0}")]
    Blocked(String),

    /// Non-success HTTP status not covered by the variants above
    #[error("Provider responded with error: {status_code} - {message}")]
    Http {
        /// HTTP status code
        status_code: u16,
        /// Truncated response body
        message: String,
    },

    /// Connection, TLS, proxy or timeout failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// The provider answered but the content could not be interpreted
    #[error("Malformed provider data: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Whether this failure is worth retrying from a different egress identity
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::RateLimited(_) | Self::Blocked(_) => true,
            Self::Http { status_code, .. } => matches!(status_code, 403 | 429),
            _ => false,
        }
    }
}

/// Errors that can occur while decoding caption payloads
#[derive(Error, Debug)]
pub enum CaptionError {
    /// The payload is not a timed-event document
    #[error("Malformed caption payload: {0}")]
    MalformedPayload(String),
}

impl From<CaptionError> for ProviderError {
    fn from(error: CaptionError) -> Self {
        match error {
            CaptionError::MalformedPayload(detail) => Self::Malformed(detail),
        }
    }
}

/// Errors that can occur while setting up or rotating egress identities
#[derive(Error, Debug)]
pub enum ProxyError {
    /// List mode was requested with no usable endpoints
    #[error("Proxy pool is empty")]
    EmptyPool,

    /// An endpoint could not be parsed as a proxy URL
    #[error("Invalid proxy endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        /// The offending entry
        endpoint: String,
        /// Parser message
        reason: String,
    },

    /// The Tor control port rejected a command or spoke an unexpected dialect
    #[error("Control channel error: {0}")]
    ControlChannel(String),

    /// Socket or file failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
