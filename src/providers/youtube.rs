use async_trait::async_trait;
use log::{debug, trace};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{header, Client, Proxy, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::app_config::ProviderConfig;
use crate::caption_parser::{Chunk, ChunkParser};
use crate::errors::ProviderError;
use crate::providers::{AuthToken, CaptionProvider, FetchOutcome};

// @module: Caption fetching from the YouTube watch page and timed-text endpoint

// @const: Markers of the interstitial served to flagged clients
static BOT_CHECK_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(unusual traffic|g-recaptcha|/sorry/index|confirm you.re not a bot)").unwrap()
});

const PLAYER_RESPONSE_MARKER: &str = "ytInitialPlayerResponse";

/// Player response subset carrying the caption track list
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerResponse {
    #[serde(default)]
    playability_status: Option<PlayabilityStatus>,
    #[serde(default)]
    captions: Option<PlayerCaptions>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayabilityStatus {
    #[serde(default)]
    status: String,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlayerCaptions {
    #[serde(rename = "playerCaptionsTracklistRenderer")]
    tracklist: Tracklist,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Tracklist {
    #[serde(default)]
    caption_tracks: Vec<CaptionTrack>,
}

/// One caption track advertised by the player
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTrack {
    /// Timed-text URL, absolute or relative to the endpoint
    pub base_url: String,
    /// BCP-47 language code
    pub language_code: String,
    /// `asr` for automatic captions
    #[serde(default)]
    pub kind: Option<String>,
}

impl CaptionTrack {
    fn is_automatic(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }

    fn matches_language(&self, language: &str) -> bool {
        let code = self.language_code.to_lowercase();
        let language = language.to_lowercase();
        code == language || code.starts_with(&format!("{}-", language))
    }
}

/// HTTP caption provider
#[derive(Debug, Clone)]
pub struct YoutubeCaptions {
    endpoint: String,
    language: String,
    timeout: Duration,
    user_agent: String,
}

impl YoutubeCaptions {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            language: config.language.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            user_agent: config.user_agent.clone(),
        }
    }

    /// One client per egress identity; reqwest binds proxies at build time
    fn build_client(&self, egress: Option<&str>) -> Result<Client, ProviderError> {
        let builder = Client::builder().timeout(self.timeout).user_agent(&self.user_agent);
        let builder = match egress {
            Some(proxy) => {
                let proxy = Proxy::all(proxy)
                    .map_err(|e| ProviderError::Transport(format!("invalid proxy {}: {}", proxy, e)))?;
                builder.proxy(proxy)
            }
            // direct means direct, not whatever HTTP_PROXY says
            None => builder.no_proxy(),
        };
        builder.build().map_err(|e| ProviderError::Transport(e.to_string()))
    }

    async fn fetch(
        &self,
        video_id: &str,
        egress: Option<&str>,
        auth: Option<&AuthToken>,
    ) -> Result<(Vec<Chunk>, String), ProviderError> {
        let client = self.build_client(egress)?;

        let watch_url = format!("{}/watch?v={}&hl={}", self.endpoint, video_id, self.language);
        let page = get_text(&client, &watch_url, auth).await?;
        if BOT_CHECK_REGEX.is_match(&page) {
            return Err(ProviderError::Blocked("bot check page served".to_string()));
        }

        let player = parse_player_response(&page)?;
        if let Some(status) = &player.playability_status {
            if status.status == "LOGIN_REQUIRED" {
                let reason = status.reason.clone().unwrap_or_default();
                return Err(ProviderError::Blocked(format!("login required: {}", reason)));
            }
        }

        let tracks = player
            .captions
            .map(|captions| captions.tracklist.caption_tracks)
            .unwrap_or_default();
        let track = select_track(&tracks, &self.language)
            .ok_or_else(|| ProviderError::NoCaptions(self.language.clone()))?;
        debug!(
            "Using {} track '{}' for {}",
            if track.is_automatic() { "automatic" } else { "manual" },
            track.language_code,
            video_id
        );

        let captions_url = timed_text_url(&self.endpoint, &track.base_url)?;
        let payload = get_text(&client, captions_url.as_str(), auth).await?;
        trace!("Timed-text payload for {}: {} bytes", video_id, payload.len());

        let chunks = ChunkParser::parse(&payload)?;
        Ok((chunks, self.language.clone()))
    }
}

#[async_trait]
impl CaptionProvider for YoutubeCaptions {
    async fn fetch_captions(&self, video_id: &str, egress: Option<&str>, auth: Option<&AuthToken>) -> FetchOutcome {
        FetchOutcome::from(self.fetch(video_id, egress, auth).await)
    }
}

async fn get_text(client: &Client, url: &str, auth: Option<&AuthToken>) -> Result<String, ProviderError> {
    let mut request = client.get(url).header(header::ACCEPT_LANGUAGE, "en-US,en;q=0.9");
    if let Some(token) = auth {
        request = request.header(header::COOKIE, token.as_str());
    }

    let response = request.send().await.map_err(|e| ProviderError::Transport(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(classify_status(status, &body));
    }

    response.text().await.map_err(|e| ProviderError::Transport(e.to_string()))
}

/// Map a non-success HTTP status to a provider error
pub fn classify_status(status: StatusCode, body: &str) -> ProviderError {
    let message: String = body.chars().take(200).collect();
    match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited(format!("{} {}", status.as_u16(), message)),
        StatusCode::NOT_FOUND => ProviderError::NoCaptions(format!("not found: {}", message)),
        _ if BOT_CHECK_REGEX.is_match(body) => ProviderError::Blocked(message),
        _ => ProviderError::Http {
            status_code: status.as_u16(),
            message,
        },
    }
}

/// Pick the manual track for `language`, else the automatic one
pub fn select_track<'a>(tracks: &'a [CaptionTrack], language: &str) -> Option<&'a CaptionTrack> {
    let mut candidates = tracks.iter().filter(|t| t.matches_language(language));
    let manual = candidates.clone().find(|t| !t.is_automatic());
    manual.or_else(|| candidates.next())
}

/// Resolve the track URL against the endpoint and force the json3 format
pub fn timed_text_url(endpoint: &str, base_url: &str) -> Result<Url, ProviderError> {
    let base = Url::parse(&format!("{}/", endpoint))
        .map_err(|e| ProviderError::Malformed(format!("invalid endpoint {}: {}", endpoint, e)))?;
    let mut url = base
        .join(base_url)
        .map_err(|e| ProviderError::Malformed(format!("invalid caption url {}: {}", base_url, e)))?;

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "fmt")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    url.query_pairs_mut().clear().extend_pairs(pairs).append_pair("fmt", "json3");
    Ok(url)
}

fn parse_player_response(page: &str) -> Result<PlayerResponse, ProviderError> {
    let json = extract_json_object(page, PLAYER_RESPONSE_MARKER)
        .ok_or_else(|| ProviderError::Malformed("player response not found in watch page".to_string()))?;
    serde_json::from_str(json).map_err(|e| ProviderError::Malformed(format!("player response: {}", e)))
}

/// Slice out the JSON object assigned right after `marker`, honoring strings
/// so braces inside caption names do not end the scan early
pub fn extract_json_object<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    let after_marker = text.find(marker)? + marker.len();
    let start = after_marker + text[after_marker..].find('{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, byte) in text.as_bytes()[start..].iter().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}
