/*!
 * Egress identity management.
 *
 * - `rotator`: the pool/Tor rotation state owned by the batch controller
 * - `tor_control`: Tor control-port client and authentication strategies
 */

use anyhow::{Context, Result};
use log::info;
use std::path::Path;
use url::Url;

use crate::errors::ProxyError;

pub mod rotator;
pub mod tor_control;

pub use rotator::{ProxyRotator, ProxyState, DEFAULT_RETRY_CEILING};
pub use tor_control::{AuthStrategy, ControlState, TorController};

/// Add a `socks5://` scheme to bare `host:port` entries and check the result parses
pub fn normalize_endpoint(raw: &str) -> Result<String, ProxyError> {
    let raw = raw.trim();
    let endpoint = if raw.starts_with("http") || raw.starts_with("socks") {
        raw.to_string()
    } else {
        format!("socks5://{}", raw)
    };

    let parsed = Url::parse(&endpoint).map_err(|e| ProxyError::InvalidEndpoint {
        endpoint: raw.to_string(),
        reason: e.to_string(),
    })?;
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(ProxyError::InvalidEndpoint {
            endpoint: raw.to_string(),
            reason: "missing host".to_string(),
        });
    }

    Ok(endpoint)
}

/// Parse proxy list content: one endpoint per line, `#` comments and blank lines ignored
pub fn parse_proxy_list(content: &str) -> Result<Vec<String>, ProxyError> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(normalize_endpoint)
        .collect()
}

/// Load a proxy list file
pub fn load_proxy_list(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read proxy list: {:?}", path))?;
    let proxies = parse_proxy_list(&content)
        .with_context(|| format!("Invalid entry in proxy list: {:?}", path))?;
    info!("📋 Loaded {} proxies from {:?}", proxies.len(), path);
    Ok(proxies)
}
