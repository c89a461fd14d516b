use anyhow::{anyhow, Context, Result};
use log::{warn, LevelFilter};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::Path;
use std::time::Duration;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and writing the default configuration file.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Path to the SQLite vocabulary database
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Batch pacing and failure ceilings
    #[serde(default)]
    pub batch: BatchConfig,

    /// Caption window shaping
    #[serde(default)]
    pub window: WindowConfig,

    /// Egress identity selection
    #[serde(default)]
    pub egress: EgressConfig,

    /// Caption provider settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// How outgoing requests reach the caption provider
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EgressMode {
    // @mode: Direct connection
    #[default]
    None,
    // @mode: One fixed proxy endpoint
    Single,
    // @mode: Rotating pool of proxy endpoints
    List,
    // @mode: Local Tor SOCKS proxy with identity renewal
    Tor,
}

impl EgressMode {
    // @returns: Lowercase identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::None => "none".to_string(),
            Self::Single => "single".to_string(),
            Self::List => "list".to_string(),
            Self::Tor => "tor".to_string(),
        }
    }
}

impl std::fmt::Display for EgressMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for EgressMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "single" => Ok(Self::Single),
            "list" => Ok(Self::List),
            "tor" => Ok(Self::Tor),
            _ => Err(anyhow!("Invalid egress mode: {}", s)),
        }
    }
}

/// Egress configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct EgressConfig {
    /// Selected mode, fixed for the whole run
    #[serde(default)]
    pub mode: EgressMode,

    /// Endpoint for `single` mode
    #[serde(default)]
    pub proxy: Option<String>,

    /// File with one endpoint per line for `list` mode
    #[serde(default)]
    pub proxy_list_file: Option<String>,

    /// Inline endpoints for `list` mode, used after the file entries
    #[serde(default)]
    pub proxies: Vec<String>,

    /// Tor settings for `tor` mode
    #[serde(default)]
    pub tor: TorConfig,
}

/// Tor SOCKS and control port settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TorConfig {
    // @field: Tor host
    #[serde(default = "default_tor_host")]
    pub host: String,

    // @field: SOCKS port
    #[serde(default = "default_tor_socks_port")]
    pub socks_port: u16,

    // @field: Control port
    #[serde(default = "default_tor_control_port")]
    pub control_port: u16,

    // @field: Control port password (HashedControlPassword)
    #[serde(default = "String::new")]
    pub password: String,

    // @field: Cookie path overriding the one the control port reports
    #[serde(default)]
    pub cookie_file: Option<String>,

    // @field: Wait after NEWNYM so the new circuit is in place
    #[serde(default = "default_newnym_settle_ms")]
    pub newnym_settle_ms: u64,

    // @field: Wait used instead of NEWNYM when no control channel exists
    #[serde(default = "default_fallback_wait_ms")]
    pub fallback_wait_ms: u64,

    // @field: Control port connect timeout
    #[serde(default = "default_control_timeout_ms")]
    pub control_timeout_ms: u64,
}

impl Default for TorConfig {
    fn default() -> Self {
        Self {
            host: default_tor_host(),
            socks_port: default_tor_socks_port(),
            control_port: default_tor_control_port(),
            password: String::new(),
            cookie_file: None,
            newnym_settle_ms: default_newnym_settle_ms(),
            fallback_wait_ms: default_fallback_wait_ms(),
            control_timeout_ms: default_control_timeout_ms(),
        }
    }
}

impl TorConfig {
    /// SOCKS endpoint handed to the HTTP client; `socks5h` keeps DNS inside Tor
    pub fn socks_endpoint(&self) -> String {
        format!("socks5h://{}:{}", self.host, self.socks_port)
    }

    /// Control port address
    pub fn control_address(&self) -> String {
        format!("{}:{}", self.host, self.control_port)
    }
}

/// Batch processing configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BatchConfig {
    /// Maximum number of rows selected per run
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Per-item retry ceiling for rate-limited fetches.
    /// When unset: pool size in list mode, 3 otherwise.
    #[serde(default)]
    pub max_retries: Option<u32>,

    /// Lower bound of the pause between items, in seconds
    #[serde(default = "default_sleep_min_secs")]
    pub sleep_min_secs: f64,

    /// Upper bound of the pause between items, in seconds
    #[serde(default = "default_sleep_max_secs")]
    pub sleep_max_secs: f64,

    /// Consecutive failures that halt the batch
    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,

    /// When > 0, reprocess rows whose stored window is longer than this
    #[serde(default)]
    pub reprocess_long_secs: f64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            max_retries: None,
            sleep_min_secs: default_sleep_min_secs(),
            sleep_max_secs: default_sleep_max_secs(),
            max_consecutive_errors: default_max_consecutive_errors(),
            reprocess_long_secs: 0.0,
        }
    }
}

impl BatchConfig {
    /// Inter-item pause bounds; the upper bound never drops below the lower one
    pub fn pause_range(&self) -> (Duration, Duration) {
        let min = seconds_to_duration(self.sleep_min_secs);
        let max = seconds_to_duration(self.sleep_max_secs).max(min);
        (min, max)
    }

    /// Reprocess threshold, `None` when disabled
    pub fn reprocess_threshold(&self) -> Option<f64> {
        (self.reprocess_long_secs > 0.0).then_some(self.reprocess_long_secs)
    }
}

/// Caption window configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WindowConfig {
    /// Maximum window span in seconds
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: f64,

    /// Maximum chunks walked on each side looking for a sentence boundary
    #[serde(default = "default_max_expand")]
    pub max_expand: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: default_max_duration_secs(),
            max_expand: default_max_expand(),
        }
    }
}

/// Caption provider configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider base URL
    #[serde(default = "default_provider_endpoint")]
    pub endpoint: String,

    // @field: Caption language
    #[serde(default = "default_language")]
    pub language: String,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    // @field: User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    // @field: Opaque auth token forwarded as the Cookie header
    #[serde(default)]
    pub auth_token: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: default_provider_endpoint(),
            language: default_language(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            auth_token: None,
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    // @returns: Matching filter for the log facade
    pub fn to_level_filter(&self) -> LevelFilter {
        match self {
            Self::Error => LevelFilter::Error,
            Self::Warn => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
            Self::Trace => LevelFilter::Trace,
        }
    }
}

fn default_database_path() -> String {
    "./vocab.db".to_string()
}

fn default_limit() -> usize {
    100
}

fn default_sleep_min_secs() -> f64 {
    3.0
}

fn default_sleep_max_secs() -> f64 {
    8.0
}

fn default_max_consecutive_errors() -> u32 {
    10
}

fn default_max_duration_secs() -> f64 {
    15.0
}

fn default_max_expand() -> usize {
    6
}

fn default_tor_host() -> String {
    "127.0.0.1".to_string()
}

fn default_tor_socks_port() -> u16 {
    9050
}

fn default_tor_control_port() -> u16 {
    9051
}

fn default_newnym_settle_ms() -> u64 {
    3000 // circuits need a moment before the next attempt
}

fn default_fallback_wait_ms() -> u64 {
    15000
}

fn default_control_timeout_ms() -> u64 {
    5000
}

fn default_provider_endpoint() -> String {
    "https://www.youtube.com".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string()
}

/// Minimum accepted window bound, in seconds
pub use crate::sentence_window::MIN_WINDOW_SECS;

/// Longest accepted pause between items, in seconds
pub const MAX_PAUSE_SECS: f64 = 86_400.0;

// negative or NaN pauses are zero, oversized ones saturate
fn seconds_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX)
}

impl Config {
    /// Load the configuration file, writing a default one when it does not exist.
    ///
    /// Returns the configuration and whether it was freshly created.
    pub fn load_or_create(path: &Path) -> Result<(Self, bool)> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to open config file: {}", path.display()))?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            return Ok((config, false));
        }

        warn!("Config file not found at '{}', creating default config.", path.display());
        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write default config to file: {}", path.display()))?;
        Ok((config, true))
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.database_path.trim().is_empty() {
            return Err(anyhow!("Database path must not be empty"));
        }

        if self.batch.limit == 0 {
            return Err(anyhow!("Batch limit must be at least 1"));
        }
        if self.batch.max_consecutive_errors == 0 {
            return Err(anyhow!("max_consecutive_errors must be at least 1"));
        }
        let pause_in_range = |secs: f64| (0.0..=MAX_PAUSE_SECS).contains(&secs);
        if !pause_in_range(self.batch.sleep_min_secs) || !pause_in_range(self.batch.sleep_max_secs) {
            return Err(anyhow!(
                "Invalid pause range: {}..{}",
                self.batch.sleep_min_secs, self.batch.sleep_max_secs
            ));
        }
        if !(self.batch.reprocess_long_secs >= 0.0) {
            return Err(anyhow!("reprocess_long_secs must not be negative"));
        }

        if !(self.window.max_duration_secs >= MIN_WINDOW_SECS) || !self.window.max_duration_secs.is_finite() {
            return Err(anyhow!(
                "max_duration_secs must be a finite value of at least {} second(s)",
                MIN_WINDOW_SECS
            ));
        }

        if self.provider.language.trim().is_empty() {
            return Err(anyhow!("Caption language must not be empty"));
        }

        match self.egress.mode {
            EgressMode::Single => {
                let proxy = self.egress.proxy.as_deref().unwrap_or("");
                if proxy.trim().is_empty() {
                    return Err(anyhow!("Egress mode 'single' requires a proxy endpoint"));
                }
                crate::proxy::normalize_endpoint(proxy)?;
            }
            EgressMode::List => {
                if self.egress.proxy_list_file.is_none() && self.egress.proxies.is_empty() {
                    return Err(anyhow!("Egress mode 'list' requires proxy_list_file or proxies"));
                }
                for proxy in &self.egress.proxies {
                    crate::proxy::normalize_endpoint(proxy)?;
                }
            }
            EgressMode::Tor | EgressMode::None => {}
        }

        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: default_database_path(),
            batch: BatchConfig::default(),
            window: WindowConfig::default(),
            egress: EgressConfig::default(),
            provider: ProviderConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
