/*!
 * Egress identity rotation.
 *
 * The rotator is created once per run and owned by the batch controller. Its
 * mode is fixed at construction; only `rotate` mutates the state.
 */

use anyhow::Result;
use log::{info, warn};
use std::path::Path;
use std::time::Duration;

use crate::app_config::{EgressConfig, EgressMode, TorConfig};
use crate::errors::ProxyError;
use crate::proxy::tor_control::{AuthStrategy, ControlState};
use crate::proxy::{load_proxy_list, normalize_endpoint};

/// Retry ceiling outside list mode
pub const DEFAULT_RETRY_CEILING: u32 = 3;

/// Mode-specific rotation state
#[derive(Debug)]
pub enum ProxyState {
    /// Requests go out directly
    Direct,

    /// Round-robin over a fixed pool; a single proxy is a pool of one
    Pool { pool: Vec<String>, cursor: usize },

    /// Local Tor SOCKS endpoint, renewed through the control channel when available
    Tor {
        endpoint: String,
        control: ControlState,
        settle: Duration,
        fallback_wait: Duration,
    },
}

/// Hands out the current egress identity and replaces it on demand
#[derive(Debug)]
pub struct ProxyRotator {
    state: ProxyState,
    rotations: usize,
}

impl ProxyRotator {
    /// Direct connection, rotation is a no-op
    pub fn direct() -> Self {
        Self::with_state(ProxyState::Direct)
    }

    /// Round-robin pool; fails when the pool is empty
    pub fn pool(pool: Vec<String>) -> Result<Self, ProxyError> {
        if pool.is_empty() {
            return Err(ProxyError::EmptyPool);
        }
        Ok(Self::with_state(ProxyState::Pool { pool, cursor: 0 }))
    }

    /// Tor mode with an already established (or degraded) control channel
    pub fn tor(endpoint: impl Into<String>, control: ControlState, settle: Duration, fallback_wait: Duration) -> Self {
        Self::with_state(ProxyState::Tor {
            endpoint: endpoint.into(),
            control,
            settle,
            fallback_wait,
        })
    }

    /// Build the rotator for the configured egress mode.
    ///
    /// Tor mode probes the control port here; failing to authenticate leaves the
    /// rotator degraded instead of failing the run.
    pub async fn from_config(egress: &EgressConfig) -> Result<Self> {
        match egress.mode {
            EgressMode::None => Ok(Self::direct()),
            EgressMode::Single => {
                let proxy = normalize_endpoint(egress.proxy.as_deref().unwrap_or(""))?;
                Ok(Self::pool(vec![proxy])?)
            }
            EgressMode::List => {
                let mut pool = match &egress.proxy_list_file {
                    Some(file) => load_proxy_list(Path::new(file))?,
                    None => Vec::new(),
                };
                for proxy in &egress.proxies {
                    pool.push(normalize_endpoint(proxy)?);
                }
                Ok(Self::pool(pool)?)
            }
            EgressMode::Tor => Ok(Self::connect_tor(&egress.tor).await),
        }
    }

    async fn connect_tor(tor: &TorConfig) -> Self {
        let strategies = AuthStrategy::ordered(&tor.password);
        let control = ControlState::establish(
            &tor.control_address(),
            &strategies,
            tor.cookie_file.as_deref().map(Path::new),
            Duration::from_millis(tor.control_timeout_ms),
        )
        .await;
        Self::tor(
            tor.socks_endpoint(),
            control,
            Duration::from_millis(tor.newnym_settle_ms),
            Duration::from_millis(tor.fallback_wait_ms),
        )
    }

    fn with_state(state: ProxyState) -> Self {
        Self { state, rotations: 0 }
    }

    /// Current egress identity, `None` for direct connections
    pub fn current(&self) -> Option<&str> {
        match &self.state {
            ProxyState::Direct => None,
            ProxyState::Pool { pool, cursor } => pool.get(*cursor).map(String::as_str),
            ProxyState::Tor { endpoint, .. } => Some(endpoint.as_str()),
        }
    }

    /// Switch to a new identity and return it.
    ///
    /// Pool mode advances the cursor. Tor mode sends NEWNYM and waits for the
    /// circuit to settle, or waits the longer fallback interval when degraded.
    pub async fn rotate(&mut self) -> Option<String> {
        self.rotations += 1;

        match &mut self.state {
            ProxyState::Direct => None,
            ProxyState::Pool { pool, cursor } => {
                *cursor = (*cursor + 1) % pool.len();
                let proxy = pool[*cursor].clone();
                info!("🔄 Switched proxy to {}", proxy);
                Some(proxy)
            }
            ProxyState::Tor {
                endpoint,
                control,
                settle,
                fallback_wait,
            } => {
                let renewal = match control {
                    ControlState::Authenticated { controller, .. } => controller.new_identity().await.err(),
                    ControlState::Degraded { .. } => None,
                };
                if let Some(e) = renewal {
                    warn!("Tor identity renewal failed, falling back to waiting: {}", e);
                    *control = ControlState::Degraded { reason: e.to_string() };
                }

                if control.is_authenticated() {
                    tokio::time::sleep(*settle).await;
                    info!("🔄 Tor identity renewed");
                } else {
                    info!("⏳ Tor control unavailable, waiting {:?} for a circuit change", fallback_wait);
                    tokio::time::sleep(*fallback_wait).await;
                }
                Some(endpoint.clone())
            }
        }
    }

    /// How many times `rotate` was called
    pub fn rotations(&self) -> usize {
        self.rotations
    }

    /// Per-item rotation ceiling: the override, else the pool size in pool
    /// mode, else [`DEFAULT_RETRY_CEILING`]
    pub fn retry_ceiling(&self, configured: Option<u32>) -> u32 {
        if let Some(ceiling) = configured {
            return ceiling;
        }
        match &self.state {
            ProxyState::Pool { pool, .. } => (pool.len() as u32).max(1),
            _ => DEFAULT_RETRY_CEILING,
        }
    }

    /// Rotation state
    pub fn state(&self) -> &ProxyState {
        &self.state
    }

    /// Human readable mode for the startup banner
    pub fn describe(&self) -> String {
        match &self.state {
            ProxyState::Direct => "direct".to_string(),
            ProxyState::Pool { pool, .. } => format!("pool of {}", pool.len()),
            ProxyState::Tor { control, .. } if control.is_authenticated() => "tor".to_string(),
            ProxyState::Tor { .. } => "tor (degraded)".to_string(),
        }
    }
}
