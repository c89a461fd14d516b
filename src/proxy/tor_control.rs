/*!
 * Minimal Tor control-port client.
 *
 * Only what identity rotation needs: PROTOCOLINFO, AUTHENTICATE and
 * SIGNAL NEWNYM. Authentication is a capability probe: strategies are tried
 * in order, each on a fresh connection because Tor drops the socket after a
 * failed AUTHENTICATE.
 */

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::errors::ProxyError;

// @const: PROTOCOLINFO auth line fields
static METHODS_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"METHODS=([A-Z0-9_,]+)").unwrap());
static COOKIEFILE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"COOKIEFILE="((?:[^"\\]|\\.)*)""#).unwrap()
});

/// One way of proving we may use the control port
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStrategy {
    /// Whatever the local daemon offers without a secret: NULL auth or the cookie file
    Ambient,
    /// `AUTHENTICATE ""`
    EmptyPassword,
    /// The configured control password
    Password(String),
}

impl AuthStrategy {
    /// Strategies in probe order; the password step is skipped when none is configured
    pub fn ordered(password: &str) -> Vec<Self> {
        let mut strategies = vec![Self::Ambient, Self::EmptyPassword];
        if !password.is_empty() {
            strategies.push(Self::Password(password.to_string()));
        }
        strategies
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Ambient => "cookie",
            Self::EmptyPassword => "empty password",
            Self::Password(_) => "password",
        }
    }
}

/// Outcome of establishing the control channel
#[derive(Debug)]
pub enum ControlState {
    /// Renewal on demand is available
    Authenticated {
        controller: TorController,
        strategy: AuthStrategy,
    },
    /// Proxying still works; identity changes only when Tor rotates circuits itself
    Degraded { reason: String },
}

impl ControlState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    /// Try each strategy in order until one authenticates
    pub async fn establish(
        address: &str,
        strategies: &[AuthStrategy],
        cookie_override: Option<&Path>,
        timeout: Duration,
    ) -> Self {
        let mut errors = Vec::new();

        for strategy in strategies {
            let mut controller = match TorController::connect(address, timeout).await {
                Ok(controller) => controller,
                Err(e) => {
                    // nothing is listening, later strategies would fail the same way
                    errors.push(format!("connect: {}", e));
                    break;
                }
            };

            match controller.authenticate(strategy, cookie_override).await {
                Ok(()) => {
                    info!("🧅 Tor control channel ready on {} ({})", address, strategy.label());
                    return Self::Authenticated {
                        controller,
                        strategy: strategy.clone(),
                    };
                }
                Err(e) => {
                    debug!("Tor auth via {} failed: {}", strategy.label(), e);
                    errors.push(format!("{}: {}", strategy.label(), e));
                }
            }
        }

        let reason = errors.join(" | ");
        warn!("Tor control channel unavailable: {}", reason);
        warn!("Identity renewal disabled, the SOCKS proxy is still used");
        Self::Degraded { reason }
    }
}

/// Reply from the control port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlReply {
    pub status: u16,
    pub lines: Vec<String>,
}

impl ControlReply {
    pub fn is_ok(&self) -> bool {
        self.status == 250
    }
}

/// Connected control-port session
#[derive(Debug)]
pub struct TorController {
    stream: BufReader<TcpStream>,
    // @field: Bound on connect and on each command round trip
    timeout: Duration,
}

impl TorController {
    /// Open a control connection; `timeout` also bounds every later command
    pub async fn connect(address: &str, timeout: Duration) -> Result<Self, ProxyError> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(address))
            .await
            .map_err(|_| ProxyError::ControlChannel(format!("connect to {} timed out", address)))??;
        Ok(Self {
            stream: BufReader::new(stream),
            timeout,
        })
    }

    /// Authenticate with one strategy
    pub async fn authenticate(
        &mut self,
        strategy: &AuthStrategy,
        cookie_override: Option<&Path>,
    ) -> Result<(), ProxyError> {
        let command = match strategy {
            AuthStrategy::Ambient => self.ambient_auth_command(cookie_override).await?,
            AuthStrategy::EmptyPassword => "AUTHENTICATE \"\"".to_string(),
            AuthStrategy::Password(password) => format!("AUTHENTICATE {}", quote(password)),
        };
        self.expect_ok(&command).await
    }

    /// Ask Tor for fresh circuits
    pub async fn new_identity(&mut self) -> Result<(), ProxyError> {
        self.expect_ok("SIGNAL NEWNYM").await
    }

    async fn ambient_auth_command(&mut self, cookie_override: Option<&Path>) -> Result<String, ProxyError> {
        let reply = self.command("PROTOCOLINFO 1").await?;
        if !reply.is_ok() {
            return Err(ProxyError::ControlChannel(format!(
                "PROTOCOLINFO rejected: {} {}",
                reply.status,
                reply.lines.join(" ")
            )));
        }
        let info = ProtocolInfo::from_reply(&reply);

        if info.methods.iter().any(|m| m == "NULL") {
            return Ok("AUTHENTICATE".to_string());
        }
        if !info.methods.iter().any(|m| m == "COOKIE") {
            return Err(ProxyError::ControlChannel(format!(
                "no ambient credential offered (methods: {})",
                info.methods.join(",")
            )));
        }

        let cookie_path = cookie_override
            .map(Path::to_path_buf)
            .or(info.cookie_file)
            .ok_or_else(|| ProxyError::ControlChannel("cookie auth offered without COOKIEFILE".to_string()))?;
        let cookie = tokio::fs::read(&cookie_path).await?;
        Ok(format!("AUTHENTICATE {}", to_hex(&cookie)))
    }

    async fn expect_ok(&mut self, command: &str) -> Result<(), ProxyError> {
        let reply = self.command(command).await?;
        if reply.is_ok() {
            Ok(())
        } else {
            Err(ProxyError::ControlChannel(format!(
                "{} {}",
                reply.status,
                reply.lines.join(" ")
            )))
        }
    }

    /// Send one command line and read the complete reply
    pub async fn command(&mut self, command: &str) -> Result<ControlReply, ProxyError> {
        let timeout = self.timeout;
        let verb = command.split_whitespace().next().unwrap_or_default().to_string();
        tokio::time::timeout(timeout, self.round_trip(command))
            .await
            .map_err(|_| ProxyError::ControlChannel(format!("{} got no reply within {:?}", verb, timeout)))?
    }

    async fn round_trip(&mut self, command: &str) -> Result<ControlReply, ProxyError> {
        let stream = self.stream.get_mut();
        stream.write_all(command.as_bytes()).await?;
        stream.write_all(b"\r\n").await?;
        stream.flush().await?;
        self.read_reply().await
    }

    async fn read_reply(&mut self) -> Result<ControlReply, ProxyError> {
        let mut lines = Vec::new();
        loop {
            let line = self.read_line().await?;
            if line.len() < 4 {
                return Err(ProxyError::ControlChannel(format!("short reply line '{}'", line)));
            }
            let status: u16 = line
                .get(..3)
                .and_then(|code| code.parse().ok())
                .ok_or_else(|| ProxyError::ControlChannel(format!("bad status in '{}'", line)))?;
            let separator = line.as_bytes()[3];
            if !matches!(separator, b' ' | b'-' | b'+') {
                return Err(ProxyError::ControlChannel(format!("bad separator in '{}'", line)));
            }
            // the separator is ASCII, so byte 4 starts a character
            lines.push(line[4..].to_string());

            match separator {
                b' ' => return Ok(ControlReply { status, lines }),
                b'+' => loop {
                    // data block terminated by a lone "."
                    let data = self.read_line().await?;
                    if data == "." {
                        break;
                    }
                    lines.push(data);
                },
                _ => {}
            }
        }
    }

    async fn read_line(&mut self) -> Result<String, ProxyError> {
        let mut line = String::new();
        let read = self.stream.read_line(&mut line).await?;
        if read == 0 {
            return Err(ProxyError::ControlChannel("connection closed".to_string()));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Auth-related fields from a PROTOCOLINFO reply
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ProtocolInfo {
    pub methods: Vec<String>,
    pub cookie_file: Option<PathBuf>,
}

impl ProtocolInfo {
    pub fn from_reply(reply: &ControlReply) -> Self {
        let mut info = Self::default();
        for line in reply.lines.iter().filter(|l| l.starts_with("AUTH ")) {
            if let Some(caps) = METHODS_REGEX.captures(line) {
                info.methods = caps[1].split(',').map(str::to_string).collect();
            }
            if let Some(caps) = COOKIEFILE_REGEX.captures(line) {
                info.cookie_file = Some(PathBuf::from(unescape(&caps[1])));
            }
        }
        info
    }
}

fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}
