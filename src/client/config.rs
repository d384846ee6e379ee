//! Client configuration - passed in by the embedding layer

use crate::connection::{Backoff, ReconnectPolicy};
use crate::error::{ClientError, ClientResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_URL: &str = "ws://127.0.0.1:8000/ws";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub url: String,
    pub auto_reconnect: bool,
    pub reconnect_delay_ms: u64,
    pub max_reconnect_attempts: u32,
    pub request_timeout_ms: u64,
    pub backoff: Backoff,
    /// Upper bound for exponential backoff
    pub max_reconnect_delay_ms: u64,
    /// Run the auth handshake after the socket opens
    pub authenticate: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.into(),
            auto_reconnect: true,
            reconnect_delay_ms: 1_000,
            max_reconnect_attempts: 5,
            request_timeout_ms: 10_000,
            backoff: Backoff::Fixed,
            max_reconnect_delay_ms: 30_000,
            authenticate: true,
        }
    }
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), ..Default::default() }
    }
    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self { self.auto_reconnect = enabled; self }
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self { self.reconnect_delay_ms = delay.as_millis() as u64; self }
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self { self.max_reconnect_attempts = attempts; self }
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self { self.request_timeout_ms = timeout.as_millis() as u64; self }
    pub fn with_authentication(mut self, enabled: bool) -> Self { self.authenticate = enabled; self }
    pub fn with_exponential_backoff(mut self, max_delay: Duration) -> Self {
        self.backoff = Backoff::Exponential;
        self.max_reconnect_delay_ms = max_delay.as_millis() as u64;
        self
    }

    pub fn request_timeout(&self) -> Duration { Duration::from_millis(self.request_timeout_ms) }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        let delay = Duration::from_millis(self.reconnect_delay_ms);
        match self.backoff {
            Backoff::Fixed => ReconnectPolicy::fixed(delay),
            Backoff::Exponential => ReconnectPolicy::exponential(delay, Duration::from_millis(self.max_reconnect_delay_ms)),
        }
    }

    /// Defaults overridden by `BEELINK_*` environment variables.
    pub fn from_env() -> ClientResult<Self> {
        let mut config = Self::default();
        if let Some(url) = env("BEELINK_URL") {
            config.url = url;
        }
        if let Some(v) = env("BEELINK_AUTO_RECONNECT") {
            config.auto_reconnect = parse_bool("BEELINK_AUTO_RECONNECT", &v)?;
        }
        if let Some(v) = env("BEELINK_RECONNECT_DELAY_MS") {
            config.reconnect_delay_ms = parse_num("BEELINK_RECONNECT_DELAY_MS", &v)?;
        }
        if let Some(v) = env("BEELINK_MAX_RECONNECT_ATTEMPTS") {
            config.max_reconnect_attempts = parse_num("BEELINK_MAX_RECONNECT_ATTEMPTS", &v)?;
        }
        if let Some(v) = env("BEELINK_REQUEST_TIMEOUT_MS") {
            config.request_timeout_ms = parse_num("BEELINK_REQUEST_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = env("BEELINK_BACKOFF") {
            config.backoff = Backoff::parse(&v)
                .ok_or_else(|| ClientError::Config(format!("BEELINK_BACKOFF: unknown backoff '{v}'")))?;
        }
        if let Some(v) = env("BEELINK_AUTHENTICATE") {
            config.authenticate = parse_bool("BEELINK_AUTHENTICATE", &v)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file; missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> ClientResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ClientError::Io(format!("config read: {e}")))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| ClientError::Config(format!("config json: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ClientResult<()> {
        if self.url.trim().is_empty() {
            return Err(ClientError::Config("url is empty".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(ClientError::Config("request_timeout_ms must be > 0".into()));
        }
        Ok(())
    }
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(key: &str, value: &str) -> ClientResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ClientError::Config(format!("{key}: expected a boolean, got '{value}'"))),
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> ClientResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ClientError::Config(format!("{key}: expected a number, got '{value}'")))
}
