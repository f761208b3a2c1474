use std::fmt;
use std::time::Duration;

use serde_derive::Deserialize;

use crate::error::{Error, Result};

pub const TELEGRAM_HOST: &str = "api.telegram.org";
pub const TELEGRAM_PORT: u16 = 443;
pub const DEFAULT_MIN_UPDATE_INTERVAL_MS: u64 = 500;
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;

/// Settings for a [`Bot`](crate::Bot).
///
/// Deserializes from JSON with every field but `token` optional:
///
/// ```
/// let config: telepoll::BotConfig =
///     serde_json::from_str(r#"{"token": "123:abc", "min_update_interval_ms": 2000}"#).unwrap();
/// assert_eq!(config.host, "api.telegram.org");
/// assert_eq!(config.min_update_interval().as_millis(), 2000);
/// ```
#[derive(Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct BotConfig {
    pub token: String,
    pub host: String,
    pub port: u16,
    pub min_update_interval_ms: u64,
    pub read_timeout_ms: u64,
    pub connect_timeout_ms: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        BotConfig {
            token: String::new(),
            host: TELEGRAM_HOST.into(),
            port: TELEGRAM_PORT,
            min_update_interval_ms: DEFAULT_MIN_UPDATE_INTERVAL_MS,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }
}

impl BotConfig {
    pub fn new<S: Into<String>>(token: S) -> Self {
        BotConfig {
            token: token.into(),
            ..Default::default()
        }
    }

    pub fn with_host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_min_update_interval(mut self, interval: Duration) -> Self {
        self.min_update_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn min_update_interval(&self) -> Duration {
        Duration::from_millis(self.min_update_interval_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.token.is_empty() {
            return Err(Error::InvalidConfig("token is empty".into()));
        }
        if self.token.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(Error::InvalidConfig(
                "token contains whitespace or '/'".into(),
            ));
        }
        if self.host.is_empty() {
            return Err(Error::InvalidConfig("host is empty".into()));
        }
        if self.min_update_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "min_update_interval_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("token", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("min_update_interval_ms", &self.min_update_interval_ms)
            .field("read_timeout_ms", &self.read_timeout_ms)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .finish()
    }
}
