//! Server configuration parameters
//!
//! All tunable parameters for the line-protocol server. Values come from
//! [`ServerConfig::default`] and can be overridden by a JSON file; fields
//! missing from the file keep their defaults.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Raw-socket port conventionally used by SCPI instruments.
pub const DEFAULT_PORT: u16 = 5025;

/// Core server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    // --- Listener ---
    /// Address to bind, e.g. `"0.0.0.0"` or `"127.0.0.1"`
    pub bind_address: String,
    /// TCP port; `0` lets the OS pick one
    pub port: u16,

    // --- Framing ---
    /// Line terminator, exactly one ASCII character
    pub line_terminator: String,
    /// Size of a single socket read (bytes)
    pub recv_buffer_size: usize,

    // --- Timing ---
    /// How often the accept loop re-checks the shutdown flag (milliseconds)
    pub accept_poll_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".into(),
            port: DEFAULT_PORT,

            line_terminator: "\n".into(),
            recv_buffer_size: 1024,

            accept_poll_interval_ms: 50,
        }
    }
}

impl ServerConfig {
    /// Load and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_json(&text)
    }

    /// Parse and validate a JSON config document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bytes = self.line_terminator.as_bytes();
        if bytes.len() != 1 || !bytes[0].is_ascii() {
            return Err(ConfigError::ValidationFailed(
                "line_terminator must be exactly one ASCII character",
            ));
        }
        if self.recv_buffer_size == 0 {
            return Err(ConfigError::ValidationFailed("recv_buffer_size must be > 0"));
        }
        if self.accept_poll_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "accept_poll_interval_ms must be > 0",
            ));
        }
        self.socket_addr()?;
        Ok(())
    }

    /// The terminator byte. Falls back to `\n` on an unvalidated config.
    pub fn terminator(&self) -> u8 {
        match self.line_terminator.as_bytes() {
            [b] if b.is_ascii() => *b,
            _ => b'\n',
        }
    }

    pub fn accept_poll_interval(&self) -> Duration {
        Duration::from_millis(self.accept_poll_interval_ms)
    }

    /// Listener address built from `bind_address` and `port`.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .map_err(|_| ConfigError::ValidationFailed("bind_address is not an IP address"))
    }

    /// Loopback config on an OS-assigned port, for tests and tools.
    pub fn loopback() -> Self {
        Self {
            bind_address: "127.0.0.1".into(),
            port: 0,
            ..Self::default()
        }
    }
}
