//! Configuration management for the Shellgate gateway.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/shellgate/config.toml`.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("listen address is not a valid socket address: {0}")]
    InvalidListenAddr(String),

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),

    #[error("bind_timeout_secs must be at most 86400, got {0}")]
    InvalidBindTimeout(u64),

    #[error("term must not be empty")]
    EmptyTermType,

    #[error("terminal geometry must be non-zero, got {rows}x{cols}")]
    InvalidTermGeometry { rows: u16, cols: u16 },

    #[error("connect_timeout_secs must be between 1 and 600, got {0}")]
    InvalidConnectTimeout(u64),

    #[error("default_port must be non-zero")]
    InvalidDefaultPort,
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,

    /// Session relay configuration.
    pub session: SessionConfig,

    /// SSH connector configuration.
    pub ssh: SshConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP server listens on.
    pub listen: String,

    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,
}

/// Session relay configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Seconds a pending session may wait for a client to attach before it
    /// is terminated. `0` disables the timeout.
    pub bind_timeout_secs: u64,

    /// Terminal type requested for the remote pseudo-terminal.
    pub term: String,

    /// Initial terminal rows.
    pub term_rows: u16,

    /// Initial terminal columns. Deliberately generous so long lines do not
    /// wrap server-side before the client sends its real geometry.
    pub term_cols: u16,
}

/// SSH connector configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SshConfig {
    /// Port used when a session request does not specify one.
    pub default_port: u16,

    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bind_timeout_secs: 60,
            term: "xterm".to_string(),
            term_rows: 20,
            term_cols: 400,
        }
    }
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            default_port: 22,
            connect_timeout_secs: 30,
        }
    }
}

impl SessionConfig {
    /// Bind timeout as a duration, or `None` when disabled.
    pub fn bind_timeout(&self) -> Option<Duration> {
        (self.bind_timeout_secs > 0).then(|| Duration::from_secs(self.bind_timeout_secs))
    }
}

impl SshConfig {
    /// Connect timeout as a duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("shellgate")
        .join("config.toml")
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - SHELLGATE_LISTEN: Override the HTTP listen address
    /// - SHELLGATE_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(listen) = std::env::var("SHELLGATE_LISTEN") {
            if !listen.is_empty() {
                tracing::info!("Overriding listen address from environment: {}", listen);
                self.server.listen = listen;
            }
        }

        if let Ok(level) = std::env::var("SHELLGATE_LOG_LEVEL") {
            if !level.is_empty() {
                tracing::info!("Overriding log_level from environment: {}", level);
                self.server.log_level = level;
            }
        }
    }

    /// Validate the configuration values.
    ///
    /// Returns an error if any configuration value is outside the valid range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.listen.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::InvalidListenAddr(self.server.listen.clone()));
        }

        let level = self.server.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.server.log_level.clone()));
        }

        // Cap at one day; anything longer is a leak, not a timeout.
        if self.session.bind_timeout_secs > 86400 {
            return Err(ConfigError::InvalidBindTimeout(
                self.session.bind_timeout_secs,
            ));
        }

        if self.session.term.is_empty() {
            return Err(ConfigError::EmptyTermType);
        }

        if self.session.term_rows == 0 || self.session.term_cols == 0 {
            return Err(ConfigError::InvalidTermGeometry {
                rows: self.session.term_rows,
                cols: self.session.term_cols,
            });
        }

        if self.ssh.connect_timeout_secs < 1 || self.ssh.connect_timeout_secs > 600 {
            return Err(ConfigError::InvalidConnectTimeout(
                self.ssh.connect_timeout_secs,
            ));
        }

        if self.ssh.default_port == 0 {
            return Err(ConfigError::InvalidDefaultPort);
        }

        Ok(())
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    /// If the file exists but is invalid TOML, returns an error with
    /// a helpful message.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }

    /// Save configuration to a file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = self.to_toml()?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}
