//! Client configuration.
//!
//! # Format
//!
//! ```json
//! {
//!   "identity": "user-17",
//!   "logLevel": "debug",
//!   "server": { "host": "localhost", "port": 3000, "scheme": "http" },
//!   "sockets": { "defaultNamespace": "/chat", "defaultTimeout": 2000 }
//! }
//! ```
//!
//! Every field except `server.host` is optional.

// ============================================================================
// Imports
// ============================================================================

use std::net::Ipv6Addr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Timeout used when neither the action nor the session sets one.
pub const FALLBACK_TIMEOUT: Duration = Duration::from_millis(5000);

/// Log level used when none is configured.
pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::INFO;

// ============================================================================
// ServerConfig
// ============================================================================

/// Server endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host name or address.
    pub host: String,
    /// Port; defaults by scheme.
    #[serde(default)]
    pub port: Option<u16>,
    /// `http` or `https`.
    #[serde(default = "default_scheme")]
    pub scheme: String,
}

fn default_scheme() -> String {
    "http".to_string()
}

impl ServerConfig {
    /// Creates an `http` endpoint.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port: Some(port),
            scheme: default_scheme(),
        }
    }

    /// Sets the scheme.
    #[must_use]
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Returns the port, defaulted by scheme.
    #[must_use]
    pub fn effective_port(&self) -> u16 {
        self.port
            .unwrap_or(if self.scheme == "https" { 443 } else { 80 })
    }

    /// Validates the endpoint and returns its base URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an empty host or unsupported scheme.
    pub fn base_url(&self) -> Result<Url> {
        if self.host.trim().is_empty() {
            return Err(Error::config(
                "Server host is required. Use .server() to set it.\n\
                 Example: Client::builder().server(ServerConfig::new(\"localhost\", 3000))",
            ));
        }
        if self.scheme != "http" && self.scheme != "https" {
            return Err(Error::config(format!(
                "Unsupported server scheme {:?}; expected \"http\" or \"https\"",
                self.scheme
            )));
        }

        // IPv6 literals need brackets in the authority.
        let host = self.host.trim();
        let host = match host.parse::<Ipv6Addr>() {
            Ok(addr) => format!("[{addr}]"),
            Err(_) => host.to_string(),
        };

        let mut url = Url::parse(&format!("{}://{host}/", self.scheme))?;
        url.set_port(Some(self.effective_port()))
            .map_err(|()| Error::config(format!("Server host {host:?} cannot carry a port")))?;
        Ok(url)
    }
}

// ============================================================================
// SocketsConfig
// ============================================================================

/// Channel defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocketsConfig {
    /// Namespace used when an action names none. Root when absent.
    #[serde(default)]
    pub default_namespace: Option<String>,
    /// Default timeout in milliseconds.
    #[serde(default)]
    pub default_timeout: Option<u64>,
}

// ============================================================================
// ClientConfig
// ============================================================================

/// Recognized client options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Session label; random when absent.
    #[serde(default)]
    pub identity: Option<String>,
    /// `tracing` level name (`error`, `warn`, `info`, `debug`, `trace`, `off`).
    #[serde(default)]
    pub log_level: Option<String>,
    /// Server endpoint.
    pub server: ServerConfig,
    /// Channel defaults.
    #[serde(default)]
    pub sockets: SocketsConfig,
}

impl ClientConfig {
    /// Creates a configuration for `server` with every option defaulted.
    #[must_use]
    pub fn new(server: ServerConfig) -> Self {
        Self {
            identity: None,
            log_level: None,
            server,
            sockets: SocketsConfig::default(),
        }
    }

    /// Parses a configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the text is not a valid configuration.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Reads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] or [`Error::Json`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Returns the configured log level.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an unknown level name.
    pub fn level_filter(&self) -> Result<LevelFilter> {
        parse_level(self.log_level.as_deref())
    }
}

/// Parses a level name, defaulting to [`DEFAULT_LOG_LEVEL`].
pub(crate) fn parse_level(level: Option<&str>) -> Result<LevelFilter> {
    match level {
        None => Ok(DEFAULT_LOG_LEVEL),
        Some(name) => LevelFilter::from_str(name).map_err(|_| {
            Error::config(format!(
                "Unknown log level {name:?}; expected one of off, error, warn, info, debug, trace"
            ))
        }),
    }
}

// ============================================================================
// Tests
// ============================================================================
