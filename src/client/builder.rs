//! Builder pattern for client configuration.
//!
//! Provides a fluent API for configuring and creating [`Client`] instances.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use duplex_e2e::{Client, ServerConfig};
//!
//! # fn example() -> duplex_e2e::Result<()> {
//! let client = Client::builder()
//!     .server(ServerConfig::new("localhost", 3000))
//!     .default_namespace("/chat")
//!     .default_timeout(Duration::from_secs(2))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::action::Timeout;
use crate::error::{Error, Result};
use crate::session::{CookieJar, Session};
use crate::transport::{ChannelTransport, HttpClient, ReqwestHttpClient};
#[cfg(feature = "socketio")]
use crate::transport::SocketIoTransport;

use super::config::{ClientConfig, ServerConfig, parse_level};
use super::core::{Client, ClientInner};

// ============================================================================
// ClientBuilder
// ============================================================================

/// Builder for configuring a [`Client`] instance.
///
/// Use [`Client::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct ClientBuilder {
    /// Session label.
    identity: Option<String>,
    /// Log level name.
    log_level: Option<String>,
    /// Server endpoint.
    server: Option<ServerConfig>,
    /// Namespace used when an action names none.
    default_namespace: Option<String>,
    /// Timeout used when an action sets none.
    default_timeout: Option<Timeout>,
    /// HTTP capability.
    http: Option<Arc<dyn HttpClient>>,
    /// Channel capability.
    transport: Option<Arc<dyn ChannelTransport>>,
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("identity", &self.identity)
            .field("log_level", &self.log_level)
            .field("server", &self.server)
            .field("default_namespace", &self.default_namespace)
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ClientBuilder Implementation
// ============================================================================

impl ClientBuilder {
    /// Creates a new builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies every option from a [`ClientConfig`].
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.identity = config.identity;
        self.log_level = config.log_level;
        self.server = Some(config.server);
        self.default_namespace = config.sockets.default_namespace;
        self.default_timeout = config
            .sockets
            .default_timeout
            .map(|ms| Timeout::Fixed(Duration::from_millis(ms)));
        self
    }

    /// Sets the session label.
    #[inline]
    #[must_use]
    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Sets the log level name.
    #[inline]
    #[must_use]
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }

    /// Sets the server endpoint.
    #[inline]
    #[must_use]
    pub fn server(mut self, server: ServerConfig) -> Self {
        self.server = Some(server);
        self
    }

    /// Sets the namespace used when an action names none.
    #[inline]
    #[must_use]
    pub fn default_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.default_namespace = Some(namespace.into());
        self
    }

    /// Sets a fixed default timeout.
    #[inline]
    #[must_use]
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(Timeout::Fixed(timeout));
        self
    }

    /// Sets a default timeout computed for every action.
    #[inline]
    #[must_use]
    pub fn default_timeout_with<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Duration + Send + Sync + 'static,
    {
        self.default_timeout = Some(Timeout::with(f));
        self
    }

    /// Sets the HTTP capability. Defaults to [`ReqwestHttpClient`].
    #[inline]
    #[must_use]
    pub fn http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    /// Sets the channel capability.
    ///
    /// Defaults to `SocketIoTransport` with the `socketio` feature; without
    /// it a transport must be supplied.
    #[inline]
    #[must_use]
    pub fn channel_transport(mut self, transport: Arc<dyn ChannelTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Builds the client with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the server is missing or invalid
    /// - [`Error::Config`] if the log level is unknown
    /// - [`Error::Http`] if the default HTTP client cannot be created
    pub fn build(self) -> Result<Client> {
        let server = self.server.ok_or_else(|| {
            Error::config(
                "Server is required. Use .server() to set it.\n\
                 Example: Client::builder().server(ServerConfig::new(\"localhost\", 3000))",
            )
        })?;
        let base_url = server.base_url()?;
        let log_level = parse_level(self.log_level.as_deref())?;

        let identity = self
            .identity
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());

        let http = match self.http {
            Some(http) => http,
            None => Arc::new(ReqwestHttpClient::new()?),
        };
        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport()?,
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                identity,
                log_level,
                base_url,
                default_namespace: self.default_namespace.unwrap_or_default(),
                default_timeout: self.default_timeout,
                http,
                transport,
                cookies: CookieJar::new(),
                session: Mutex::new(Session::default()),
            }),
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

#[cfg(feature = "socketio")]
fn default_transport() -> Result<Arc<dyn ChannelTransport>> {
    Ok(Arc::new(SocketIoTransport::new()))
}

#[cfg(not(feature = "socketio"))]
fn default_transport() -> Result<Arc<dyn ChannelTransport>> {
    Err(Error::config(
        "No channel transport. Enable the `socketio` feature or use .channel_transport().",
    ))
}

// ============================================================================
// Tests
// ============================================================================
