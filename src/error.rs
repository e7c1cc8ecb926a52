//! Error types for duplex-e2e.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! Every action returns [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use duplex_e2e::{Action, Error, Result};
//!
//! async fn example(client: &Client) -> Result<()> {
//!     client.dispatch("/chat").await?;
//!     client.dispatch(Action::connect("/chat")).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidArgument`] |
//! | Dispatch | [`Error::UnknownActionKind`] |
//! | Preconditions | [`Error::NoPageLoaded`], [`Error::NoSuchChannel`] |
//! | HTTP | [`Error::TransportUnavailable`], [`Error::Http`] |
//! | Channels | [`Error::ConnectTimeout`], [`Error::ConnectFailed`], [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::Protocol`] |
//! | Events | [`Error::AwaitTimeout`], [`Error::UnexpectedEmit`] |
//! | Scripts | [`Error::ScriptAlreadyRunning`], [`Error::InvalidScript`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Url`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
#[cfg(feature = "socketio")]
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::session::SocketEvent;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes enough context (path, namespace, event type) to
/// diagnose a failed action without re-running it.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when client configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Invalid argument in an action.
    ///
    /// Returned when an action's fields cannot be used as given.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    // ========================================================================
    // Dispatch Errors
    // ========================================================================
    /// Action kind has no handler.
    ///
    /// Returned before any I/O; the session is left untouched.
    #[error("Unknown action kind: {kind}")]
    UnknownActionKind {
        /// The unrecognized kind.
        kind: String,
    },

    // ========================================================================
    // Precondition Errors
    // ========================================================================
    /// Action requires a loaded page.
    #[error("No page loaded: {action} requires a current page")]
    NoPageLoaded {
        /// Kind of the action that was rejected.
        action: String,
    },

    /// No open channel for namespace.
    #[error("No such channel: namespace={namespace:?}")]
    NoSuchChannel {
        /// Namespace that was looked up.
        namespace: String,
    },

    // ========================================================================
    // HTTP Errors
    // ========================================================================
    /// HTTP transport produced no response.
    ///
    /// Never retried by the client; retry policy belongs to the caller.
    #[error("Transport unavailable for {path}: {message}")]
    TransportUnavailable {
        /// Requested path.
        path: String,
        /// Underlying transport failure.
        message: String,
    },

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // ========================================================================
    // Channel Errors
    // ========================================================================
    /// Channel did not connect in time.
    #[error("Connect timeout after {timeout_ms}ms: namespace={namespace:?}")]
    ConnectTimeout {
        /// Namespace being connected.
        namespace: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Channel reported a connect error before connecting.
    #[error("Connect failed: namespace={namespace:?}: {message}")]
    ConnectFailed {
        /// Namespace being connected.
        namespace: String,
        /// Error reported by the transport.
        message: String,
    },

    /// Socket connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Socket connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Wire protocol violation.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // Event Errors
    // ========================================================================
    /// Awaited event did not arrive in time.
    #[error("Timeout after {timeout_ms}ms awaiting {event_type:?} on namespace={namespace:?}")]
    AwaitTimeout {
        /// Event type that was awaited.
        event_type: String,
        /// Namespace of the channel.
        namespace: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Event arrived while confirming its absence.
    #[error("Unexpected emit {:?} on namespace={:?}", .event.event_type, .event.namespace)]
    UnexpectedEmit {
        /// The captured event.
        event: Box<SocketEvent>,
    },

    // ========================================================================
    // Script Errors
    // ========================================================================
    /// A script is already running on this runner.
    #[error("Script already running: {name}")]
    ScriptAlreadyRunning {
        /// Name of the rejected script.
        name: String,
    },

    /// Script failed validation.
    #[error("Invalid script: {message}")]
    InvalidScript {
        /// Description of the validation failure.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// URL parse error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

#[cfg(feature = "socketio")]
impl From<WsError> for Error {
    fn from(err: WsError) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an unknown action kind error.
    #[inline]
    pub fn unknown_action_kind(kind: impl Into<String>) -> Self {
        Self::UnknownActionKind { kind: kind.into() }
    }

    /// Creates a no page loaded error.
    #[inline]
    pub fn no_page_loaded(action: impl Into<String>) -> Self {
        Self::NoPageLoaded {
            action: action.into(),
        }
    }

    /// Creates a no such channel error.
    #[inline]
    pub fn no_such_channel(namespace: impl Into<String>) -> Self {
        Self::NoSuchChannel {
            namespace: namespace.into(),
        }
    }

    /// Creates a transport unavailable error.
    #[inline]
    pub fn transport_unavailable(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransportUnavailable {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a connect timeout error.
    #[inline]
    pub fn connect_timeout(namespace: impl Into<String>, timeout_ms: u64) -> Self {
        Self::ConnectTimeout {
            namespace: namespace.into(),
            timeout_ms,
        }
    }

    /// Creates a connect failed error.
    #[inline]
    pub fn connect_failed(namespace: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConnectFailed {
            namespace: namespace.into(),
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates an await timeout error.
    #[inline]
    pub fn await_timeout(
        event_type: impl Into<String>,
        namespace: impl Into<String>,
        timeout_ms: u64,
    ) -> Self {
        Self::AwaitTimeout {
            event_type: event_type.into(),
            namespace: namespace.into(),
            timeout_ms,
        }
    }

    /// Creates an unexpected emit error carrying the captured event.
    #[inline]
    pub fn unexpected_emit(event: SocketEvent) -> Self {
        Self::UnexpectedEmit {
            event: Box::new(event),
        }
    }

    /// Creates a script already running error.
    #[inline]
    pub fn script_already_running(name: impl Into<String>) -> Self {
        Self::ScriptAlreadyRunning { name: name.into() }
    }

    /// Creates an invalid script error.
    #[inline]
    pub fn invalid_script(message: impl Into<String>) -> Self {
        Self::InvalidScript {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a suspension-point timeout.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectTimeout { .. } | Self::AwaitTimeout { .. }
        )
    }

    /// Returns `true` if this is a precondition violation.
    ///
    /// Precondition errors are raised before any session mutation.
    #[inline]
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::NoPageLoaded { .. } | Self::NoSuchChannel { .. }
        )
    }

    /// Returns `true` if this is a transport-level error.
    #[inline]
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::TransportUnavailable { .. }
                | Self::Http(_)
                | Self::Connection { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
        )
    }

    /// Returns the captured event for [`Error::UnexpectedEmit`].
    #[inline]
    #[must_use]
    pub fn unexpected_event(&self) -> Option<&SocketEvent> {
        match self {
            Self::UnexpectedEmit { event } => Some(event),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    use serde_json::json;

    #[test]
    fn test_error_display() {
        let err = Error::no_such_channel("/chat");
        assert_eq!(err.to_string(), "No such channel: namespace=\"/chat\"");
    }

    #[test]
    fn test_await_timeout_display() {
        let err = Error::await_timeout("responseOnTest", "", 500);
        assert_eq!(
            err.to_string(),
            "Timeout after 500ms awaiting \"responseOnTest\" on namespace=\"\""
        );
    }

    #[test]
    fn test_unexpected_emit_carries_event() {
        let event = SocketEvent::new("/chat", "message", vec![json!("hi")]);
        let err = Error::unexpected_emit(event.clone());

        assert_eq!(err.unexpected_event(), Some(&event));
        assert!(err.to_string().contains("\"message\""));
    }

    #[test]
    fn test_is_timeout() {
        assert!(Error::connect_timeout("", 100).is_timeout());
        assert!(Error::await_timeout("e", "", 100).is_timeout());
        assert!(!Error::no_page_loaded("emit").is_timeout());
    }

    #[test]
    fn test_is_precondition() {
        assert!(Error::no_page_loaded("ajax").is_precondition());
        assert!(Error::no_such_channel("/x").is_precondition());
        assert!(!Error::config("x").is_precondition());
    }

    #[test]
    fn test_is_transport() {
        assert!(Error::transport_unavailable("/", "refused").is_transport());
        assert!(Error::ConnectionClosed.is_transport());
        assert!(!Error::unknown_action_kind("fly").is_transport());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
