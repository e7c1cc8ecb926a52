//! Named-channel capability.
//!
//! A [`ChannelTransport`] opens one [`Channel`] per namespace. Channels on
//! the same origin may share one physical connection; [`ChannelConfig::force_new`]
//! asks the transport for a fresh one instead.
//!
//! # Lifecycle Events
//!
//! Besides application events, every channel dispatches these to listeners:
//!
//! | Event | Args |
//! |-------|------|
//! | [`EVENT_CONNECT`] | none |
//! | [`EVENT_CONNECT_ERROR`] | error description |
//! | [`EVENT_DISCONNECT`] | reason |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use url::Url;

use crate::error::Result;
use crate::identifiers::ListenerId;

// ============================================================================
// Constants
// ============================================================================

/// Dispatched once the namespace is connected.
pub const EVENT_CONNECT: &str = "connect";

/// Dispatched when the namespace or the underlying connection fails to connect.
pub const EVENT_CONNECT_ERROR: &str = "connect_error";

/// Dispatched when a connected namespace is closed.
pub const EVENT_DISCONNECT: &str = "disconnect";

// ============================================================================
// Types
// ============================================================================

/// Listener callback type.
///
/// Receives the event's argument sequence (event name excluded).
pub type Listener = Arc<dyn Fn(&[Value]) + Send + Sync>;

// ============================================================================
// ChannelState
// ============================================================================

/// Connection state of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    /// Opened with autostart disabled, `connect` not called yet.
    Idle,
    /// Connection attempt in progress.
    Connecting,
    /// Namespace connected.
    Connected,
    /// Connection attempt failed.
    Errored,
    /// Disconnected by either side.
    Closed,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Errored => "errored",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

// ============================================================================
// ChannelConfig
// ============================================================================

/// Options passed to [`ChannelTransport::open`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Start a new physical connection instead of multiplexing.
    pub force_new: bool,
    /// Connect immediately on open. The client always opens with `false`.
    pub auto_connect: bool,
    /// `Cookie` header value presented during the handshake.
    pub cookie: Option<String>,
}

// ============================================================================
// Channel
// ============================================================================

/// One namespace on a (possibly shared) connection.
pub trait Channel: Send + Sync {
    /// Returns the namespace this channel addresses.
    fn namespace(&self) -> &str;

    /// Returns the current connection state.
    fn state(&self) -> ChannelState;

    /// Returns `true` if the namespace is connected.
    fn is_connected(&self) -> bool {
        self.state() == ChannelState::Connected
    }

    /// Starts the connection attempt. Completion is reported through
    /// [`EVENT_CONNECT`] or [`EVENT_CONNECT_ERROR`].
    fn connect(&self);

    /// Closes the channel. Listeners stay registered.
    fn disconnect(&self);

    /// Sends an event. `args[0]` is the event name.
    ///
    /// Fire-and-forget: no acknowledgement is awaited.
    fn emit(&self, args: &[Value]) -> Result<()>;

    /// Registers a persistent listener for `event`.
    fn on(&self, event: &str, listener: Listener) -> ListenerId;

    /// Removes a listener. Returns `true` if it was registered.
    fn remove_listener(&self, event: &str, id: ListenerId) -> bool;
}

// ============================================================================
// ChannelTransport
// ============================================================================

/// Opens channels.
///
/// `url` carries the origin and, as its path, the namespace.
pub trait ChannelTransport: Send + Sync {
    /// Creates a channel without starting the connection unless
    /// `config.auto_connect` is set.
    fn open(&self, url: &Url, config: &ChannelConfig) -> Result<Arc<dyn Channel>>;
}

/// Returns the namespace a channel URL addresses.
///
/// The root path is the root namespace `""`.
#[must_use]
pub fn namespace_of(url: &Url) -> &str {
    match url.path() {
        "/" => "",
        path => path,
    }
}

// ============================================================================
// Tests
// ============================================================================
