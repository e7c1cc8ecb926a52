//! Transport capabilities and their bundled implementations.
//!
//! The client core depends only on two traits: [`HttpClient`] for page and
//! ajax requests, and [`ChannelTransport`] for socket channels. Both are
//! injectable; the defaults are [`ReqwestHttpClient`] and, with the
//! `socketio` feature (on by default), `SocketIoTransport`.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐   HttpRequest + CookieJar   ┌────────────────────┐
//! │                 │────────────────────────────►│ ReqwestHttpClient  │──► HTTP
//! │     Client      │                             └────────────────────┘
//! │  (session core) │   open(url, ChannelConfig)  ┌────────────────────┐
//! │                 │────────────────────────────►│ SocketIoTransport  │──► WebSocket
//! └─────────────────┘                             └────────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `http` | HTTP request/response types and [`HttpClient`] |
//! | `client` | `reqwest`-backed [`HttpClient`] |
//! | `channel` | [`Channel`] and [`ChannelTransport`] traits |
//! | `listeners` | Listener registry shared by channel implementations |
//! | `socketio` | Socket.IO over WebSocket |

// ============================================================================
// Submodules
// ============================================================================

/// Named-channel capability.
pub mod channel;

/// Default HTTP client.
pub mod client;

/// HTTP capability.
pub mod http;

/// Listener registry.
pub mod listeners;

/// Socket.IO channel transport.
#[cfg(feature = "socketio")]
pub mod socketio;

// ============================================================================
// Re-exports
// ============================================================================

pub use channel::{
    Channel, ChannelConfig, ChannelState, ChannelTransport, EVENT_CONNECT, EVENT_CONNECT_ERROR,
    EVENT_DISCONNECT, Listener, namespace_of,
};
pub use client::ReqwestHttpClient;
pub use http::{HttpClient, HttpRequest, HttpResponse, Method};
pub use listeners::ListenerRegistry;
#[cfg(feature = "socketio")]
pub use socketio::SocketIoTransport;
