//! Duplex E2E - Session-aware end-to-end test client.
//!
//! This library drives scripted tests against web applications that mix
//! ordinary HTTP page loads with long-lived socket channels. Each [`Client`]
//! behaves like one browser tab: it keeps cookies, the current page, the open
//! channels of that page, the last ajax result, the last observed event and a
//! static asset cache, and executes [`Action`]s against that state.
//!
//! # Architecture
//!
//! - **Dispatcher**: [`Client::dispatch`] routes every [`ActionKind`] to its
//!   handler and returns an [`Outcome`]
//! - **Transports**: HTTP and channels are capabilities behind the
//!   [`HttpClient`] and [`ChannelTransport`] traits; the defaults are
//!   `reqwest` and a bundled Socket.IO client
//! - **Race with deadline**: await, confirm and connect suspend on one event
//!   racing a timer; listeners are removed on every exit path
//! - **Scripts**: [`ScriptRunner`] runs a [`Script`] step by step with
//!   optional delays and clears the session afterwards
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use duplex_e2e::{Action, Client, Result, ServerConfig};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = Client::builder()
//!         .server(ServerConfig::new("localhost", 3000))
//!         .default_timeout(Duration::from_millis(500))
//!         .build()?;
//!
//!     client.dispatch("/").await?;
//!     client.dispatch(Action::connect("/chat")).await?;
//!     client
//!         .dispatch(Action::emit("/chat", vec![json!("join"), json!("lobby")]))
//!         .await?;
//!     let outcome = client.dispatch(Action::await_emit("/chat", "joined")).await?;
//!     println!("{outcome:?}");
//!
//!     client.clear();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`action`] | Action vocabulary and outcomes |
//! | [`client`] | Client, builder and configuration |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`script`] | Scripts and the sequential runner |
//! | [`session`] | Session state and cookie jar |
//! | [`transport`] | HTTP and channel capabilities |

// ============================================================================
// Modules
// ============================================================================

/// Action vocabulary.
///
/// Every unit of work is an [`Action`]; a bare path string is a GET.
pub mod action;

/// Client, builder and configuration.
///
/// Use [`Client::builder()`] to create a configured client.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Scripts and the sequential runner.
pub mod script;

/// Session state owned by a client.
pub mod session;

/// HTTP and channel capabilities.
pub mod transport;

/// Mock transports for unit tests.
#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Re-exports
// ============================================================================

// Action types
pub use action::{
    Action, ActionKind, ArgsPredicate, AwaitAction, Computed, ConnectAction, ConnectAwaitAction,
    Delay, EmitAction, HttpAction, MatchAction, Outcome, Param, StaticAssetsAction, Timeout,
};

// Client types
pub use client::{Client, ClientBuilder, ClientConfig, ServerConfig, SocketsConfig};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ListenerId, PageId};

// Script types
pub use script::{Script, ScriptRunner, ScriptStep};

// Session types
pub use session::{CookieJar, PageInfo, SocketEvent};

// Transport types
pub use transport::{
    Channel, ChannelConfig, ChannelState, ChannelTransport, HttpClient, HttpRequest, HttpResponse,
    Method, ReqwestHttpClient,
};

#[cfg(feature = "socketio")]
pub use transport::SocketIoTransport;
