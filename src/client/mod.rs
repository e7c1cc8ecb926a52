//! Session-aware client.
//!
//! A [`Client`] owns one session (cookies, current page, open channels, last
//! ajax result, last event, static cache) and executes [`Action`](crate::Action)s
//! against it.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use duplex_e2e::{Action, Client, ServerConfig};
//! use serde_json::json;
//!
//! # async fn example() -> duplex_e2e::Result<()> {
//! let client = Client::builder()
//!     .server(ServerConfig::new("localhost", 3000))
//!     .build()?;
//!
//! client.dispatch("/").await?;
//! client.dispatch(Action::connect("")).await?;
//! client.dispatch(Action::emit("", vec![json!("test")])).await?;
//! let outcome = client
//!     .dispatch(Action::await_emit("", "responseOnTest").with_timeout(Duration::from_millis(500)))
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `core` | Client struct, dispatcher, accessors |
//! | `builder` | Fluent configuration |
//! | `config` | Serializable configuration |
//! | `http` | HTTP action execution |
//! | `sockets` | Channel connect and page unload |
//! | `events` | Emit, await and confirm |
//! | `assets` | Static asset crawler |
//! | `race` | Event-versus-deadline race |

// ============================================================================
// Submodules
// ============================================================================

/// Static asset crawler.
pub mod assets;

/// Client builder.
pub mod builder;

/// Client configuration.
pub mod config;

/// Client struct and dispatcher.
mod core;

/// Emit, await and confirm.
mod events;

/// HTTP action execution.
mod http;

/// Event-versus-deadline race.
mod race;

/// Channel lifecycle.
mod sockets;

// ============================================================================
// Re-exports
// ============================================================================

pub use assets::{DEFAULT_ASSET_EXTENSIONS, extract_asset_references};
pub use builder::ClientBuilder;
pub use config::{ClientConfig, FALLBACK_TIMEOUT, ServerConfig, SocketsConfig};
pub use core::Client;
