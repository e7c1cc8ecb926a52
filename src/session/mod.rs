//! Session state.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Session`] | Mutable per-client record (page, ajax result, event, cache) |
//! | [`Page`] | Most recent page load and its open channels |
//! | [`SocketChannel`] | One open channel on the current page |
//! | [`SocketEvent`] | Most recently captured inbound event |
//! | [`StaticCache`] | Fetched static assets |
//! | [`CookieJar`] | Cookie store shared by HTTP and channel handshakes |

// ============================================================================
// Submodules
// ============================================================================

/// Session cookie store.
pub mod cookies;

/// Page, channel and event records.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use cookies::CookieJar;
pub use state::{Page, PageInfo, Session, SocketChannel, SocketEvent, StaticCache};

pub(crate) use state::close_channels;
