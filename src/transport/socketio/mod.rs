//! Bundled Socket.IO channel transport.
//!
//! Speaks Engine.IO 3 over a WebSocket (no polling fallback). Channels for
//! the same origin share one [`Manager`] unless opened with `force_new`.
//!
//! # Server compatibility
//!
//! The handshake asks for `EIO=3`, which Socket.IO 2.x servers speak
//! natively. Socket.IO 3.x and 4.x servers reject it unless created with
//! `allowEIO3: true`. Binary packets and `wss://` are not supported.
//!
//! Enabled by the default `socketio` cargo feature.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ SocketIoTransport│  origin -> Manager cache
//! └────────┬─────────┘
//!          │ open(url, config)
//!          ▼
//! ┌──────────────────┐   attach    ┌──────────────┐    ws://host/socket.io/
//! │ SocketIoChannel  │────────────►│   Manager    │◄──────────────────────►
//! │  (one namespace) │◄────────────│ (event loop) │
//! └──────────────────┘  callbacks  └──────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `packet` | Engine.IO and Socket.IO packet codec |
//! | `manager` | Shared socket and event loop |
//! | `channel` | Namespace socket |

// ============================================================================
// Submodules
// ============================================================================

/// Namespace socket.
pub mod channel;

/// Shared socket and event loop.
pub mod manager;

/// Packet codec.
pub mod packet;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::debug;
use url::Url;

use crate::error::Result;
use crate::transport::{Channel, ChannelConfig, ChannelTransport, namespace_of};

// ============================================================================
// Re-exports
// ============================================================================

pub use channel::SocketIoChannel;
pub use manager::Manager;
pub use packet::{EnginePacket, OpenInfo, SocketPacket, SocketPacketKind};

// ============================================================================
// SocketIoTransport
// ============================================================================

/// Opens [`SocketIoChannel`]s, multiplexing per origin.
///
/// Only Engine.IO 3 is spoken; see the module docs for server requirements.
#[derive(Default)]
pub struct SocketIoTransport {
    /// Latest manager per handshake URL.
    managers: Mutex<FxHashMap<String, Arc<Manager>>>,
}

impl SocketIoTransport {
    /// Creates a transport with no open connections.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of cached managers that are still usable.
    #[must_use]
    pub fn manager_count(&self) -> usize {
        self.managers
            .lock()
            .values()
            .filter(|manager| !manager.is_closed())
            .count()
    }

    fn manager_for(&self, url: &Url, config: &ChannelConfig) -> Result<Arc<Manager>> {
        let key = manager::handshake_url(url)?.to_string();

        let mut managers = self.managers.lock();
        if let Some(existing) = managers.get(&key)
            && !config.force_new
            && !existing.is_closed()
        {
            return Ok(Arc::clone(existing));
        }

        debug!(url = %key, force_new = config.force_new, "New socket manager");
        let fresh = Manager::new(url, config.cookie.clone())?;
        managers.insert(key, Arc::clone(&fresh));
        Ok(fresh)
    }
}

impl std::fmt::Debug for SocketIoTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketIoTransport")
            .field("managers", &self.managers.lock().len())
            .finish()
    }
}

impl ChannelTransport for SocketIoTransport {
    fn open(&self, url: &Url, config: &ChannelConfig) -> Result<Arc<dyn Channel>> {
        let manager = self.manager_for(url, config)?;
        let channel = SocketIoChannel::new(namespace_of(url), manager);

        if config.auto_connect {
            channel.connect();
        }
        Ok(channel)
    }
}

// ============================================================================
// Tests
// ============================================================================
