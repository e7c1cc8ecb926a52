//! Session-scoped mutable record.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::PageId;
use crate::transport::{Channel, ChannelConfig, ChannelState, HttpResponse};

// ============================================================================
// SocketEvent
// ============================================================================

/// The most recently captured inbound event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocketEvent {
    /// Namespace the event arrived on.
    pub namespace: String,
    /// Event type.
    pub event_type: String,
    /// Event arguments, in order.
    pub args: Vec<Value>,
}

impl SocketEvent {
    /// Creates a new event record.
    #[inline]
    #[must_use]
    pub fn new(namespace: impl Into<String>, event_type: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            namespace: namespace.into(),
            event_type: event_type.into(),
            args,
        }
    }
}

// ============================================================================
// SocketChannel
// ============================================================================

/// An open channel recorded on the current page.
#[derive(Clone)]
pub struct SocketChannel {
    /// Namespace key.
    pub namespace: String,
    /// Configuration the channel was opened with.
    pub config: ChannelConfig,
    /// Transport handle.
    pub handle: Arc<dyn Channel>,
}

impl SocketChannel {
    /// Returns the channel's connection state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ChannelState {
        self.handle.state()
    }
}

impl fmt::Debug for SocketChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketChannel")
            .field("namespace", &self.namespace)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

// ============================================================================
// Page
// ============================================================================

/// Result of the most recent non-discarded page load.
#[derive(Debug)]
pub struct Page {
    /// Page identity within the session.
    pub id: PageId,
    /// Final URL of the page.
    pub url: Url,
    /// HTTP status code.
    pub status: u16,
    /// Body text.
    pub body: String,
    /// Open channels keyed by namespace.
    pub channels: FxHashMap<String, SocketChannel>,
}

impl Page {
    /// Creates a page from a terminal response.
    #[must_use]
    pub fn from_response(response: &HttpResponse) -> Self {
        Self {
            id: PageId::next(),
            url: response.url.clone(),
            status: response.status,
            body: response.body.clone(),
            channels: FxHashMap::default(),
        }
    }

    /// Returns a detached snapshot.
    #[must_use]
    pub fn info(&self) -> PageInfo {
        let mut namespaces: Vec<String> = self.channels.keys().cloned().collect();
        namespaces.sort();

        PageInfo {
            id: self.id,
            url: self.url.clone(),
            status: self.status,
            body: self.body.clone(),
            namespaces,
        }
    }
}

/// Detached view of the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    /// Page identity within the session.
    pub id: PageId,
    /// Final URL of the page.
    pub url: Url,
    /// HTTP status code.
    pub status: u16,
    /// Body text.
    pub body: String,
    /// Namespaces with a recorded channel, sorted.
    pub namespaces: Vec<String>,
}

// ============================================================================
// StaticCache
// ============================================================================

/// Fetched static assets keyed by resource path.
///
/// Append-only for the session lifetime; survives page unloads.
#[derive(Debug, Default)]
pub struct StaticCache {
    entries: FxHashMap<String, String>,
}

impl StaticCache {
    /// Stores a fetched body.
    pub fn insert(&mut self, path: impl Into<String>, body: impl Into<String>) {
        self.entries.insert(path.into(), body.into());
    }

    /// Returns `true` if `path` is cached.
    #[inline]
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Returns the cached body for `path`.
    #[inline]
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    /// Returns the number of cached entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is cached.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// ============================================================================
// Session
// ============================================================================

/// Mutable per-client record.
///
/// At most one [`Page`] is current. Replacing or unloading it hands back the
/// page's channels so the caller can close them outside the session lock.
#[derive(Debug, Default)]
pub struct Session {
    /// Current page.
    pub page: Option<Page>,
    /// Last ajax response.
    pub ajax: Option<HttpResponse>,
    /// Last captured event.
    pub event: Option<SocketEvent>,
    /// Static asset cache.
    pub static_cache: StaticCache,
}

impl Session {
    /// Installs a new page, discarding the previous page and current event.
    ///
    /// Returns the previous page's channels.
    #[must_use]
    pub fn replace_page(&mut self, page: Page) -> Vec<SocketChannel> {
        let stale = self.take_channels();
        self.page = Some(page);
        self.event = None;
        stale
    }

    /// Resets to the empty-page state. Cookies and static cache are untouched.
    ///
    /// Returns the unloaded page's channels.
    #[must_use]
    pub fn unload(&mut self) -> Vec<SocketChannel> {
        let stale = self.take_channels();
        self.page = None;
        self.ajax = None;
        self.event = None;
        stale
    }

    /// Returns the current page or a [`Error::NoPageLoaded`] naming `action`.
    pub fn require_page(&self, action: &str) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| Error::no_page_loaded(action))
    }

    /// Resolves the channel recorded for `namespace` on the current page.
    pub fn channel(&self, action: &str, namespace: &str) -> Result<Arc<dyn Channel>> {
        self.require_page(action)?
            .channels
            .get(namespace)
            .map(|channel| Arc::clone(&channel.handle))
            .ok_or_else(|| Error::no_such_channel(namespace))
    }

    fn take_channels(&mut self) -> Vec<SocketChannel> {
        self.page
            .as_mut()
            .map(|page| page.channels.drain().map(|(_, ch)| ch).collect())
            .unwrap_or_default()
    }
}

/// Closes channels handed back by [`Session::replace_page`] or [`Session::unload`].
pub(crate) fn close_channels(channels: Vec<SocketChannel>) {
    for channel in channels {
        tracing::debug!(namespace = %channel.namespace, "Closing channel");
        channel.handle.disconnect();
    }
}

// ============================================================================
// Tests
// ============================================================================
