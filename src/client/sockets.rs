//! Channel lifecycle: connect and page unload.
//!
//! The first channel opened for a page starts a fresh physical connection;
//! later channels on the same page multiplex over it. Channels are opened
//! with autostart disabled so the session cookies ride along on the
//! handshake, then connected explicitly.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::action::{ActionKind, ConnectAction, Outcome};
use crate::error::{Error, Result};
use crate::identifiers::PageId;
use crate::session::{SocketChannel, close_channels};
use crate::transport::{Channel, ChannelConfig, EVENT_CONNECT, EVENT_CONNECT_ERROR};

use super::Client;
use super::race::{EventRace, RaceOutcome};

// ============================================================================
// PendingChannel
// ============================================================================

/// A channel opened but not yet connected or recorded.
pub(crate) struct PendingChannel {
    /// Page the channel belongs to.
    page_id: PageId,
    /// Namespace key.
    namespace: String,
    /// Options it was opened with.
    config: ChannelConfig,
    /// Transport handle.
    pub(crate) handle: Arc<dyn Channel>,
}

// ============================================================================
// Client - Sockets
// ============================================================================

impl Client {
    /// Handles `channel-connect`.
    pub(crate) async fn connect(&self, action: ConnectAction) -> Result<Outcome> {
        let namespace = self.namespace_or_default(action.namespace);
        let limit = self.effective_timeout(action.timeout.as_ref());

        let pending = self.open_channel(ActionKind::ChannelConnect, &namespace)?;
        self.establish(pending, limit).await?;

        Ok(Outcome::Connected(namespace))
    }

    /// Handles `page-unload`.
    pub(crate) fn unload_page(&self) {
        let stale = self.inner.session.lock().unload();
        let closed = stale.len();
        close_channels(stale);
        info!(channels = closed, "Page unloaded");
    }

    /// Opens a channel for `namespace` on the current page without connecting it.
    pub(crate) fn open_channel(&self, kind: ActionKind, namespace: &str) -> Result<PendingChannel> {
        let (page_id, first) = {
            let session = self.inner.session.lock();
            let page = session.require_page(kind.as_str())?;
            (page.id, page.channels.is_empty())
        };

        let config = ChannelConfig {
            force_new: first,
            auto_connect: false,
            cookie: self.inner.cookies.header_value(),
        };
        let url = self.resolve_url(namespace)?;

        debug!(
            namespace = %namespace,
            force_new = config.force_new,
            page = %page_id,
            "Opening channel"
        );
        let handle = self.inner.transport.open(&url, &config)?;

        Ok(PendingChannel {
            page_id,
            namespace: namespace.to_string(),
            config,
            handle,
        })
    }

    /// Connects a pending channel and records it on its page.
    ///
    /// A failed or timed-out attempt disconnects the channel and records nothing.
    pub(crate) async fn establish(&self, pending: PendingChannel, limit: Duration) -> Result<()> {
        let race = EventRace::install(&pending.handle, &[EVENT_CONNECT, EVENT_CONNECT_ERROR]);
        pending.handle.connect();

        let result = if pending.handle.is_connected() {
            drop(race);
            Ok(())
        } else {
            let outcome = race
                .run(limit, |event, args| {
                    Some(if event == EVENT_CONNECT {
                        Ok(())
                    } else {
                        Err(describe_error(&args))
                    })
                })
                .await;

            match outcome {
                RaceOutcome::Resolved(Ok(())) => Ok(()),
                RaceOutcome::Resolved(Err(message)) => {
                    Err(Error::connect_failed(&pending.namespace, message))
                }
                RaceOutcome::Elapsed => Err(Error::connect_timeout(
                    &pending.namespace,
                    millis(limit),
                )),
            }
        };

        if let Err(e) = result {
            warn!(namespace = %pending.namespace, error = %e, "Channel connect failed");
            pending.handle.disconnect();
            return Err(e);
        }

        self.record_channel(pending)
    }

    fn record_channel(&self, pending: PendingChannel) -> Result<()> {
        let rejected = {
            let mut session = self.inner.session.lock();
            match session.page.as_mut() {
                Some(page) if page.id == pending.page_id => {
                    info!(namespace = %pending.namespace, page = %page.id, "Channel connected");
                    page.channels.insert(
                        pending.namespace.clone(),
                        SocketChannel {
                            namespace: pending.namespace,
                            config: pending.config,
                            handle: pending.handle,
                        },
                    );
                    None
                }
                _ => Some(pending),
            }
        };

        match rejected {
            None => Ok(()),
            Some(pending) => {
                warn!(namespace = %pending.namespace, "Page changed during connect");
                pending.handle.disconnect();
                Err(Error::no_page_loaded(ActionKind::ChannelConnect.as_str()))
            }
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Renders `connect_error` arguments as a message.
fn describe_error(args: &[Value]) -> String {
    match args.first() {
        Some(Value::String(message)) => message.clone(),
        Some(other) => other.to_string(),
        None => "connection refused".to_string(),
    }
}

/// Converts a duration to whole milliseconds for error reports.
pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Tests
// ============================================================================
