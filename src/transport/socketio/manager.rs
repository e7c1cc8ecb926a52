//! Shared physical connection and its event loop.
//!
//! One [`Manager`] owns one WebSocket to one origin. Channels attach to it
//! by namespace; the root namespace is connected by the server on open,
//! other namespaces are requested with a connect packet.
//!
//! # Event Loop
//!
//! The spawned task handles:
//!
//! - Incoming frames (open, namespace connect/error/disconnect, events, ping)
//! - Outgoing frames queued by channels
//! - Client pings every `pingInterval`
//!
//! When the socket ends, every attached channel is told so.

// ============================================================================
// Imports
// ============================================================================

use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tracing::{debug, error, trace, warn};
use url::Url;

use crate::error::{Error, Result};

use super::channel::SocketIoChannel;
use super::packet::{EnginePacket, ROOT_NAMESPACE, SocketPacket, SocketPacketKind};

// ============================================================================
// Constants
// ============================================================================

/// Engine.IO protocol revision spoken by the handshake.
const ENGINE_IO_VERSION: &str = "3";

/// Handshake path served by Socket.IO servers.
const SOCKET_IO_PATH: &str = "/socket.io/";

// ============================================================================
// Types
// ============================================================================

/// Connection state of a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManagerState {
    /// Nothing attached yet.
    Idle,
    /// WebSocket handshake in progress.
    Connecting,
    /// Engine.IO open received.
    Open,
    /// Socket ended; the manager is not reused.
    Closed,
}

/// Internal commands for the event loop.
enum ManagerCommand {
    /// Write one text frame.
    Send(String),
    /// Close the socket.
    Shutdown,
}

/// What `attach` decided under the lock.
enum Attach {
    Spawn(mpsc::UnboundedReceiver<ManagerCommand>),
    Wait,
    Connected,
    Refused,
}

struct ManagerInner {
    state: ManagerState,
    /// Attached channels by wire namespace.
    channels: FxHashMap<String, Weak<SocketIoChannel>>,
    /// Wire namespaces the server confirmed.
    connected: FxHashSet<String>,
    command_tx: Option<mpsc::UnboundedSender<ManagerCommand>>,
}

// ============================================================================
// Manager
// ============================================================================

/// One WebSocket shared by every channel opened on it.
pub struct Manager {
    me: Weak<Manager>,
    /// WebSocket handshake URL.
    url: Url,
    /// `Cookie` header sent with the handshake.
    cookie: Option<String>,
    inner: Mutex<ManagerInner>,
}

impl Manager {
    /// Creates an idle manager for the origin of `origin`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if the origin cannot be turned into a
    /// WebSocket URL.
    pub(super) fn new(origin: &Url, cookie: Option<String>) -> Result<Arc<Self>> {
        let url = handshake_url(origin)?;
        Ok(Arc::new_cyclic(|me| Self {
            me: me.clone(),
            url,
            cookie,
            inner: Mutex::new(ManagerInner {
                state: ManagerState::Idle,
                channels: FxHashMap::default(),
                connected: FxHashSet::default(),
                command_tx: None,
            }),
        }))
    }

    /// Returns the WebSocket handshake URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns `true` once the socket has ended.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().state == ManagerState::Closed
    }

    /// Returns the number of attached channels.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.inner.lock().channels.len()
    }

    /// Attaches a channel, starting the socket on first use.
    ///
    /// Completion is reported to the channel through `on_connected` or
    /// `on_connect_error`.
    pub(super) fn attach(&self, channel: &Arc<SocketIoChannel>) {
        let wire = channel.wire_namespace().to_string();

        let decision = {
            let mut inner = self.inner.lock();
            inner
                .channels
                .insert(wire.clone(), Arc::downgrade(channel));

            match inner.state {
                ManagerState::Idle => {
                    let (command_tx, command_rx) = mpsc::unbounded_channel();
                    inner.command_tx = Some(command_tx);
                    inner.state = ManagerState::Connecting;
                    Attach::Spawn(command_rx)
                }
                ManagerState::Connecting => Attach::Wait,
                ManagerState::Open if inner.connected.contains(&wire) => Attach::Connected,
                ManagerState::Open => {
                    send_locked(&inner, EnginePacket::Message(SocketPacket::connect(&wire)));
                    Attach::Wait
                }
                ManagerState::Closed => Attach::Refused,
            }
        };

        match decision {
            Attach::Spawn(command_rx) => {
                let Some(manager) = self.me.upgrade() else {
                    return;
                };
                debug!(url = %self.url, "Opening socket");
                tokio::spawn(manager.run(command_rx));
            }
            Attach::Wait => {}
            Attach::Connected => channel.on_connected(),
            Attach::Refused => channel.on_connect_error("connection closed"),
        }
    }

    /// Detaches a channel. The socket is shut down once none remain.
    ///
    /// Does nothing if another channel has since attached to `wire`.
    pub(super) fn detach(&self, wire: &str, channel: &Weak<SocketIoChannel>) {
        let mut inner = self.inner.lock();
        if !inner
            .channels
            .get(wire)
            .is_some_and(|attached| attached.ptr_eq(channel))
        {
            return;
        }
        inner.channels.remove(wire);
        inner.connected.remove(wire);

        if inner.channels.is_empty()
            && let Some(command_tx) = inner.command_tx.take()
        {
            debug!(url = %self.url, "Last channel detached");
            inner.state = ManagerState::Closed;
            let _ = command_tx.send(ManagerCommand::Shutdown);
        }
    }

    /// Queues one packet for writing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the socket has ended.
    pub(super) fn send(&self, packet: EnginePacket) -> Result<()> {
        let inner = self.inner.lock();
        let command_tx = inner.command_tx.as_ref().ok_or(Error::ConnectionClosed)?;
        command_tx
            .send(ManagerCommand::Send(packet.encode()))
            .map_err(|_| Error::ConnectionClosed)
    }

    // ========================================================================
    // Event Loop
    // ========================================================================

    async fn run(self: Arc<Self>, mut command_rx: mpsc::UnboundedReceiver<ManagerCommand>) {
        let ws_stream = match self.handshake().await {
            Ok(ws_stream) => ws_stream,
            Err(e) => {
                warn!(url = %self.url, error = %e, "Socket handshake failed");
                self.close(Some(&e.to_string()));
                return;
            }
        };

        let (mut ws_write, mut ws_read) = ws_stream.split();
        let mut ping_every: Option<Duration> = None;
        let mut next_ping = Instant::now();

        loop {
            tokio::select! {
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            let pinging = ping_every.is_some();
                            let reply = match EnginePacket::decode(&text) {
                                Ok(packet) => self.handle_packet(packet, &mut ping_every),
                                Err(e) => {
                                    warn!(error = %e, "Dropping malformed frame");
                                    None
                                }
                            };
                            if !pinging && let Some(interval) = ping_every {
                                next_ping = Instant::now() + interval;
                            }

                            if let Some(reply) = reply
                                && let Err(e) = ws_write.send(Message::Text(reply.encode().into())).await
                            {
                                warn!(error = %e, "Failed to send reply");
                            }
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!("Socket closed by remote");
                            break;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "Socket error");
                            break;
                        }

                        None => {
                            debug!("Socket stream ended");
                            break;
                        }

                        // Binary, Ping, Pong, Frame
                        _ => {}
                    }
                }

                command = command_rx.recv() => {
                    match command {
                        Some(ManagerCommand::Send(text)) => {
                            trace!(frame = %text, "Sending frame");
                            if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                                warn!(error = %e, "Failed to send frame");
                                break;
                            }
                        }

                        Some(ManagerCommand::Shutdown) | None => {
                            debug!("Shutting socket down");
                            let _ = ws_write
                                .send(Message::Text(EnginePacket::Close.encode().into()))
                                .await;
                            let _ = ws_write.close().await;
                            break;
                        }
                    }
                }

                () = sleep_until(next_ping), if ping_every.is_some() => {
                    if let Err(e) = ws_write
                        .send(Message::Text(EnginePacket::Ping(String::new()).encode().into()))
                        .await
                    {
                        warn!(error = %e, "Failed to send ping");
                        break;
                    }
                    next_ping = Instant::now() + ping_every.unwrap_or_default();
                }
            }
        }

        self.close(None);
        debug!(url = %self.url, "Event loop terminated");
    }

    async fn handshake(&self) -> Result<WebSocketStream<MaybeTlsStream<TcpStream>>> {
        let mut request = self.url.as_str().into_client_request()?;
        if let Some(cookie) = &self.cookie {
            let value = HeaderValue::from_str(cookie)
                .map_err(|e| Error::connection(format!("invalid cookie header: {e}")))?;
            request.headers_mut().insert(COOKIE, value);
        }

        let (ws_stream, _response) = connect_async(request).await?;
        Ok(ws_stream)
    }

    /// Applies one incoming packet. Returns a frame to answer with.
    fn handle_packet(
        &self,
        packet: EnginePacket,
        ping_every: &mut Option<Duration>,
    ) -> Option<EnginePacket> {
        match packet {
            EnginePacket::Open(info) => {
                debug!(sid = %info.sid, ping_interval = info.ping_interval, "Socket open");
                *ping_every = (info.ping_interval > 0)
                    .then(|| Duration::from_millis(info.ping_interval));

                let mut inner = self.inner.lock();
                inner.state = ManagerState::Open;
                let pending: Vec<String> = inner
                    .channels
                    .keys()
                    .filter(|wire| wire.as_str() != ROOT_NAMESPACE)
                    .cloned()
                    .collect();
                for wire in pending {
                    send_locked(&inner, EnginePacket::Message(SocketPacket::connect(&wire)));
                }
                None
            }
            EnginePacket::Ping(payload) => Some(EnginePacket::Pong(payload)),
            EnginePacket::Close => {
                debug!("Server closed the session");
                if let Some(command_tx) = self.inner.lock().command_tx.take() {
                    let _ = command_tx.send(ManagerCommand::Shutdown);
                }
                None
            }
            EnginePacket::Message(packet) => {
                self.handle_socket_packet(packet);
                None
            }
            EnginePacket::Pong(_) | EnginePacket::Upgrade | EnginePacket::Noop => None,
        }
    }

    fn handle_socket_packet(&self, packet: SocketPacket) {
        let channel = {
            let mut inner = self.inner.lock();
            if packet.kind == SocketPacketKind::Connect {
                inner.connected.insert(packet.namespace.clone());
            } else if matches!(
                packet.kind,
                SocketPacketKind::Disconnect | SocketPacketKind::Error
            ) {
                inner.connected.remove(&packet.namespace);
            }
            inner
                .channels
                .get(&packet.namespace)
                .and_then(Weak::upgrade)
        };

        let Some(channel) = channel else {
            trace!(namespace = %packet.namespace, "Packet for unattached namespace");
            return;
        };

        match packet.kind {
            SocketPacketKind::Connect => channel.on_connected(),
            SocketPacketKind::Disconnect => channel.on_closed("io server disconnect"),
            SocketPacketKind::Error => channel.on_connect_error(&packet.error_message()),
            SocketPacketKind::Event => match packet.event_parts() {
                Some((event, args)) => channel.on_event(event, args),
                None => warn!(namespace = %packet.namespace, "Event without a name"),
            },
            SocketPacketKind::Ack => {
                trace!(namespace = %packet.namespace, id = ?packet.id, "Ignoring ack");
            }
        }
    }

    /// Marks the manager closed and notifies every attached channel.
    fn close(&self, reason: Option<&str>) {
        let channels: Vec<Arc<SocketIoChannel>> = {
            let mut inner = self.inner.lock();
            inner.state = ManagerState::Closed;
            inner.command_tx = None;
            inner.connected.clear();
            inner
                .channels
                .drain()
                .filter_map(|(_, channel)| channel.upgrade())
                .collect()
        };

        for channel in channels {
            match reason {
                Some(reason) => channel.on_connect_error(reason),
                None => channel.on_closed("transport close"),
            }
        }
    }
}

// ============================================================================
// Test Support
// ============================================================================

/// Frames a manager queued for writing, captured without a socket.
#[cfg(test)]
pub(super) struct QueuedFrames {
    rx: mpsc::UnboundedReceiver<ManagerCommand>,
}

#[cfg(test)]
impl QueuedFrames {
    /// Drains every text frame queued so far.
    pub(super) fn drain(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(command) = self.rx.try_recv() {
            if let ManagerCommand::Send(frame) = command {
                frames.push(frame);
            }
        }
        frames
    }
}

#[cfg(test)]
impl Manager {
    /// Marks the manager open without a handshake and captures its writes.
    pub(super) fn open_detached(&self) -> QueuedFrames {
        let (command_tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        inner.state = ManagerState::Open;
        inner.command_tx = Some(command_tx);
        QueuedFrames { rx }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn send_locked(inner: &ManagerInner, packet: EnginePacket) {
    if let Some(command_tx) = &inner.command_tx {
        let _ = command_tx.send(ManagerCommand::Send(packet.encode()));
    }
}

/// Builds the WebSocket handshake URL for the origin of `url`.
pub(super) fn handshake_url(url: &Url) -> Result<Url> {
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(Error::config(format!(
                "unsupported channel scheme {other:?}"
            )));
        }
    };
    let host = url
        .host_str()
        .ok_or_else(|| Error::config(format!("channel URL {url} has no host")))?;

    let mut handshake = Url::parse(&format!("{scheme}://{host}"))?;
    let _ = handshake.set_port(url.port());
    handshake.set_path(SOCKET_IO_PATH);
    handshake
        .query_pairs_mut()
        .append_pair("EIO", ENGINE_IO_VERSION)
        .append_pair("transport", "websocket");
    Ok(handshake)
}

// ============================================================================
// Tests
// ============================================================================
