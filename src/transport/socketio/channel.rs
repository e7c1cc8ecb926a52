//! One namespace attached to a [`Manager`].

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::ListenerId;
use crate::transport::{
    Channel, ChannelState, EVENT_CONNECT, EVENT_CONNECT_ERROR, EVENT_DISCONNECT, Listener,
    ListenerRegistry,
};

use super::manager::Manager;
use super::packet::{EnginePacket, SocketPacket, wire_namespace};

// ============================================================================
// SocketIoChannel
// ============================================================================

/// Socket.IO namespace socket.
///
/// Events emitted before the namespace is connected are buffered and
/// flushed on connect.
pub struct SocketIoChannel {
    me: Weak<SocketIoChannel>,
    /// Namespace key (`""` is the root).
    namespace: String,
    /// Namespace as written on the wire.
    wire: String,
    manager: Arc<Manager>,
    state: Mutex<ChannelState>,
    buffer: Mutex<Vec<Vec<Value>>>,
    listeners: ListenerRegistry,
}

impl SocketIoChannel {
    /// Creates an idle channel on `manager`.
    pub(super) fn new(namespace: &str, manager: Arc<Manager>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            namespace: namespace.to_string(),
            wire: wire_namespace(namespace).to_string(),
            manager,
            state: Mutex::new(ChannelState::Idle),
            buffer: Mutex::new(Vec::new()),
            listeners: ListenerRegistry::new(),
        })
    }

    /// Returns the namespace as written on the wire.
    #[inline]
    #[must_use]
    pub fn wire_namespace(&self) -> &str {
        &self.wire
    }

    /// Returns the manager this channel is attached to.
    #[inline]
    #[must_use]
    pub fn manager(&self) -> &Arc<Manager> {
        &self.manager
    }

    // ========================================================================
    // Manager Callbacks
    // ========================================================================

    pub(super) fn on_connected(&self) {
        let flushed = {
            let mut state = self.state.lock();
            if *state != ChannelState::Connecting {
                return;
            }
            *state = ChannelState::Connected;

            // Flushed under the state lock so a concurrent emit cannot
            // overtake the buffered ones.
            let buffered = std::mem::take(&mut *self.buffer.lock());
            for args in &buffered {
                let _ = self.send_event(args);
            }
            buffered.len()
        };

        debug!(namespace = %self.wire, buffered = flushed, "Namespace connected");
        self.listeners.dispatch(EVENT_CONNECT, &[]);
    }

    pub(super) fn on_connect_error(&self, message: &str) {
        {
            let mut state = self.state.lock();
            if *state == ChannelState::Closed {
                return;
            }
            *state = ChannelState::Errored;
        }

        debug!(namespace = %self.wire, error = message, "Namespace connect error");
        self.buffer.lock().clear();
        self.listeners
            .dispatch(EVENT_CONNECT_ERROR, &[Value::from(message)]);
    }

    pub(super) fn on_closed(&self, reason: &str) {
        let previous = {
            let mut state = self.state.lock();
            let previous = *state;
            match previous {
                ChannelState::Connected => *state = ChannelState::Closed,
                ChannelState::Connecting => *state = ChannelState::Errored,
                _ => return,
            }
            previous
        };

        self.buffer.lock().clear();
        if previous == ChannelState::Connected {
            self.listeners
                .dispatch(EVENT_DISCONNECT, &[Value::from(reason)]);
        } else {
            self.listeners
                .dispatch(EVENT_CONNECT_ERROR, &[Value::from(reason)]);
        }
    }

    pub(super) fn on_event(&self, event: &str, args: &[Value]) {
        if *self.state.lock() != ChannelState::Connected {
            trace!(namespace = %self.wire, event, "Dropping event for unconnected namespace");
            return;
        }
        let invoked = self.listeners.dispatch(event, args);
        trace!(namespace = %self.wire, event, invoked, "Event received");
    }

    fn send_event(&self, args: &[Value]) -> Result<()> {
        self.manager
            .send(EnginePacket::Message(SocketPacket::event(&self.wire, args)))
    }
}

impl fmt::Debug for SocketIoChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketIoChannel")
            .field("namespace", &self.namespace)
            .field("state", &*self.state.lock())
            .field("manager", &self.manager.url().as_str())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Channel Implementation
// ============================================================================

impl Channel for SocketIoChannel {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn state(&self) -> ChannelState {
        *self.state.lock()
    }

    fn connect(&self) {
        {
            let mut state = self.state.lock();
            if matches!(*state, ChannelState::Connecting | ChannelState::Connected) {
                return;
            }
            *state = ChannelState::Connecting;
        }

        if let Some(me) = self.me.upgrade() {
            self.manager.attach(&me);
        }
    }

    fn disconnect(&self) {
        let previous = std::mem::replace(&mut *self.state.lock(), ChannelState::Closed);
        if previous == ChannelState::Closed {
            return;
        }
        self.buffer.lock().clear();

        if previous == ChannelState::Connected {
            let _ = self
                .manager
                .send(EnginePacket::Message(SocketPacket::disconnect(&self.wire)));
        }
        self.manager.detach(&self.wire, &self.me);
        debug!(namespace = %self.wire, "Namespace disconnected");

        if previous == ChannelState::Connected {
            self.listeners
                .dispatch(EVENT_DISCONNECT, &[Value::from("io client disconnect")]);
        }
    }

    fn emit(&self, args: &[Value]) -> Result<()> {
        if args.is_empty() {
            return Err(Error::invalid_argument("emit needs an event name"));
        }

        let state = self.state.lock();
        match *state {
            ChannelState::Connected => self.send_event(args),
            ChannelState::Idle | ChannelState::Connecting => {
                self.buffer.lock().push(args.to_vec());
                Ok(())
            }
            ChannelState::Errored | ChannelState::Closed => Err(Error::ConnectionClosed),
        }
    }

    fn on(&self, event: &str, listener: Listener) -> ListenerId {
        self.listeners.add(event, listener)
    }

    fn remove_listener(&self, event: &str, id: ListenerId) -> bool {
        self.listeners.remove(event, id)
    }
}

impl Drop for SocketIoChannel {
    fn drop(&mut self) {
        if *self.state.get_mut() != ChannelState::Closed {
            self.manager.detach(&self.wire, &self.me);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::thread;

    use serde_json::json;
    use url::Url;

    use crate::transport::socketio::manager::QueuedFrames;

    fn detached(namespace: &str) -> (Arc<SocketIoChannel>, QueuedFrames) {
        let origin = Url::parse("http://127.0.0.1:9/").unwrap();
        let manager = Manager::new(&origin, None).unwrap();
        let frames = manager.open_detached();
        (SocketIoChannel::new(namespace, manager), frames)
    }

    fn event_frame(wire: &str, args: &[Value]) -> String {
        EnginePacket::Message(SocketPacket::event(wire, args)).encode()
    }

    #[test]
    fn test_buffered_emits_precede_later_ones() {
        let (channel, mut frames) = detached("/chat");
        channel.connect();
        channel.emit(&[json!("a")]).unwrap();
        channel.emit(&[json!("b")]).unwrap();
        assert_eq!(channel.state(), ChannelState::Connecting);

        channel.on_connected();
        channel.emit(&[json!("c")]).unwrap();

        assert_eq!(
            frames.drain(),
            vec![
                EnginePacket::Message(SocketPacket::connect("/chat")).encode(),
                event_frame("/chat", &[json!("a")]),
                event_frame("/chat", &[json!("b")]),
                event_frame("/chat", &[json!("c")]),
            ]
        );
    }

    #[test]
    fn test_emits_racing_connect_keep_their_order() {
        const COUNT: u64 = 500;
        let (channel, mut frames) = detached("/chat");
        channel.connect();

        let emitter = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || {
                for n in 0..COUNT {
                    channel.emit(&[json!("n"), json!(n)]).unwrap();
                }
            })
        };
        while channel.buffer.lock().is_empty() && channel.state() == ChannelState::Connecting {
            thread::yield_now();
        }
        channel.on_connected();
        emitter.join().unwrap();

        let sent: Vec<u64> = frames
            .drain()
            .iter()
            .filter_map(|frame| match EnginePacket::decode(frame).ok()? {
                EnginePacket::Message(packet) => packet.event_parts()?.1.first()?.as_u64(),
                _ => None,
            })
            .collect();
        assert_eq!(sent, (0..COUNT).collect::<Vec<_>>());
    }

    #[test]
    fn test_emit_after_disconnect_is_refused() {
        let (channel, _frames) = detached("");
        channel.connect();
        channel.on_connected();
        channel.disconnect();

        assert!(matches!(
            channel.emit(&[json!("late")]),
            Err(Error::ConnectionClosed)
        ));
        assert!(matches!(
            channel.emit(&[]),
            Err(Error::InvalidArgument { .. })
        ));
    }
}
