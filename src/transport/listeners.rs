//! Per-channel listener registry.
//!
//! Shared by every [`Channel`](super::Channel) implementation. Listeners are
//! invoked outside the registry lock, so a listener may register or remove
//! listeners without deadlocking.

// ============================================================================
// Imports
// ============================================================================

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::trace;

use crate::identifiers::ListenerId;

use super::Listener;

// ============================================================================
// ListenerRegistry
// ============================================================================

/// Listeners keyed by event type.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Mutex<FxHashMap<String, Vec<(ListenerId, Listener)>>>,
}

impl ListenerRegistry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for `event`.
    pub fn add(&self, event: &str, listener: Listener) -> ListenerId {
        let id = ListenerId::next();
        self.listeners
            .lock()
            .entry(event.to_string())
            .or_default()
            .push((id, listener));
        trace!(event, %id, "Listener added");
        id
    }

    /// Removes a listener. Returns `true` if it was registered.
    pub fn remove(&self, event: &str, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let Some(entries) = listeners.get_mut(event) else {
            return false;
        };

        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        let removed = entries.len() != before;

        if entries.is_empty() {
            listeners.remove(event);
        }
        if removed {
            trace!(event, %id, "Listener removed");
        }
        removed
    }

    /// Invokes every listener registered for `event`.
    ///
    /// Returns the number of listeners invoked.
    pub fn dispatch(&self, event: &str, args: &[Value]) -> usize {
        let targets: Vec<Listener> = self
            .listeners
            .lock()
            .get(event)
            .map(|entries| entries.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default();

        for listener in &targets {
            listener(args);
        }
        targets.len()
    }

    /// Returns the total number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.lock().values().map(Vec::len).sum()
    }

    /// Returns `true` if no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of listeners registered for `event`.
    #[must_use]
    pub fn count(&self, event: &str) -> usize {
        self.listeners.lock().get(event).map_or(0, Vec::len)
    }
}

// ============================================================================
// Tests
// ============================================================================
