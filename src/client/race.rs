//! Event-versus-deadline race.
//!
//! Every suspension point on a channel (connect, await, confirm) resolves by
//! whichever of {matching event, deadline} happens first. [`EventRace`] owns
//! the listeners it installs through [`ListenerGuard`]s, so every exit path
//! (resolution, elapse, early return, drop of the future) deregisters them.
//!
//! Occurrences are stamped when the channel delivers them, and that stamp is
//! what gets judged: an event delivered at or after the deadline counts as
//! not having arrived in time, however late the waiting task is polled.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until, timeout_at};
use tracing::trace;

use crate::identifiers::ListenerId;
use crate::transport::{Channel, Listener};

// ============================================================================
// Types
// ============================================================================

/// One observed occurrence: event type, its arguments and when it arrived.
type Occurrence = (String, Vec<Value>, Instant);

/// How a race ended.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RaceOutcome<T> {
    /// An occurrence was accepted before the deadline.
    Resolved(T),
    /// The deadline passed first.
    Elapsed,
}

// ============================================================================
// ListenerGuard
// ============================================================================

/// Removes one listener from its channel when dropped.
pub(crate) struct ListenerGuard {
    channel: Arc<dyn Channel>,
    event: String,
    id: ListenerId,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.channel.remove_listener(&self.event, self.id);
        trace!(event = %self.event, id = %self.id, "Race listener released");
    }
}

// ============================================================================
// EventRace
// ============================================================================

/// Listeners installed on a channel, waiting to be raced against a deadline.
///
/// Install before triggering whatever produces the event so an immediate
/// occurrence is not missed.
pub(crate) struct EventRace {
    rx: mpsc::UnboundedReceiver<Occurrence>,
    _guards: Vec<ListenerGuard>,
}

impl EventRace {
    /// Installs one listener per event type on `channel`.
    pub(crate) fn install(channel: &Arc<dyn Channel>, events: &[&str]) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        let guards = events
            .iter()
            .map(|event| {
                let tx = tx.clone();
                let name = (*event).to_string();
                let listener: Listener = Arc::new(move |args: &[Value]| {
                    let _ = tx.send((name.clone(), args.to_vec(), Instant::now()));
                });

                ListenerGuard {
                    channel: Arc::clone(channel),
                    event: (*event).to_string(),
                    id: channel.on(event, listener),
                }
            })
            .collect();

        Self {
            rx,
            _guards: guards,
        }
    }

    /// Waits up to `limit` for an occurrence that `accept` turns into a value.
    ///
    /// Occurrences for which `accept` returns `None` are ignored and the
    /// window stays open. Listeners are released when this returns.
    pub(crate) async fn run<T, F>(mut self, limit: Duration, mut accept: F) -> RaceOutcome<T>
    where
        F: FnMut(&str, Vec<Value>) -> Option<T>,
    {
        let deadline = Instant::now() + limit;

        loop {
            let occurrence = match timeout_at(deadline, self.rx.recv()).await {
                Ok(Some(occurrence)) => occurrence,
                Ok(None) => {
                    // Listeners were dropped by the channel; nothing can arrive any more.
                    sleep_until(deadline).await;
                    return RaceOutcome::Elapsed;
                }
                // The timer may win the poll even though occurrences were
                // queued before the deadline.
                Err(_) => match self.rx.try_recv() {
                    Ok(occurrence) => occurrence,
                    Err(_) => return RaceOutcome::Elapsed,
                },
            };

            let (event, args, arrived) = occurrence;
            if arrived >= deadline {
                return RaceOutcome::Elapsed;
            }
            if let Some(value) = accept(&event, args) {
                return RaceOutcome::Resolved(value);
            }
            trace!(event = %event, "Occurrence ignored, window still open");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::testing::MockChannel;

    fn channel() -> (Arc<MockChannel>, Arc<dyn Channel>) {
        let mock = MockChannel::new("");
        let dyn_channel: Arc<dyn Channel> = mock.clone();
        (mock, dyn_channel)
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolves_on_first_accepted_event() {
        let (mock, channel) = channel();
        let race = EventRace::install(&channel, &["pong"]);
        assert_eq!(mock.listener_count(), 1);

        mock.fire_after(Duration::from_millis(50), "pong", vec![json!(7)]);
        let outcome = race
            .run(Duration::from_millis(100), |_, args| Some(args))
            .await;

        assert_eq!(outcome, RaceOutcome::Resolved(vec![json!(7)]));
        assert_eq!(mock.listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapses_and_releases_listeners() {
        let (mock, channel) = channel();
        let race = EventRace::install(&channel, &["connect", "connect_error"]);
        assert_eq!(mock.listener_count(), 2);

        let outcome: RaceOutcome<()> = race.run(Duration::from_millis(100), |_, _| Some(())).await;

        assert_eq!(outcome, RaceOutcome::Elapsed);
        assert_eq!(mock.listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_at_deadline_counts_as_elapsed() {
        let (mock, channel) = channel();
        let race = EventRace::install(&channel, &["pong"]);

        mock.fire_after(Duration::from_millis(100), "pong", vec![]);
        let outcome = race
            .run(Duration::from_millis(100), |_, args| Some(args))
            .await;

        assert_eq!(outcome, RaceOutcome::Elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_occurrences_keep_window_open() {
        let (mock, channel) = channel();
        let race = EventRace::install(&channel, &["n"]);

        mock.fire_after(Duration::from_millis(10), "n", vec![json!(1)]);
        mock.fire_after(Duration::from_millis(20), "n", vec![json!(2)]);
        mock.fire_after(Duration::from_millis(30), "n", vec![json!(3)]);

        let outcome = race
            .run(Duration::from_millis(100), |_, args| {
                (args == vec![json!(3)]).then_some(args)
            })
            .await;

        assert_eq!(outcome, RaceOutcome::Resolved(vec![json!(3)]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_arrival_time_decides_not_processing_time() {
        let (mock, channel) = channel();
        let race = EventRace::install(&channel, &["E"]);

        let late_poll = {
            let mock = Arc::clone(&mock);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(99)).await;
                mock.fire("E", vec![json!(99)]);
                tokio::time::advance(Duration::from_millis(5)).await;
            })
        };
        let outcome = race
            .run(Duration::from_millis(100), |_, args| Some(args))
            .await;
        late_poll.await.unwrap();

        assert_eq!(outcome, RaceOutcome::Resolved(vec![json!(99)]));
        assert_eq!(mock.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_drop_without_run_releases_listeners() {
        let (mock, channel) = channel();
        let race = EventRace::install(&channel, &["a", "b"]);
        assert_eq!(mock.listener_count(), 2);

        drop(race);
        assert_eq!(mock.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_event_fired_before_run_is_buffered() {
        let (mock, channel) = channel();
        let race = EventRace::install(&channel, &["early"]);

        mock.fire("early", vec![json!("x")]);
        let outcome = race
            .run(Duration::from_millis(50), |event, _| Some(event.to_string()))
            .await;

        assert_eq!(outcome, RaceOutcome::Resolved("early".to_string()));
    }
}
