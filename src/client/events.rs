//! Event protocol: emit, await and confirm.
//!
//! | Action | Event in time | Window elapses |
//! |--------|---------------|----------------|
//! | `await-emit` | success, event recorded | [`Error::AwaitTimeout`] |
//! | `confirm-no-emit` | [`Error::UnexpectedEmit`], event recorded | success |
//! | `confirm-no-matching-emit` | non-matching: ignored; matching: [`Error::UnexpectedEmit`] | success |
//!
//! `await-emit` and `confirm-no-emit` resolve on the first occurrence.
//! `confirm-no-matching-emit` keeps watching for the whole window.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info};

use crate::action::{
    ActionKind, ArgsPredicate, AwaitAction, ConnectAwaitAction, EmitAction, MatchAction,
};
use crate::error::{Error, Result};
use crate::session::SocketEvent;

use super::Client;
use super::race::{EventRace, RaceOutcome};
use super::sockets::millis;

// ============================================================================
// Client - Emit
// ============================================================================

impl Client {
    /// Handles `emit`. Returns as soon as the channel accepted the event.
    pub(crate) fn emit(&self, action: EmitAction) -> Result<()> {
        let namespace = self.namespace_or_default(action.namespace);
        let channel = self
            .inner
            .session
            .lock()
            .channel(ActionKind::Emit.as_str(), &namespace)?;

        let Some(event) = action.args.first().and_then(Value::as_str) else {
            return Err(Error::invalid_argument(
                "emit requires a non-empty argument list starting with the event name",
            ));
        };

        debug!(namespace = %namespace, event, args = action.args.len() - 1, "Emitting");
        channel.emit(&action.args)
    }
}

// ============================================================================
// Client - Await / Confirm
// ============================================================================

impl Client {
    /// Handles `await-emit`.
    pub(crate) async fn await_emit(&self, action: AwaitAction) -> Result<SocketEvent> {
        let namespace = self.namespace_or_default(action.namespace);
        let limit = self.effective_timeout(action.timeout.as_ref());
        let race = self.watch(ActionKind::AwaitEmit, &namespace, &action.event)?;

        self.finish_await(race, namespace, action.event, limit).await
    }

    /// Handles `confirm-no-emit`.
    pub(crate) async fn confirm_no_emit(&self, action: AwaitAction) -> Result<()> {
        let namespace = self.namespace_or_default(action.namespace);
        let limit = self.effective_timeout(action.timeout.as_ref());
        let race = self.watch(ActionKind::ConfirmNoEmit, &namespace, &action.event)?;

        self.finish_confirm(race, namespace, action.event, limit, None)
            .await
    }

    /// Handles `confirm-no-matching-emit`.
    pub(crate) async fn confirm_no_matching_emit(&self, action: MatchAction) -> Result<()> {
        let namespace = self.namespace_or_default(action.namespace);
        let limit = self.effective_timeout(action.timeout.as_ref());
        let race = self.watch(ActionKind::ConfirmNoMatchingEmit, &namespace, &action.event)?;

        self.finish_confirm(race, namespace, action.event, limit, Some(&action.predicate))
            .await
    }

    /// Handles `connect-and-await-emit`.
    pub(crate) async fn connect_and_await_emit(
        &self,
        action: ConnectAwaitAction,
    ) -> Result<SocketEvent> {
        let (race, namespace, limit) = self
            .connect_watching(ActionKind::ConnectAndAwaitEmit, &action)
            .await?;

        self.finish_await(race, namespace, action.event, limit).await
    }

    /// Handles `connect-and-confirm-no-emit`.
    pub(crate) async fn connect_and_confirm_no_emit(&self, action: ConnectAwaitAction) -> Result<()> {
        let (race, namespace, limit) = self
            .connect_watching(ActionKind::ConnectAndConfirmNoEmit, &action)
            .await?;

        self.finish_confirm(race, namespace, action.event, limit, None)
            .await
    }
}

// ============================================================================
// Client - Internal
// ============================================================================

impl Client {
    /// Installs a listener for `event` on the recorded channel.
    fn watch(&self, kind: ActionKind, namespace: &str, event: &str) -> Result<EventRace> {
        let channel = self
            .inner
            .session
            .lock()
            .channel(kind.as_str(), namespace)?;

        debug!(namespace = %namespace, event, "Watching for event");
        Ok(EventRace::install(&channel, &[event]))
    }

    /// Opens and connects a channel with the watch already installed, so an
    /// event sent by the server right after connecting is not missed.
    ///
    /// Returns the watch, the namespace and the watch window.
    async fn connect_watching(
        &self,
        kind: ActionKind,
        action: &ConnectAwaitAction,
    ) -> Result<(EventRace, String, Duration)> {
        let namespace = self.namespace_or_default(action.namespace.clone());
        let connect_limit = self.effective_timeout(
            action
                .connect_timeout
                .as_ref()
                .or(action.timeout.as_ref()),
        );
        let limit = self.effective_timeout(action.timeout.as_ref());

        let pending = self.open_channel(kind, &namespace)?;
        let race = EventRace::install(&pending.handle, &[action.event.as_str()]);
        self.establish(pending, connect_limit).await?;

        Ok((race, namespace, limit))
    }

    async fn finish_await(
        &self,
        race: EventRace,
        namespace: String,
        event: String,
        limit: Duration,
    ) -> Result<SocketEvent> {
        match race.run(limit, |_, args| Some(args)).await {
            RaceOutcome::Resolved(args) => {
                info!(namespace = %namespace, event = %event, "Awaited event arrived");
                Ok(self.record_event(namespace, event, args))
            }
            RaceOutcome::Elapsed => Err(Error::await_timeout(event, namespace, millis(limit))),
        }
    }

    async fn finish_confirm(
        &self,
        race: EventRace,
        namespace: String,
        event: String,
        limit: Duration,
        predicate: Option<&ArgsPredicate>,
    ) -> Result<()> {
        let outcome = race
            .run(limit, |_, args| {
                let matches = predicate.is_none_or(|predicate| predicate(&args));
                if !matches {
                    debug!(event = %event, "Non-matching occurrence ignored");
                }
                matches.then_some(args)
            })
            .await;

        match outcome {
            RaceOutcome::Resolved(args) => {
                info!(namespace = %namespace, event = %event, "Unexpected event arrived");
                Err(Error::unexpected_emit(
                    self.record_event(namespace, event, args),
                ))
            }
            RaceOutcome::Elapsed => {
                debug!(namespace = %namespace, event = %event, "Confirmed absence");
                Ok(())
            }
        }
    }

    /// Stores an occurrence as the session's current event.
    fn record_event(&self, namespace: String, event: String, args: Vec<Value>) -> SocketEvent {
        let event = SocketEvent::new(namespace, event, args);
        self.inner.session.lock().event = Some(event.clone());
        event
    }
}

// ============================================================================
// Tests
// ============================================================================
