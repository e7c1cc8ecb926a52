//! Sequential script execution.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::time::sleep;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::action::Outcome;
use crate::client::Client;
use crate::error::{Error, Result};

use super::Script;

// ============================================================================
// ScriptRunner
// ============================================================================

/// Runs scripts against one client, one at a time.
///
/// # Example
///
/// ```no_run
/// use duplex_e2e::{Client, Script, ScriptRunner, ServerConfig};
///
/// # async fn example() -> duplex_e2e::Result<()> {
/// let client = Client::builder()
///     .server(ServerConfig::new("localhost", 3000))
///     .build()?;
/// let runner = ScriptRunner::new(client);
///
/// let script = Script::from_path("scripts/chat.json")?;
/// let outcomes = runner.run(&script).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ScriptRunner {
    client: Client,
    running: AtomicBool,
}

impl ScriptRunner {
    /// Wraps a client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            running: AtomicBool::new(false),
        }
    }

    /// Returns the wrapped client.
    #[inline]
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Returns `true` while a script is executing.
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Runs every step in order and returns their outcomes.
    ///
    /// Each step waits out its delay, then dispatches its action; the next
    /// step starts only after the previous one finished. The first failing
    /// step aborts the script. Whatever the result, the session is cleared
    /// before returning.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidScript`] if the script has no name
    /// - [`Error::ScriptAlreadyRunning`] if another script is executing
    /// - The first step's error otherwise
    pub async fn run(&self, script: &Script) -> Result<Vec<Outcome>> {
        if script.name.trim().is_empty() {
            return Err(Error::invalid_script("script requires a non-empty name"));
        }
        let _guard = RunningGuard::acquire(&self.running)
            .ok_or_else(|| Error::script_already_running(&script.name))?;

        let span = info_span!("script", name = %script.name);
        let result = self.run_steps(script).instrument(span).await;
        self.client.clear();

        match &result {
            Ok(outcomes) => info!(script = %script.name, steps = outcomes.len(), "Script finished"),
            Err(e) => warn!(script = %script.name, error = %e, "Script aborted"),
        }
        result
    }

    async fn run_steps(&self, script: &Script) -> Result<Vec<Outcome>> {
        info!(steps = script.steps.len(), "Script started");
        let mut outcomes = Vec::with_capacity(script.steps.len());

        for (index, step) in script.steps.iter().enumerate() {
            if let Some(delay) = script.delay_for(step)
                && !delay.is_zero()
            {
                debug!(step = index, delay_ms = delay.as_millis(), "Delaying step");
                sleep(delay).await;
            }

            let outcome = self.client.dispatch(step.action.clone()).await?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }
}

// ============================================================================
// RunningGuard
// ============================================================================

/// Holds the running flag; releases it on drop.
struct RunningGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunningGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

// ============================================================================
// Tests
// ============================================================================
