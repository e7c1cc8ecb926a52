//! Script definitions and their JSON form.
//!
//! # Format
//!
//! ```json
//! {
//!   "name": "login-and-chat",
//!   "delay": 250,
//!   "actions": [
//!     "/",
//!     { "kind": "post", "path": "/login", "params": { "user": "alice" } },
//!     { "kind": "channel-connect", "namespace": "/chat", "delay": 0 }
//!   ]
//! }
//! ```
//!
//! `delay` is milliseconds. A step's own `delay` overrides the script's.

// ============================================================================
// Imports
// ============================================================================

use std::path::Path;
use std::time::Duration;

use serde_json::Value;

use crate::action::{Action, Delay};
use crate::error::{Error, Result};

// ============================================================================
// ScriptStep
// ============================================================================

/// One action in a script, with an optional delay before it runs.
#[derive(Debug, Clone)]
pub struct ScriptStep {
    /// Action to dispatch.
    pub action: Action,
    /// Overrides the script delay for this step.
    pub delay: Option<Delay>,
}

impl ScriptStep {
    /// Creates a step with no delay of its own.
    #[inline]
    #[must_use]
    pub fn new(action: impl Into<Action>) -> Self {
        Self {
            action: action.into(),
            delay: None,
        }
    }

    /// Sets the delay applied before this step.
    #[inline]
    #[must_use]
    pub fn with_delay(mut self, delay: impl Into<Delay>) -> Self {
        self.delay = Some(delay.into());
        self
    }
}

impl From<Action> for ScriptStep {
    fn from(action: Action) -> Self {
        Self::new(action)
    }
}

impl From<&str> for ScriptStep {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

// ============================================================================
// Script
// ============================================================================

/// A named, ordered sequence of actions.
#[derive(Debug, Clone)]
pub struct Script {
    /// Script name, used in logs and errors.
    pub name: String,
    /// Default delay before each step.
    pub delay: Option<Delay>,
    /// Steps, in execution order.
    pub steps: Vec<ScriptStep>,
}

impl Script {
    /// Creates an empty script.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            delay: None,
            steps: Vec::new(),
        }
    }

    /// Sets the default delay before each step.
    #[must_use]
    pub fn with_delay(mut self, delay: impl Into<Delay>) -> Self {
        self.delay = Some(delay.into());
        self
    }

    /// Appends a step.
    #[must_use]
    pub fn step(mut self, step: impl Into<ScriptStep>) -> Self {
        self.steps.push(step.into());
        self
    }

    /// Returns the delay to apply before `step`.
    #[must_use]
    pub fn delay_for(&self, step: &ScriptStep) -> Option<Duration> {
        step.delay
            .as_ref()
            .or(self.delay.as_ref())
            .map(Delay::resolve)
    }

    /// Decodes a script from JSON.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidScript`] if `name` is missing or empty, `actions`
    ///   is not an array, or a `delay` is not a number
    /// - Any error from [`Action::from_value`] for a bad step
    pub fn from_value(value: &Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(Error::invalid_script("script must be an object"));
        };

        let name = match map.get("name") {
            Some(Value::String(name)) if !name.trim().is_empty() => name.clone(),
            _ => return Err(Error::invalid_script("script requires a non-empty name")),
        };
        let Some(Value::Array(actions)) = map.get("actions") else {
            return Err(Error::invalid_script(format!(
                "script {name:?} requires an actions array"
            )));
        };

        let steps = actions
            .iter()
            .map(|entry| {
                let delay = match entry {
                    Value::Object(fields) => delay_field(fields.get("delay"))?,
                    _ => None,
                };
                Ok(ScriptStep {
                    action: Action::from_value(entry)?,
                    delay,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name,
            delay: delay_field(map.get("delay"))?,
            steps,
        })
    }

    /// Decodes a script from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] for malformed text, otherwise as
    /// [`from_value`](Self::from_value).
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(&value)
    }

    /// Reads and decodes a script file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, otherwise as
    /// [`from_json`](Self::from_json).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

fn delay_field(value: Option<&Value>) -> Result<Option<Delay>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(ms)) => ms
            .as_u64()
            .map(|ms| Some(Delay::Fixed(Duration::from_millis(ms))))
            .ok_or_else(|| Error::invalid_script(format!("delay must be whole milliseconds, got {ms}"))),
        Some(other) => Err(Error::invalid_script(format!(
            "delay must be a number, got {other}"
        ))),
    }
}

// ============================================================================
// Tests
// ============================================================================
