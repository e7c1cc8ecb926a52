//! JSON decoding of actions.
//!
//! # Format
//!
//! ```json
//! "/index"
//! { "kind": "post", "path": "/login", "params": { "user": "alice" } }
//! { "kind": "await-emit", "namespace": "/chat", "event": "joined", "timeout": 500 }
//! ```
//!
//! `kind` defaults to `get`. Timeouts are milliseconds. Predicates cannot be
//! written in JSON; `confirm-no-matching-emit` takes `argsEqual` (match when
//! the argument sequence equals it) or `argsContain` (match when any argument
//! equals it) instead.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::transport::Method;

use super::{
    Action, ActionKind, ArgsPredicate, AwaitAction, ConnectAction, ConnectAwaitAction, EmitAction,
    HttpAction, MatchAction, Param, StaticAssetsAction, Timeout,
};

// ============================================================================
// RawAction
// ============================================================================

/// Union of every kind's JSON fields.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawAction {
    path: Option<String>,
    method: Option<String>,
    /// Kept in document order; form fields are sent as written.
    params: Map<String, Value>,
    ajax: bool,
    discard_response: bool,
    namespace: Option<String>,
    timeout: Option<u64>,
    connect_timeout: Option<u64>,
    event: Option<String>,
    args: Vec<Value>,
    extensions: Option<Vec<String>>,
    cache: Option<bool>,
    args_equal: Option<Vec<Value>>,
    args_contain: Option<Value>,
}

impl RawAction {
    fn http(&self, kind: ActionKind, default_method: Method) -> Result<HttpAction> {
        let path = self
            .path
            .clone()
            .ok_or_else(|| Error::invalid_argument(format!("{kind} requires a path")))?;

        let method = match &self.method {
            Some(m) => m.parse()?,
            None => default_method,
        };

        let params = self
            .params
            .iter()
            .map(|(name, value)| (name.clone(), Param::Fixed(param_text(value))))
            .collect();

        Ok(HttpAction {
            method,
            path,
            params,
            ajax: self.ajax,
            discard_response: self.discard_response,
        })
    }

    fn event(&self, kind: ActionKind) -> Result<String> {
        self.event
            .clone()
            .filter(|e| !e.is_empty())
            .ok_or_else(|| Error::invalid_argument(format!("{kind} requires an event")))
    }

    fn predicate(&self) -> Result<ArgsPredicate> {
        if let Some(expected) = self.args_equal.clone() {
            let predicate: ArgsPredicate =
                Arc::new(move |args: &[Value]| args == expected.as_slice());
            return Ok(predicate);
        }
        if let Some(needle) = self.args_contain.clone() {
            let predicate: ArgsPredicate = Arc::new(move |args: &[Value]| args.contains(&needle));
            return Ok(predicate);
        }
        Err(Error::invalid_argument(
            "confirm-no-matching-emit requires argsEqual or argsContain",
        ))
    }

    fn into_action(self, kind: ActionKind) -> Result<Action> {
        let action = match kind {
            ActionKind::Request => Action::Request(self.http(kind, Method::Get)?),
            ActionKind::Ajax => {
                let mut http = self.http(kind, Method::Get)?;
                http.ajax = true;
                Action::Ajax(http)
            }
            ActionKind::Get => Action::Get(self.http(kind, Method::Get)?),
            ActionKind::Post => Action::Post(self.http(kind, Method::Post)?),
            ActionKind::PageUnload => Action::PageUnload,
            ActionKind::LoadStaticAssets => Action::LoadStaticAssets(StaticAssetsAction {
                extensions: self.extensions,
                cache: self.cache.unwrap_or(true),
            }),
            ActionKind::ChannelConnect => Action::Connect(ConnectAction {
                namespace: self.namespace,
                timeout: millis(self.timeout),
            }),
            ActionKind::Emit => Action::Emit(EmitAction {
                namespace: self.namespace,
                args: self.args,
            }),
            ActionKind::AwaitEmit | ActionKind::ConfirmNoEmit => {
                let inner = AwaitAction {
                    event: self.event(kind)?,
                    namespace: self.namespace,
                    timeout: millis(self.timeout),
                };
                if kind == ActionKind::AwaitEmit {
                    Action::AwaitEmit(inner)
                } else {
                    Action::ConfirmNoEmit(inner)
                }
            }
            ActionKind::ConfirmNoMatchingEmit => Action::ConfirmNoMatchingEmit(MatchAction {
                event: self.event(kind)?,
                predicate: self.predicate()?,
                namespace: self.namespace,
                timeout: millis(self.timeout),
            }),
            ActionKind::ConnectAndAwaitEmit | ActionKind::ConnectAndConfirmNoEmit => {
                let inner = ConnectAwaitAction {
                    event: self.event(kind)?,
                    namespace: self.namespace,
                    connect_timeout: millis(self.connect_timeout),
                    timeout: millis(self.timeout),
                };
                if kind == ActionKind::ConnectAndAwaitEmit {
                    Action::ConnectAndAwaitEmit(inner)
                } else {
                    Action::ConnectAndConfirmNoEmit(inner)
                }
            }
        };
        Ok(action)
    }
}

// ============================================================================
// Action - JSON
// ============================================================================

impl Action {
    /// Decodes an action from JSON.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownActionKind`] if `kind` names no action
    /// - [`Error::InvalidArgument`] if required fields are missing
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(path) => Ok(Self::get(path.as_str())),
            Value::Object(map) => {
                let kind = match map.get("kind") {
                    None | Some(Value::Null) => ActionKind::Get,
                    Some(Value::String(name)) => name.parse()?,
                    Some(other) => return Err(Error::unknown_action_kind(other.to_string())),
                };
                let raw: RawAction = serde_json::from_value(value.clone())?;
                raw.into_action(kind)
            }
            other => Err(Error::invalid_argument(format!(
                "action must be a path string or an object, got {other}"
            ))),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn millis(value: Option<u64>) -> Option<Timeout> {
    value.map(|ms| Timeout::Fixed(Duration::from_millis(ms)))
}

fn param_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_string_is_get() {
        let action = Action::from_value(&json!("/home")).unwrap();
        assert_eq!(action.kind(), ActionKind::Get);
    }

    #[test]
    fn test_missing_kind_defaults_to_get() {
        let action = Action::from_value(&json!({ "path": "/home" })).unwrap();
        let Action::Get(http) = action else {
            panic!("expected Get");
        };
        assert_eq!(http.path, "/home");
    }

    #[test]
    fn test_unknown_kind() {
        let err = Action::from_value(&json!({ "kind": "teleport" })).unwrap_err();
        assert!(matches!(err, Error::UnknownActionKind { ref kind } if kind == "teleport"));

        let err = Action::from_value(&json!({ "kind": 7 })).unwrap_err();
        assert!(matches!(err, Error::UnknownActionKind { .. }));
    }

    #[test]
    fn test_post_with_params() {
        let action = Action::from_value(&json!({
            "kind": "post",
            "path": "/login",
            "params": { "user": "alice", "remember": true }
        }))
        .unwrap();

        let Action::Post(http) = action else {
            panic!("expected Post");
        };
        assert_eq!(http.method, Method::Post);
        let params: Vec<_> = http
            .params
            .iter()
            .map(|(k, v)| (k.clone(), v.resolve()))
            .collect();
        assert_eq!(
            params,
            vec![
                ("user".to_string(), "alice".to_string()),
                ("remember".to_string(), "true".to_string()),
            ]
        );
    }

    #[test]
    fn test_params_keep_document_order() {
        let value: Value = serde_json::from_str(
            r#"{ "kind": "post", "path": "/form", "params": { "zeta": "1", "alpha": "2", "mid": "3" } }"#,
        )
        .unwrap();

        let Action::Post(http) = Action::from_value(&value).unwrap() else {
            panic!("expected Post");
        };
        let names: Vec<&str> = http.params.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_ajax_forces_flag_and_keeps_method() {
        let action = Action::from_value(&json!({
            "kind": "ajax",
            "path": "/api",
            "method": "put"
        }))
        .unwrap();

        let Action::Ajax(http) = action else {
            panic!("expected Ajax");
        };
        assert!(http.ajax);
        assert_eq!(http.method, Method::Put);
    }

    #[test]
    fn test_await_requires_event() {
        let err = Action::from_value(&json!({ "kind": "await-emit" })).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn test_compound_timeouts() {
        let action = Action::from_value(&json!({
            "kind": "connect-and-await-emit",
            "namespace": "/chat",
            "event": "hello",
            "connectTimeout": 100,
            "timeout": 400
        }))
        .unwrap();

        let Action::ConnectAndAwaitEmit(inner) = action else {
            panic!("expected ConnectAndAwaitEmit");
        };
        assert_eq!(inner.namespace.as_deref(), Some("/chat"));
        assert_eq!(
            inner.connect_timeout.map(|t| t.resolve()),
            Some(Duration::from_millis(100))
        );
    }

    #[test]
    fn test_matching_predicates() {
        let equal = Action::from_value(&json!({
            "kind": "confirm-no-matching-emit",
            "event": "message",
            "argsEqual": ["spam"]
        }))
        .unwrap();
        let Action::ConfirmNoMatchingEmit(inner) = equal else {
            panic!("expected ConfirmNoMatchingEmit");
        };
        assert!((inner.predicate)(&[json!("spam")]));
        assert!(!(inner.predicate)(&[json!("ham")]));

        let contain = Action::from_value(&json!({
            "kind": "confirm-no-matching-emit",
            "event": "message",
            "argsContain": 3
        }))
        .unwrap();
        let Action::ConfirmNoMatchingEmit(inner) = contain else {
            panic!("expected ConfirmNoMatchingEmit");
        };
        assert!((inner.predicate)(&[json!(1), json!(3)]));
    }

    #[test]
    fn test_matching_requires_predicate() {
        let err = Action::from_value(&json!({
            "kind": "confirm-no-matching-emit",
            "event": "message"
        }))
        .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn test_static_assets_defaults() {
        let action = Action::from_value(&json!({ "kind": "load-static-assets" })).unwrap();
        let Action::LoadStaticAssets(inner) = action else {
            panic!("expected LoadStaticAssets");
        };
        assert!(inner.cache);
        assert!(inner.extensions.is_none());
    }

    #[test]
    fn test_rejects_non_object() {
        let err = Action::from_value(&json!(42)).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }
}
