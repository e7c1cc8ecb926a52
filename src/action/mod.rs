//! Action vocabulary.
//!
//! An [`Action`] is one unit of work dispatched against a client session.
//! A bare path string is sugar for a GET page load:
//!
//! ```ignore
//! client.dispatch("/login").await?;
//! client.dispatch(Action::connect("/chat")).await?;
//! client.dispatch(Action::emit("/chat", vec![json!("join"), json!("lobby")])).await?;
//! client
//!     .dispatch(Action::await_emit("/chat", "joined").with_timeout(Duration::from_millis(500)))
//!     .await?;
//! ```
//!
//! # Kinds
//!
//! | Kind | Variant | Handled by |
//! |------|---------|------------|
//! | `generic-request` | [`Action::Request`] | HTTP executor |
//! | `ajax` | [`Action::Ajax`] | HTTP executor |
//! | `get` | [`Action::Get`] | HTTP executor |
//! | `post` | [`Action::Post`] | HTTP executor |
//! | `page-unload` | [`Action::PageUnload`] | socket lifecycle |
//! | `load-static-assets` | [`Action::LoadStaticAssets`] | asset crawler |
//! | `channel-connect` | [`Action::Connect`] | socket lifecycle |
//! | `emit` | [`Action::Emit`] | event protocol |
//! | `await-emit` | [`Action::AwaitEmit`] | event protocol |
//! | `confirm-no-emit` | [`Action::ConfirmNoEmit`] | event protocol |
//! | `confirm-no-matching-emit` | [`Action::ConfirmNoMatchingEmit`] | event protocol |
//! | `connect-and-await-emit` | [`Action::ConnectAndAwaitEmit`] | socket lifecycle + event protocol |
//! | `connect-and-confirm-no-emit` | [`Action::ConnectAndConfirmNoEmit`] | socket lifecycle + event protocol |

// ============================================================================
// Submodules
// ============================================================================

/// Fixed-or-computed values.
pub mod computed;

/// Kind discriminant.
pub mod kind;

/// JSON decoding.
mod parse;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::session::SocketEvent;
use crate::transport::{HttpResponse, Method};

pub use computed::{Computed, Delay, Param};
pub use kind::ActionKind;

// ============================================================================
// Types
// ============================================================================

/// Timeout of a suspension point.
pub type Timeout = Computed<Duration>;

/// Predicate over an event's argument sequence.
pub type ArgsPredicate = Arc<dyn Fn(&[Value]) -> bool + Send + Sync>;

// ============================================================================
// HttpAction
// ============================================================================

/// Fields of the HTTP kinds.
#[derive(Debug, Clone, Default)]
pub struct HttpAction {
    /// Request method. Forced by `get`/`post`.
    pub method: Method,
    /// Path relative to the server, or an absolute URL.
    pub path: String,
    /// Parameters, evaluated at call time.
    pub params: Vec<(String, Param)>,
    /// Store the response as the ajax result instead of the page. Forced by `ajax`.
    pub ajax: bool,
    /// Leave the session untouched and only return the response.
    pub discard_response: bool,
}

impl HttpAction {
    /// Creates a request for `path` with the given method.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            ..Self::default()
        }
    }

    /// Adds a fixed parameter.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params
            .push((name.into(), Param::Fixed(value.into())));
        self
    }

    /// Adds a parameter computed at call time.
    #[must_use]
    pub fn param_with<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.params.push((name.into(), Param::with(f)));
        self
    }

    /// Marks the request as ajax.
    #[must_use]
    pub fn ajax(mut self) -> Self {
        self.ajax = true;
        self
    }

    /// Discards the response instead of storing it.
    #[must_use]
    pub fn discard_response(mut self) -> Self {
        self.discard_response = true;
        self
    }
}

// ============================================================================
// StaticAssetsAction
// ============================================================================

/// Fields of `load-static-assets`.
#[derive(Debug, Clone)]
pub struct StaticAssetsAction {
    /// Extension allow-list, without dots. `None` uses the default list.
    pub extensions: Option<Vec<String>>,
    /// Store fetched bodies in the static cache.
    pub cache: bool,
}

impl Default for StaticAssetsAction {
    fn default() -> Self {
        Self {
            extensions: None,
            cache: true,
        }
    }
}

// ============================================================================
// Channel Actions
// ============================================================================

/// Fields of `channel-connect`.
#[derive(Debug, Clone, Default)]
pub struct ConnectAction {
    /// Namespace; the session default when `None`.
    pub namespace: Option<String>,
    /// Connect timeout.
    pub timeout: Option<Timeout>,
}

/// Fields of `emit`.
#[derive(Debug, Clone, Default)]
pub struct EmitAction {
    /// Namespace; the session default when `None`.
    pub namespace: Option<String>,
    /// Event name followed by its arguments.
    pub args: Vec<Value>,
}

/// Fields of `await-emit` and `confirm-no-emit`.
#[derive(Debug, Clone, Default)]
pub struct AwaitAction {
    /// Namespace; the session default when `None`.
    pub namespace: Option<String>,
    /// Event type to watch.
    pub event: String,
    /// Length of the watch window.
    pub timeout: Option<Timeout>,
}

/// Fields of `confirm-no-matching-emit`.
#[derive(Clone)]
pub struct MatchAction {
    /// Namespace; the session default when `None`.
    pub namespace: Option<String>,
    /// Event type to watch.
    pub event: String,
    /// Length of the watch window.
    pub timeout: Option<Timeout>,
    /// Occurrences for which this returns `true` fail the action.
    pub predicate: ArgsPredicate,
}

impl fmt::Debug for MatchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchAction")
            .field("namespace", &self.namespace)
            .field("event", &self.event)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Fields of the connect-then-watch compounds.
#[derive(Debug, Clone, Default)]
pub struct ConnectAwaitAction {
    /// Namespace; the session default when `None`.
    pub namespace: Option<String>,
    /// Event type to watch.
    pub event: String,
    /// Connect timeout; falls back to `timeout`.
    pub connect_timeout: Option<Timeout>,
    /// Length of the watch window.
    pub timeout: Option<Timeout>,
}

// ============================================================================
// Action
// ============================================================================

/// One unit of work dispatched against a session.
#[derive(Debug, Clone)]
pub enum Action {
    /// `generic-request`: method and ajax flag as given.
    Request(HttpAction),
    /// `ajax`: forces the ajax flag.
    Ajax(HttpAction),
    /// `get`: forces GET.
    Get(HttpAction),
    /// `post`: forces POST.
    Post(HttpAction),
    /// `page-unload`: closes channels and drops the page.
    PageUnload,
    /// `load-static-assets`: crawls the page for local assets.
    LoadStaticAssets(StaticAssetsAction),
    /// `channel-connect`: opens a namespace on the current page.
    Connect(ConnectAction),
    /// `emit`: fire-and-forget send.
    Emit(EmitAction),
    /// `await-emit`: one occurrence must arrive in time.
    AwaitEmit(AwaitAction),
    /// `confirm-no-emit`: no occurrence may arrive in time.
    ConfirmNoEmit(AwaitAction),
    /// `confirm-no-matching-emit`: no matching occurrence may arrive in time.
    ConfirmNoMatchingEmit(MatchAction),
    /// `connect-and-await-emit`
    ConnectAndAwaitEmit(ConnectAwaitAction),
    /// `connect-and-confirm-no-emit`
    ConnectAndConfirmNoEmit(ConnectAwaitAction),
}

// ============================================================================
// Action - Constructors
// ============================================================================

impl Action {
    /// GET page load.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::Get(HttpAction::new(Method::Get, path))
    }

    /// POST form submission.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::Post(HttpAction::new(Method::Post, path))
    }

    /// Ajax call with the given method.
    #[must_use]
    pub fn ajax(method: Method, path: impl Into<String>) -> Self {
        Self::Ajax(HttpAction::new(method, path).ajax())
    }

    /// Generic request.
    #[must_use]
    pub fn request(action: HttpAction) -> Self {
        Self::Request(action)
    }

    /// Page unload.
    #[must_use]
    pub fn unload() -> Self {
        Self::PageUnload
    }

    /// Static asset crawl with default settings.
    #[must_use]
    pub fn load_static_assets() -> Self {
        Self::LoadStaticAssets(StaticAssetsAction::default())
    }

    /// Channel connect on `namespace`.
    #[must_use]
    pub fn connect(namespace: impl Into<String>) -> Self {
        Self::Connect(ConnectAction {
            namespace: Some(namespace.into()),
            timeout: None,
        })
    }

    /// Emit on `namespace`; `args[0]` is the event name.
    #[must_use]
    pub fn emit(namespace: impl Into<String>, args: Vec<Value>) -> Self {
        Self::Emit(EmitAction {
            namespace: Some(namespace.into()),
            args,
        })
    }

    /// Await one `event` on `namespace`.
    #[must_use]
    pub fn await_emit(namespace: impl Into<String>, event: impl Into<String>) -> Self {
        Self::AwaitEmit(AwaitAction {
            namespace: Some(namespace.into()),
            event: event.into(),
            timeout: None,
        })
    }

    /// Confirm `event` does not arrive on `namespace`.
    #[must_use]
    pub fn confirm_no_emit(namespace: impl Into<String>, event: impl Into<String>) -> Self {
        Self::ConfirmNoEmit(AwaitAction {
            namespace: Some(namespace.into()),
            event: event.into(),
            timeout: None,
        })
    }

    /// Confirm no `event` whose args satisfy `predicate` arrives on `namespace`.
    #[must_use]
    pub fn confirm_no_matching_emit<F>(
        namespace: impl Into<String>,
        event: impl Into<String>,
        predicate: F,
    ) -> Self
    where
        F: Fn(&[Value]) -> bool + Send + Sync + 'static,
    {
        Self::ConfirmNoMatchingEmit(MatchAction {
            namespace: Some(namespace.into()),
            event: event.into(),
            timeout: None,
            predicate: Arc::new(predicate),
        })
    }

    /// Connect `namespace`, then await `event`.
    #[must_use]
    pub fn connect_and_await_emit(namespace: impl Into<String>, event: impl Into<String>) -> Self {
        Self::ConnectAndAwaitEmit(ConnectAwaitAction {
            namespace: Some(namespace.into()),
            event: event.into(),
            ..ConnectAwaitAction::default()
        })
    }

    /// Connect `namespace`, then confirm `event` does not arrive.
    #[must_use]
    pub fn connect_and_confirm_no_emit(
        namespace: impl Into<String>,
        event: impl Into<String>,
    ) -> Self {
        Self::ConnectAndConfirmNoEmit(ConnectAwaitAction {
            namespace: Some(namespace.into()),
            event: event.into(),
            ..ConnectAwaitAction::default()
        })
    }
}

// ============================================================================
// Action - Modifiers
// ============================================================================

impl Action {
    /// Sets the timeout on kinds that have one; other kinds are unchanged.
    #[must_use]
    pub fn with_timeout(self, timeout: impl Into<Timeout>) -> Self {
        let timeout = Some(timeout.into());
        match self {
            Self::Connect(mut a) => {
                a.timeout = timeout;
                Self::Connect(a)
            }
            Self::AwaitEmit(mut a) => {
                a.timeout = timeout;
                Self::AwaitEmit(a)
            }
            Self::ConfirmNoEmit(mut a) => {
                a.timeout = timeout;
                Self::ConfirmNoEmit(a)
            }
            Self::ConfirmNoMatchingEmit(mut a) => {
                a.timeout = timeout;
                Self::ConfirmNoMatchingEmit(a)
            }
            Self::ConnectAndAwaitEmit(mut a) => {
                a.timeout = timeout;
                Self::ConnectAndAwaitEmit(a)
            }
            Self::ConnectAndConfirmNoEmit(mut a) => {
                a.timeout = timeout;
                Self::ConnectAndConfirmNoEmit(a)
            }
            other => other,
        }
    }

    /// Sets the connect timeout of the compound kinds.
    #[must_use]
    pub fn with_connect_timeout(self, timeout: impl Into<Timeout>) -> Self {
        let timeout = Some(timeout.into());
        match self {
            Self::ConnectAndAwaitEmit(mut a) => {
                a.connect_timeout = timeout;
                Self::ConnectAndAwaitEmit(a)
            }
            Self::ConnectAndConfirmNoEmit(mut a) => {
                a.connect_timeout = timeout;
                Self::ConnectAndConfirmNoEmit(a)
            }
            other => other,
        }
    }

    /// Returns the kind of this action.
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Request(_) => ActionKind::Request,
            Self::Ajax(_) => ActionKind::Ajax,
            Self::Get(_) => ActionKind::Get,
            Self::Post(_) => ActionKind::Post,
            Self::PageUnload => ActionKind::PageUnload,
            Self::LoadStaticAssets(_) => ActionKind::LoadStaticAssets,
            Self::Connect(_) => ActionKind::ChannelConnect,
            Self::Emit(_) => ActionKind::Emit,
            Self::AwaitEmit(_) => ActionKind::AwaitEmit,
            Self::ConfirmNoEmit(_) => ActionKind::ConfirmNoEmit,
            Self::ConfirmNoMatchingEmit(_) => ActionKind::ConfirmNoMatchingEmit,
            Self::ConnectAndAwaitEmit(_) => ActionKind::ConnectAndAwaitEmit,
            Self::ConnectAndConfirmNoEmit(_) => ActionKind::ConnectAndConfirmNoEmit,
        }
    }
}

impl From<&str> for Action {
    fn from(path: &str) -> Self {
        Self::get(path)
    }
}

impl From<String> for Action {
    fn from(path: String) -> Self {
        Self::get(path)
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Successful result of an action.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Nothing to report (unload, emit, confirmed absence).
    None,
    /// New current page.
    Page(HttpResponse),
    /// New ajax result.
    Ajax(HttpResponse),
    /// Response of a discarded request.
    Discarded(HttpResponse),
    /// Channel connected on the namespace.
    Connected(String),
    /// Captured event, now the session's current event.
    Event(SocketEvent),
    /// Paths fetched by a static asset crawl.
    Assets(Vec<String>),
}

impl Outcome {
    /// Returns the HTTP response for the HTTP outcomes.
    #[must_use]
    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            Self::Page(r) | Self::Ajax(r) | Self::Discarded(r) => Some(r),
            _ => None,
        }
    }

    /// Returns the captured event.
    #[must_use]
    pub fn event(&self) -> Option<&SocketEvent> {
        match self {
            Self::Event(event) => Some(event),
            _ => None,
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

    #[test]
    fn test_bare_string_is_get() {
        let action: Action = "/index".into();
        assert_eq!(action.kind(), ActionKind::Get);
        match action {
            Action::Get(http) => {
                assert_eq!(http.path, "/index");
                assert_eq!(http.method, Method::Get);
            }
            other => panic!("expected Get, got {other:?}"),
        }
    }

    #[test]
    fn test_with_timeout_only_touches_timed_kinds() {
        let action = Action::await_emit("", "tick").with_timeout(Duration::from_millis(250));
        let Action::AwaitEmit(inner) = action else {
            panic!("expected AwaitEmit");
        };
        assert_eq!(
            inner.timeout.map(|t| t.resolve()),
            Some(Duration::from_millis(250))
        );

        let unchanged = Action::unload().with_timeout(Duration::from_secs(1));
        assert!(matches!(unchanged, Action::PageUnload));
    }

    #[test]
    fn test_connect_timeout_on_compound() {
        let action = Action::connect_and_await_emit("/chat", "hello")
            .with_connect_timeout(Duration::from_millis(100))
            .with_timeout(Duration::from_millis(900));

        let Action::ConnectAndAwaitEmit(inner) = action else {
            panic!("expected ConnectAndAwaitEmit");
        };
        assert_eq!(
            inner.connect_timeout.map(|t| t.resolve()),
            Some(Duration::from_millis(100))
        );
        assert_eq!(
            inner.timeout.map(|t| t.resolve()),
            Some(Duration::from_millis(900))
        );
    }

    #[test]
    fn test_http_action_builder() {
        let http = HttpAction::new(Method::Put, "/api/item")
            .param("name", "widget")
            .param_with("nonce", || "42".to_string())
            .ajax()
            .discard_response();

        assert!(http.ajax);
        assert!(http.discard_response);
        let params: Vec<_> = http
            .params
            .iter()
            .map(|(k, v)| (k.as_str(), v.resolve()))
            .collect();
        assert_eq!(
            params,
            vec![("name", "widget".to_string()), ("nonce", "42".to_string())]
        );
    }

    #[test]
    fn test_outcome_accessors() {
        let event = SocketEvent::new("", "pong", vec![json!(1)]);
        let outcome = Outcome::Event(event.clone());
        assert_eq!(outcome.event(), Some(&event));
        assert!(outcome.response().is_none());
    }

    #[test]
    fn test_kind_of_every_constructor() {
        let cases = [
            (Action::post("/f"), ActionKind::Post),
            (Action::ajax(Method::Get, "/a"), ActionKind::Ajax),
            (Action::request(HttpAction::default()), ActionKind::Request),
            (Action::load_static_assets(), ActionKind::LoadStaticAssets),
            (Action::connect(""), ActionKind::ChannelConnect),
            (Action::emit("", vec![json!("e")]), ActionKind::Emit),
            (Action::confirm_no_emit("", "e"), ActionKind::ConfirmNoEmit),
            (
                Action::confirm_no_matching_emit("", "e", |_| true),
                ActionKind::ConfirmNoMatchingEmit,
            ),
            (
                Action::connect_and_confirm_no_emit("", "e"),
                ActionKind::ConnectAndConfirmNoEmit,
            ),
        ];

        for (action, kind) in cases {
            assert_eq!(action.kind(), kind);
        }
    }
}
