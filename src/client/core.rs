//! Core Client struct, dispatcher and accessors.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::level_filters::LevelFilter;
use tracing::{Instrument, debug, info, info_span};
use url::Url;

use crate::action::{Action, Outcome, Timeout};
use crate::error::Result;
use crate::session::{CookieJar, PageInfo, Session, SocketEvent, close_channels};
use crate::transport::{ChannelState, ChannelTransport, HttpClient, HttpResponse, Method};

use super::builder::ClientBuilder;
use super::config::{ClientConfig, FALLBACK_TIMEOUT};

// ============================================================================
// ClientInner
// ============================================================================

/// Internal shared state for a client.
pub(crate) struct ClientInner {
    /// Session label, attached to every log line.
    pub identity: String,
    /// Configured log level.
    pub log_level: LevelFilter,
    /// Server root every path is resolved against.
    pub base_url: Url,
    /// Namespace used when an action names none.
    pub default_namespace: String,
    /// Timeout used when an action sets none.
    pub default_timeout: Option<Timeout>,
    /// HTTP capability.
    pub http: Arc<dyn HttpClient>,
    /// Channel capability.
    pub transport: Arc<dyn ChannelTransport>,
    /// Session cookie store.
    pub cookies: CookieJar,
    /// Page, ajax result, event and static cache.
    ///
    /// Never held across an await point.
    pub session: Mutex<Session>,
}

// ============================================================================
// Client
// ============================================================================

/// A session-aware client driving one simulated browser tab.
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct Client {
    pub(crate) inner: Arc<ClientInner>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("identity", &self.inner.identity)
            .field("base_url", &self.inner.base_url.as_str())
            .field("default_namespace", &self.inner.default_namespace)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Creates a client from a configuration with the bundled transports.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the configuration is invalid.
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        ClientBuilder::new().config(config).build()
    }
}

// ============================================================================
// Client - Dispatch
// ============================================================================

impl Client {
    /// Executes one action against the session.
    ///
    /// A `&str` or `String` is a GET page load of that path.
    ///
    /// # Errors
    ///
    /// Returns the handler's error unchanged. Precondition failures leave the
    /// session untouched.
    pub async fn dispatch(&self, action: impl Into<Action>) -> Result<Outcome> {
        let action = action.into();
        let span = info_span!("session", identity = %self.inner.identity);
        self.route(action).instrument(span).await
    }

    /// Decodes a JSON action and executes it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownActionKind`](crate::Error::UnknownActionKind)
    /// before any I/O if the kind names no action.
    pub async fn dispatch_value(&self, value: &Value) -> Result<Outcome> {
        let action = Action::from_value(value)?;
        self.dispatch(action).await
    }

    async fn route(&self, action: Action) -> Result<Outcome> {
        let kind = action.kind();
        debug!(kind = %kind, "Dispatching action");

        match action {
            Action::Request(http) => self.execute_http(kind, http).await,
            Action::Ajax(mut http) => {
                http.ajax = true;
                self.execute_http(kind, http).await
            }
            Action::Get(mut http) => {
                http.method = Method::Get;
                self.execute_http(kind, http).await
            }
            Action::Post(mut http) => {
                http.method = Method::Post;
                self.execute_http(kind, http).await
            }
            Action::PageUnload => {
                self.unload_page();
                Ok(Outcome::None)
            }
            Action::LoadStaticAssets(assets) => self.load_static_assets(assets).await,
            Action::Connect(connect) => self.connect(connect).await,
            Action::Emit(emit) => self.emit(emit).map(|()| Outcome::None),
            Action::AwaitEmit(watch) => self.await_emit(watch).await.map(Outcome::Event),
            Action::ConfirmNoEmit(watch) => {
                self.confirm_no_emit(watch).await.map(|()| Outcome::None)
            }
            Action::ConfirmNoMatchingEmit(watch) => self
                .confirm_no_matching_emit(watch)
                .await
                .map(|()| Outcome::None),
            Action::ConnectAndAwaitEmit(compound) => self
                .connect_and_await_emit(compound)
                .await
                .map(Outcome::Event),
            Action::ConnectAndConfirmNoEmit(compound) => self
                .connect_and_confirm_no_emit(compound)
                .await
                .map(|()| Outcome::None),
        }
    }
}

// ============================================================================
// Client - Accessors
// ============================================================================

impl Client {
    /// Returns the session label.
    #[inline]
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.inner.identity
    }

    /// Returns the configured log level.
    #[inline]
    #[must_use]
    pub fn log_level(&self) -> LevelFilter {
        self.inner.log_level
    }

    /// Returns an `EnvFilter` directive enabling this crate at the configured level.
    #[must_use]
    pub fn log_directive(&self) -> String {
        format!("duplex_e2e={}", self.inner.log_level).to_ascii_lowercase()
    }

    /// Returns the server root.
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Returns the namespace used when an action names none.
    #[inline]
    #[must_use]
    pub fn default_namespace(&self) -> &str {
        &self.inner.default_namespace
    }

    /// Returns the session cookie store.
    #[inline]
    #[must_use]
    pub fn cookies(&self) -> &CookieJar {
        &self.inner.cookies
    }

    /// Sets a session cookie.
    pub fn set_cookie(&self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.cookies.set(name, value);
    }

    /// Returns the value of a session cookie.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.inner.cookies.get(name)
    }

    /// Returns a snapshot of the current page.
    #[must_use]
    pub fn page(&self) -> Option<PageInfo> {
        self.inner.session.lock().page.as_ref().map(|page| page.info())
    }

    /// Returns the last ajax response.
    #[must_use]
    pub fn ajax_result(&self) -> Option<HttpResponse> {
        self.inner.session.lock().ajax.clone()
    }

    /// Returns the last captured event.
    #[must_use]
    pub fn last_event(&self) -> Option<SocketEvent> {
        self.inner.session.lock().event.clone()
    }

    /// Returns the number of cached static assets.
    #[must_use]
    pub fn static_cache_len(&self) -> usize {
        self.inner.session.lock().static_cache.len()
    }

    /// Returns `true` if the asset at `path` is cached.
    #[must_use]
    pub fn is_cached(&self, path: &str) -> bool {
        self.inner.session.lock().static_cache.contains(path)
    }

    /// Returns the cached body of the asset at `path`.
    #[must_use]
    pub fn cached_asset(&self, path: &str) -> Option<String> {
        self.inner
            .session
            .lock()
            .static_cache
            .get(path)
            .map(str::to_string)
    }

    /// Returns the state of the channel recorded for `namespace` on the current page.
    #[must_use]
    pub fn channel_state(&self, namespace: &str) -> Option<ChannelState> {
        self.inner
            .session
            .lock()
            .page
            .as_ref()
            .and_then(|page| page.channels.get(namespace))
            .map(|channel| channel.state())
    }
}

// ============================================================================
// Client - Clearing
// ============================================================================

impl Client {
    /// Resets the session for the next script.
    ///
    /// Unloads the page (closing its channels), drops the ajax result and
    /// current event, and empties the cookie jar. The static cache survives.
    pub fn clear(&self) {
        let stale = self.inner.session.lock().unload();
        close_channels(stale);
        self.inner.cookies.clear();
        info!(identity = %self.inner.identity, "Session cleared");
    }

    /// Drops every cached static asset.
    pub fn clear_static_cache(&self) {
        self.inner.session.lock().static_cache.clear();
        debug!("Static cache cleared");
    }
}

// ============================================================================
// Client - Internal
// ============================================================================

impl Client {
    /// Resolves the effective timeout: action, then session default, then fallback.
    pub(crate) fn effective_timeout(&self, timeout: Option<&Timeout>) -> Duration {
        timeout
            .or(self.inner.default_timeout.as_ref())
            .map_or(FALLBACK_TIMEOUT, Timeout::resolve)
    }

    /// Returns `namespace`, or the session default when absent.
    pub(crate) fn namespace_or_default(&self, namespace: Option<String>) -> String {
        namespace.unwrap_or_else(|| self.inner.default_namespace.clone())
    }

    /// Resolves a path (or absolute URL) against the server root.
    pub(crate) fn resolve_url(&self, path: &str) -> Result<Url> {
        Ok(self.inner.base_url.join(path)?)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::error::Error;
    use crate::testing::mock_client;

    #[tokio::test]
    async fn test_bare_path_loads_page() {
        let (client, http, _) = mock_client();
        http.route("/home", 200, "<h1>home</h1>");

        let outcome = client.dispatch("/home").await.unwrap();

        assert_eq!(outcome.response().map(|r| r.status), Some(200));
        let page = client.page().unwrap();
        assert_eq!(page.body, "<h1>home</h1>");
        assert_eq!(page.url.path(), "/home");
    }

    #[tokio::test]
    async fn test_unknown_kind_is_local() {
        let (client, http, transport) = mock_client();

        let err = client
            .dispatch_value(&json!({ "kind": "teleport", "path": "/x" }))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::UnknownActionKind { .. }));
        assert_eq!(http.calls(), 0);
        assert!(transport.opened().is_empty());
        assert!(client.page().is_none());
    }

    #[tokio::test]
    async fn test_preconditions_leave_session_untouched() {
        let (client, http, transport) = mock_client();

        let actions = [
            Action::ajax(Method::Get, "/api"),
            Action::post("/form"),
            Action::connect("/chat"),
            Action::emit("/chat", vec![json!("hi")]),
            Action::await_emit("/chat", "hi"),
            Action::confirm_no_emit("/chat", "hi"),
        ];

        for action in actions {
            let err = client.dispatch(action).await.unwrap_err();
            assert!(err.is_precondition(), "unexpected error: {err}");
        }

        assert_eq!(http.calls(), 0);
        assert!(transport.opened().is_empty());
        assert!(client.page().is_none());
        assert!(client.ajax_result().is_none());
        assert!(client.last_event().is_none());
    }

    #[tokio::test]
    async fn test_get_unload_get_round_trip() {
        let (client, http, _) = mock_client();
        http.route("/p", 200, "body");

        client.dispatch("/p").await.unwrap();
        client.dispatch(Action::connect("")).await.unwrap();
        let first = client.page().unwrap();
        assert_eq!(first.namespaces, vec![String::new()]);

        client.dispatch(Action::unload()).await.unwrap();
        assert!(client.page().is_none());

        client.dispatch("/p").await.unwrap();
        let second = client.page().unwrap();

        assert_eq!(first.status, second.status);
        assert_eq!(first.body, second.body);
        assert_ne!(first.id, second.id);
        assert!(second.namespaces.is_empty());
    }

    #[tokio::test]
    async fn test_clear_keeps_static_cache() {
        let (client, http, transport) = mock_client();
        http.route("/", 200, r#"<script src="/app.js"></script>"#);
        http.route("/app.js", 200, "console.log(1)");

        client.set_cookie("sid", "abc");
        client.dispatch("/").await.unwrap();
        client.dispatch(Action::connect("")).await.unwrap();
        client.dispatch(Action::load_static_assets()).await.unwrap();

        client.clear();

        assert!(client.page().is_none());
        assert!(client.cookies().is_empty());
        assert!(client.is_cached("/app.js"));
        assert_eq!(transport.channel("").unwrap().disconnects(), 1);

        client.clear_static_cache();
        assert_eq!(client.static_cache_len(), 0);
    }

    #[test]
    fn test_effective_timeout_priority() {
        let (client, _, _) = mock_client();
        assert_eq!(client.effective_timeout(None), FALLBACK_TIMEOUT);

        let explicit = Timeout::Fixed(Duration::from_millis(10));
        assert_eq!(
            client.effective_timeout(Some(&explicit)),
            Duration::from_millis(10)
        );
    }

    #[test]
    fn test_log_directive() {
        let (client, _, _) = mock_client();
        assert_eq!(client.log_directive(), "duplex_e2e=info");
    }

    #[test]
    fn test_namespace_defaulting() {
        let (client, _, _) = mock_client();
        assert_eq!(client.namespace_or_default(None), "");
        assert_eq!(client.namespace_or_default(Some("/x".into())), "/x");
    }
}
