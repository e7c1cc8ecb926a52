//! In-crate fakes for the HTTP and channel capabilities.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::{Value, json};
use url::Url;

use crate::client::{Client, ServerConfig};
use crate::error::{Error, Result};
use crate::identifiers::ListenerId;
use crate::session::CookieJar;
use crate::transport::{
    Channel, ChannelConfig, ChannelState, ChannelTransport, EVENT_CONNECT, EVENT_CONNECT_ERROR,
    EVENT_DISCONNECT, HttpClient, HttpRequest, HttpResponse, Listener, ListenerRegistry,
    namespace_of,
};

// ============================================================================
// ConnectBehavior
// ============================================================================

/// How a [`MockChannel`] answers `connect`.
#[derive(Debug, Clone)]
pub(crate) enum ConnectBehavior {
    /// Connects synchronously inside `connect`.
    Immediate,
    /// Connects after a delay.
    After(Duration),
    /// Reports `connect_error` synchronously.
    Error(String),
    /// Stays connecting forever.
    Never,
}

/// Replies with `reply` (and the emitted args after the name) whenever
/// `on` is emitted.
#[derive(Debug, Clone)]
pub(crate) struct Echo {
    on: String,
    reply: String,
    delay: Duration,
}

// ============================================================================
// MockChannel
// ============================================================================

/// Scriptable [`Channel`].
pub(crate) struct MockChannel {
    me: Weak<MockChannel>,
    namespace: String,
    state: Mutex<ChannelState>,
    behavior: Mutex<ConnectBehavior>,
    echoes: Mutex<Vec<Echo>>,
    listeners: ListenerRegistry,
    emitted: Mutex<Vec<Vec<Value>>>,
    disconnects: AtomicUsize,
}

impl MockChannel {
    /// Creates an idle channel that connects immediately.
    pub(crate) fn new(namespace: &str) -> Arc<Self> {
        Self::with_behavior(namespace, ConnectBehavior::Immediate, Vec::new())
    }

    fn with_behavior(namespace: &str, behavior: ConnectBehavior, echoes: Vec<Echo>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            namespace: namespace.to_string(),
            state: Mutex::new(ChannelState::Idle),
            behavior: Mutex::new(behavior),
            echoes: Mutex::new(echoes),
            listeners: ListenerRegistry::new(),
            emitted: Mutex::new(Vec::new()),
            disconnects: AtomicUsize::new(0),
        })
    }

    /// Returns the number of listeners currently registered.
    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Dispatches an inbound event now.
    pub(crate) fn fire(&self, event: &str, args: Vec<Value>) {
        self.listeners.dispatch(event, &args);
    }

    /// Dispatches an inbound event after `delay`.
    pub(crate) fn fire_after(&self, delay: Duration, event: &str, args: Vec<Value>) {
        let Some(me) = self.me.upgrade() else {
            return;
        };
        let event = event.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            me.fire(&event, args);
        });
    }

    /// Returns every argument sequence emitted so far.
    pub(crate) fn emitted(&self) -> Vec<Vec<Value>> {
        self.emitted.lock().clone()
    }

    /// Returns how many times `disconnect` was called.
    pub(crate) fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    fn mark_connected(&self) {
        *self.state.lock() = ChannelState::Connected;
        self.fire(EVENT_CONNECT, Vec::new());
    }
}

impl Channel for MockChannel {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn state(&self) -> ChannelState {
        *self.state.lock()
    }

    fn connect(&self) {
        let behavior = self.behavior.lock().clone();
        *self.state.lock() = ChannelState::Connecting;

        match behavior {
            ConnectBehavior::Immediate => self.mark_connected(),
            ConnectBehavior::After(delay) => {
                let Some(me) = self.me.upgrade() else {
                    return;
                };
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if me.state() == ChannelState::Connecting {
                        me.mark_connected();
                    }
                });
            }
            ConnectBehavior::Error(message) => {
                *self.state.lock() = ChannelState::Errored;
                self.fire(EVENT_CONNECT_ERROR, vec![json!(message)]);
            }
            ConnectBehavior::Never => {}
        }
    }

    fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        let was_connected = {
            let mut state = self.state.lock();
            let was = *state == ChannelState::Connected;
            *state = ChannelState::Closed;
            was
        };
        if was_connected {
            self.fire(EVENT_DISCONNECT, vec![json!("io client disconnect")]);
        }
    }

    fn emit(&self, args: &[Value]) -> Result<()> {
        self.emitted.lock().push(args.to_vec());

        let Some(name) = args.first().and_then(Value::as_str) else {
            return Ok(());
        };
        let replies: Vec<Echo> = self
            .echoes
            .lock()
            .iter()
            .filter(|echo| echo.on == name)
            .cloned()
            .collect();

        for echo in replies {
            self.fire_after(echo.delay, &echo.reply, args[1..].to_vec());
        }
        Ok(())
    }

    fn on(&self, event: &str, listener: Listener) -> ListenerId {
        self.listeners.add(event, listener)
    }

    fn remove_listener(&self, event: &str, id: ListenerId) -> bool {
        self.listeners.remove(event, id)
    }
}

// ============================================================================
// MockTransport
// ============================================================================

/// [`ChannelTransport`] that hands out [`MockChannel`]s and records every open.
#[derive(Default)]
pub(crate) struct MockTransport {
    opened: Mutex<Vec<(Url, ChannelConfig)>>,
    channels: Mutex<Vec<Arc<MockChannel>>>,
    behavior: Mutex<Option<ConnectBehavior>>,
    echoes: Mutex<Vec<Echo>>,
}

impl MockTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Sets how channels opened from now on answer `connect`.
    pub(crate) fn set_behavior(&self, behavior: ConnectBehavior) {
        *self.behavior.lock() = Some(behavior);
    }

    /// Adds an echo rule to channels opened from now on.
    pub(crate) fn echo(&self, on: &str, reply: &str, delay: Duration) {
        self.echoes.lock().push(Echo {
            on: on.to_string(),
            reply: reply.to_string(),
            delay,
        });
    }

    /// Returns every `(url, config)` passed to `open`.
    pub(crate) fn opened(&self) -> Vec<(Url, ChannelConfig)> {
        self.opened.lock().clone()
    }

    /// Returns the most recently opened channel for `namespace`.
    pub(crate) fn channel(&self, namespace: &str) -> Option<Arc<MockChannel>> {
        self.channels
            .lock()
            .iter()
            .rev()
            .find(|ch| ch.namespace == namespace)
            .cloned()
    }
}

impl ChannelTransport for MockTransport {
    fn open(&self, url: &Url, config: &ChannelConfig) -> Result<Arc<dyn Channel>> {
        self.opened.lock().push((url.clone(), config.clone()));

        let behavior = self
            .behavior
            .lock()
            .clone()
            .unwrap_or(ConnectBehavior::Immediate);
        let channel =
            MockChannel::with_behavior(namespace_of(url), behavior, self.echoes.lock().clone());
        self.channels.lock().push(Arc::clone(&channel));

        if config.auto_connect {
            channel.connect();
        }
        Ok(channel)
    }
}

// ============================================================================
// MockHttpClient
// ============================================================================

/// [`HttpClient`] serving canned responses by path.
#[derive(Default)]
pub(crate) struct MockHttpClient {
    routes: Mutex<FxHashMap<String, (u16, String)>>,
    set_cookies: Mutex<FxHashMap<String, Vec<String>>>,
    unreachable: Mutex<FxHashSet<String>>,
    requests: Mutex<Vec<HttpRequest>>,
    cookie_headers: Mutex<Vec<Option<String>>>,
}

impl MockHttpClient {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Serves `status` and `body` for `path`. Unrouted paths get a 404.
    pub(crate) fn route(&self, path: &str, status: u16, body: &str) {
        self.routes
            .lock()
            .insert(path.to_string(), (status, body.to_string()));
    }

    /// Sends a `Set-Cookie` header on responses for `path`.
    pub(crate) fn set_cookie(&self, path: &str, header: &str) {
        self.set_cookies
            .lock()
            .entry(path.to_string())
            .or_default()
            .push(header.to_string());
    }

    /// Makes `path` fail without a response.
    pub(crate) fn unreachable(&self, path: &str) {
        self.unreachable.lock().insert(path.to_string());
    }

    /// Returns every request received.
    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Returns the total number of requests received.
    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    /// Returns the number of requests received for `path`.
    pub(crate) fn calls_to(&self, path: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.url.path() == path)
            .count()
    }

    /// Returns the `Cookie` header presented on the most recent request.
    pub(crate) fn last_cookie_header(&self) -> Option<String> {
        self.cookie_headers.lock().last().cloned().flatten()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn request(&self, request: &HttpRequest, jar: &CookieJar) -> Result<HttpResponse> {
        let path = request.url.path().to_string();
        self.requests.lock().push(request.clone());
        self.cookie_headers.lock().push(jar.header_value());

        if self.unreachable.lock().contains(&path) {
            return Err(Error::connection(format!("connection refused: {path}")));
        }

        if let Some(headers) = self.set_cookies.lock().get(&path) {
            for header in headers {
                jar.store_set_cookie(header);
            }
        }

        let (status, body) = self
            .routes
            .lock()
            .get(&path)
            .cloned()
            .unwrap_or((404, "not found".to_string()));

        Ok(HttpResponse {
            status,
            body,
            url: request.url.clone(),
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Builds a client on `http://localhost:3000/` wired to fresh fakes.
pub(crate) fn mock_client() -> (Client, Arc<MockHttpClient>, Arc<MockTransport>) {
    let http = MockHttpClient::new();
    let transport = MockTransport::new();

    let client = Client::builder()
        .identity("test")
        .server(ServerConfig::new("localhost", 3000))
        .http_client(http.clone())
        .channel_transport(transport.clone())
        .build()
        .expect("mock client builds");

    (client, http, transport)
}
