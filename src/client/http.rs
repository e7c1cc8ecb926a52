//! HTTP action execution.

use tracing::{debug, warn};

use crate::action::{ActionKind, HttpAction, Outcome};
use crate::error::{Error, Result};
use crate::session::{Page, close_channels};
use crate::transport::{HttpRequest, HttpResponse, Method};

use super::Client;

// ============================================================================
// Client - HTTP
// ============================================================================

impl Client {
    /// Executes an HTTP action and places its response.
    ///
    /// Ajax calls and POSTs require a current page. The response becomes the
    /// ajax result, the new page, or nothing when discarded.
    pub(crate) async fn execute_http(&self, kind: ActionKind, action: HttpAction) -> Result<Outcome> {
        let needs_page = action.ajax || action.method == Method::Post;
        if needs_page && self.inner.session.lock().page.is_none() {
            return Err(Error::no_page_loaded(kind.as_str()));
        }

        let response = self.fetch(&action).await?;

        if action.discard_response {
            return Ok(Outcome::Discarded(response));
        }

        if action.ajax {
            self.inner.session.lock().ajax = Some(response.clone());
            return Ok(Outcome::Ajax(response));
        }

        let stale = self
            .inner
            .session
            .lock()
            .replace_page(Page::from_response(&response));
        close_channels(stale);

        Ok(Outcome::Page(response))
    }

    /// Sends the request with parameters evaluated now.
    async fn fetch(&self, action: &HttpAction) -> Result<HttpResponse> {
        let request = HttpRequest {
            method: action.method,
            url: self.resolve_url(&action.path)?,
            params: action
                .params
                .iter()
                .map(|(name, value)| (name.clone(), value.resolve()))
                .collect(),
            ajax: action.ajax,
        };

        debug!(
            method = %request.method,
            path = %action.path,
            ajax = request.ajax,
            "Sending request"
        );

        let response = self
            .inner
            .http
            .request(&request, &self.inner.cookies)
            .await
            .map_err(|e| {
                warn!(path = %action.path, error = %e, "No response from server");
                Error::transport_unavailable(&action.path, e.to_string())
            })?;

        debug!(path = %action.path, status = response.status, "Response received");
        Ok(response)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use crate::action::{Action, HttpAction, Outcome};
    use crate::error::Error;
    use crate::testing::mock_client;
    use crate::transport::Method;

    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_non_success_status_is_ordinary_result() {
        let (client, http, _) = mock_client();
        http.route("/broken", 500, "boom");

        let outcome = client.dispatch("/broken").await.unwrap();

        assert_eq!(outcome.response().map(|r| r.status), Some(500));
        assert_eq!(client.page().map(|p| p.body), Some("boom".to_string()));
    }

    #[tokio::test]
    async fn test_unreachable_names_path() {
        let (client, http, _) = mock_client();
        http.unreachable("/down");

        let err = client.dispatch("/down").await.unwrap_err();

        assert!(matches!(err, Error::TransportUnavailable { ref path, .. } if path == "/down"));
        assert!(err.is_transport());
        assert!(client.page().is_none());
    }

    #[tokio::test]
    async fn test_ajax_keeps_page() {
        let (client, http, _) = mock_client();
        http.route("/", 200, "page");
        http.route("/api/me", 200, r#"{"id":1}"#);

        client.dispatch("/").await.unwrap();
        let outcome = client
            .dispatch(Action::ajax(Method::Get, "/api/me"))
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::Ajax(_)));
        assert_eq!(client.page().map(|p| p.body), Some("page".to_string()));
        assert_eq!(
            client.ajax_result().map(|r| r.body),
            Some(r#"{"id":1}"#.to_string())
        );
        assert!(http.requests()[1].ajax);
    }

    #[tokio::test]
    async fn test_discard_leaves_session_untouched() {
        let (client, http, _) = mock_client();
        http.route("/", 200, "page");
        http.route("/ping", 200, "pong");

        client.dispatch("/").await.unwrap();
        let outcome = client
            .dispatch(Action::request(
                HttpAction::new(Method::Get, "/ping").discard_response(),
            ))
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::Discarded(ref r) if r.body == "pong"));
        assert_eq!(client.page().map(|p| p.body), Some("page".to_string()));
    }

    #[tokio::test]
    async fn test_post_forces_method_and_evaluates_params_per_call() {
        let (client, http, _) = mock_client();
        http.route("/form", 200, "<form>");
        http.route("/submit", 200, "ok");

        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);
        let action = Action::Post(
            HttpAction::new(Method::Get, "/submit")
                .param("user", "alice")
                .param_with("nonce", move || {
                    counter_clone.fetch_add(1, Ordering::SeqCst).to_string()
                }),
        );

        client.dispatch("/form").await.unwrap();
        client.dispatch(action.clone()).await.unwrap();
        client.dispatch("/form").await.unwrap();
        client.dispatch(action).await.unwrap();

        let posts: Vec<_> = http
            .requests()
            .into_iter()
            .filter(|r| r.method == Method::Post)
            .collect();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].params[1], ("nonce".to_string(), "0".to_string()));
        assert_eq!(posts[1].params[1], ("nonce".to_string(), "1".to_string()));
    }

    #[tokio::test]
    async fn test_cookies_flow_through_jar() {
        let (client, http, _) = mock_client();
        http.route("/login", 200, "welcome");
        http.set_cookie("/login", "sid=s3cr3t; Path=/; HttpOnly");
        http.route("/profile", 200, "me");

        client.dispatch("/login").await.unwrap();
        client.dispatch("/profile").await.unwrap();

        assert_eq!(client.cookie("sid").as_deref(), Some("s3cr3t"));
        assert_eq!(http.last_cookie_header().as_deref(), Some("sid=s3cr3t"));
    }

    #[tokio::test]
    async fn test_new_page_closes_previous_channels() {
        let (client, http, transport) = mock_client();
        http.route("/a", 200, "a");
        http.route("/b", 200, "b");

        client.dispatch("/a").await.unwrap();
        client.dispatch(Action::connect("/chat")).await.unwrap();
        client
            .dispatch(Action::emit("/chat", vec![json!("hello")]))
            .await
            .unwrap();

        client.dispatch("/b").await.unwrap();

        assert_eq!(transport.channel("/chat").unwrap().disconnects(), 1);
        assert!(client.page().unwrap().namespaces.is_empty());
        assert!(client.channel_state("/chat").is_none());
    }
}
