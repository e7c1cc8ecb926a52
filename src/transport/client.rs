//! Default [`HttpClient`] backed by `reqwest`.
//!
//! Redirects are followed by hand so the session jar sees every
//! `Set-Cookie` on the way and every hop carries the current cookies.
//!
//! | Status | Next hop |
//! |--------|----------|
//! | 301, 302, 303 | `GET` to `Location`, params dropped |
//! | 307, 308 | same method and params to `Location` |
//! | other | terminal |

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use reqwest::redirect::Policy;
use tracing::{debug, trace};
use url::Url;

use crate::error::{Error, Result};
use crate::session::CookieJar;

use super::{HttpClient, HttpRequest, HttpResponse, Method};

// ============================================================================
// Constants
// ============================================================================

/// Maximum redirect hops before giving up.
const MAX_REDIRECTS: usize = 10;

/// `X-Requested-With` value marking an XHR.
const XHR_MARKER: &str = "XMLHttpRequest";

/// `Accept` sent with ajax requests.
const AJAX_ACCEPT: &str = "application/json, text/javascript, */*; q=0.01";

/// `Content-Type` of form bodies.
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

// ============================================================================
// ReqwestHttpClient
// ============================================================================

/// HTTP client that shares its cookies with the session jar.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Creates a client with automatic redirects disabled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the TLS backend fails to initialize.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .build()?;
        Ok(Self { client })
    }

    async fn send_once(
        &self,
        method: Method,
        url: &Url,
        params: &[(String, String)],
        ajax: bool,
        jar: &CookieJar,
    ) -> Result<reqwest::Response> {
        let mut target = url.clone();
        let mut builder = if method.params_in_query() {
            if !params.is_empty() {
                target.query_pairs_mut().extend_pairs(params);
            }
            self.client.request(reqwest_method(method), target.as_str())
        } else {
            self.client
                .request(reqwest_method(method), target.as_str())
                .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
                .body(encode_form(params))
        };

        if let Some(cookie) = jar.header_value() {
            builder = builder.header(COOKIE, cookie);
        }
        if ajax {
            builder = builder
                .header("X-Requested-With", XHR_MARKER)
                .header(ACCEPT, AJAX_ACCEPT);
        }

        trace!(%method, url = %target, "HTTP hop");
        Ok(builder.send().await?)
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn request(&self, request: &HttpRequest, jar: &CookieJar) -> Result<HttpResponse> {
        let mut method = request.method;
        let mut url = request.url.clone();
        let mut params = request.params.clone();

        for _ in 0..=MAX_REDIRECTS {
            let response = self
                .send_once(method, &url, &params, request.ajax, jar)
                .await?;

            for header in response.headers().get_all(SET_COOKIE) {
                if let Ok(header) = header.to_str() {
                    jar.store_set_cookie(header);
                }
            }

            let status = response.status().as_u16();
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);

            match (status, location) {
                (301..=303, Some(location)) => {
                    url = url.join(&location)?;
                    method = Method::Get;
                    params.clear();
                    debug!(status, to = %url, "Following redirect");
                }
                (307 | 308, Some(location)) => {
                    url = url.join(&location)?;
                    debug!(status, to = %url, "Following redirect");
                }
                _ => {
                    let final_url = Url::parse(response.url().as_str())?;
                    let body = response.text().await?;
                    return Ok(HttpResponse {
                        status,
                        body,
                        url: final_url,
                    });
                }
            }
        }

        Err(Error::connection(format!(
            "more than {MAX_REDIRECTS} redirects from {}",
            request.url
        )))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
        Method::Head => reqwest::Method::HEAD,
    }
}

/// Encodes params as an `application/x-www-form-urlencoded` body.
fn encode_form(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(name, value)| {
            format!(
                "{}={}",
                urlencoding::encode(name),
                urlencoding::encode(value)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

// ============================================================================
// Tests
// ============================================================================
