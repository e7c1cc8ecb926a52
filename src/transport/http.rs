//! Session-bound HTTP capability.
//!
//! The client core never talks HTTP itself. It hands an [`HttpRequest`] and the
//! session [`CookieJar`] to an [`HttpClient`] implementation, which must follow
//! redirects to a terminal response and read/write cookies through the jar on
//! every hop.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::session::CookieJar;

// ============================================================================
// Method
// ============================================================================

/// HTTP request method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// `GET`
    #[default]
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
    /// `HEAD`
    Head,
}

impl Method {
    /// Returns the method name as sent on the wire.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
        }
    }

    /// Returns `true` if params travel in the query string rather than the body.
    #[inline]
    #[must_use]
    pub const fn params_in_query(self) -> bool {
        matches!(self, Self::Get | Self::Head | Self::Delete)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            other => Err(Error::invalid_argument(format!(
                "unsupported HTTP method: {other}"
            ))),
        }
    }
}

// ============================================================================
// HttpRequest
// ============================================================================

/// A fully resolved request, with dynamic params already evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Request method.
    pub method: Method,
    /// Absolute request URL.
    pub url: Url,
    /// Form or query parameters, in order.
    pub params: Vec<(String, String)>,
    /// Marks the request as an XHR.
    pub ajax: bool,
}

// ============================================================================
// HttpResponse
// ============================================================================

/// Terminal response after redirects.
///
/// A non-2xx status is a normal response, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body text.
    pub body: String,
    /// Final URL after redirects.
    pub url: Url,
}

impl HttpResponse {
    /// Returns `true` for a 2xx status.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// ============================================================================
// HttpClient
// ============================================================================

/// Session-bound HTTP client capability.
///
/// Implementations return `Err` only when no response was obtained at all
/// (server unreachable, connection reset). Any terminal status, including
/// 4xx and 5xx, is `Ok`.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Performs the request, following redirects and updating `jar`.
    async fn request(&self, request: &HttpRequest, jar: &CookieJar) -> Result<HttpResponse>;
}

// ============================================================================
// Tests
// ============================================================================
