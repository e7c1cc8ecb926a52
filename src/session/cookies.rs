//! Session cookie store.
//!
//! The jar is shared by the HTTP executor and the channel handshake: every
//! HTTP hop reads and writes it, and every channel-connect copies its current
//! contents into the handshake `Cookie` header.
//!
//! A session talks to exactly one server, so cookies are keyed by name only;
//! `Domain` and `Path` attributes are ignored.

// ============================================================================
// Imports
// ============================================================================

use chrono::{DateTime, NaiveDateTime, Utc};
use parking_lot::Mutex;

// ============================================================================
// CookieJar
// ============================================================================

/// Cookie store owned by one session.
///
/// Insertion order is preserved so the generated `Cookie` header is stable.
#[derive(Debug, Default)]
pub struct CookieJar {
    cookies: Mutex<Vec<(String, String)>>,
}

impl CookieJar {
    /// Creates an empty jar.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a cookie, replacing any existing value with the same name.
    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        let mut cookies = self.cookies.lock();

        match cookies.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => cookies.push((name, value)),
        }
    }

    /// Returns the value of a cookie.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        self.cookies
            .lock()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    /// Removes a cookie. Returns `true` if it existed.
    pub fn remove(&self, name: &str) -> bool {
        let mut cookies = self.cookies.lock();
        let before = cookies.len();
        cookies.retain(|(n, _)| n != name);
        cookies.len() != before
    }

    /// Removes all cookies.
    pub fn clear(&self) {
        self.cookies.lock().clear();
    }

    /// Returns the number of cookies.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.cookies.lock().len()
    }

    /// Returns `true` if the jar holds no cookies.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.lock().is_empty()
    }

    /// Returns a copy of all cookies in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, String)> {
        self.cookies.lock().clone()
    }

    /// Renders the jar as a `Cookie` request header value.
    ///
    /// Returns `None` when the jar is empty.
    #[must_use]
    pub fn header_value(&self) -> Option<String> {
        let cookies = self.cookies.lock();
        if cookies.is_empty() {
            return None;
        }

        let header = cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");

        Some(header)
    }

    /// Applies one `Set-Cookie` response header.
    ///
    /// A `Max-Age` of zero or less, or an `Expires` date that is not in the
    /// future, deletes the cookie. `Max-Age` wins when both are present.
    /// Malformed headers (no `=` in the first pair, empty name) are ignored.
    pub fn store_set_cookie(&self, header: &str) {
        let mut parts = header.split(';');

        let Some((name, value)) = parts.next().and_then(|pair| pair.split_once('=')) else {
            return;
        };
        let name = name.trim();
        if name.is_empty() {
            return;
        }

        let mut max_age = None;
        let mut expires = None;
        for (key, val) in parts.filter_map(|attr| attr.split_once('=')) {
            let key = key.trim();
            if key.eq_ignore_ascii_case("max-age") {
                max_age = val.trim().parse::<i64>().ok();
            } else if key.eq_ignore_ascii_case("expires") {
                expires = parse_cookie_date(val.trim());
            }
        }

        let expired = match (max_age, expires) {
            (Some(age), _) => age <= 0,
            (None, Some(at)) => at <= Utc::now(),
            (None, None) => false,
        };

        if expired {
            self.remove(name);
        } else {
            self.set(name, value.trim().trim_matches('"'));
        }
    }
}

/// Parses an `Expires` attribute.
///
/// Accepts the IMF-fixdate form (`Thu, 01 Jan 1970 00:00:00 GMT`) and the
/// dashed legacy form (`Thursday, 01-Jan-70 00:00:00 GMT`).
fn parse_cookie_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc2822(value) {
        return Some(at.with_timezone(&Utc));
    }

    ["%a, %d-%b-%Y %H:%M:%S GMT", "%A, %d-%b-%y %H:%M:%S GMT"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

// ============================================================================
// Tests
// ============================================================================
