//! Static asset crawler.
//!
//! Scans the current page for quoted `href=`/`src=` values, keeps local
//! references with an allowed extension, and fetches the ones not yet
//! cached, all at once.

// ============================================================================
// Imports
// ============================================================================

use std::sync::LazyLock;

use futures_util::future::try_join_all;
use regex::Regex;
use rustc_hash::FxHashSet;
use tracing::{debug, info, warn};
use url::Url;

use crate::action::{ActionKind, HttpAction, Outcome, StaticAssetsAction};
use crate::error::{Error, Result};
use crate::transport::Method;

use super::Client;

// ============================================================================
// Constants
// ============================================================================

/// Extensions fetched when an action gives no allow-list.
pub const DEFAULT_ASSET_EXTENSIONS: &[&str] =
    &["js", "css", "png", "jpg", "jpeg", "gif", "svg", "ico", "webp"];

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:href|src)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("attribute pattern is valid")
});

// ============================================================================
// Extraction
// ============================================================================

/// Returns local asset references in `body`, in first-occurrence order.
///
/// References with a scheme or a `//` host prefix are dropped, as are
/// references whose extension (case-insensitive) is not in `extensions`.
#[must_use]
pub fn extract_asset_references(body: &str, extensions: &[&str]) -> Vec<String> {
    let mut seen = FxHashSet::default();

    ATTRIBUTE
        .captures_iter(body)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().trim())
        .filter(|reference| is_local(reference) && has_extension(reference, extensions))
        .filter(|reference| seen.insert(*reference))
        .map(str::to_string)
        .collect()
}

fn is_local(reference: &str) -> bool {
    !reference.is_empty() && !reference.starts_with("//") && Url::parse(reference).is_err()
}

fn has_extension(reference: &str, extensions: &[&str]) -> bool {
    let path = reference
        .split(['?', '#'])
        .next()
        .unwrap_or(reference);
    let file = path.rsplit('/').next().unwrap_or(path);

    file.rsplit_once('.').is_some_and(|(_, ext)| {
        extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ext))
    })
}

/// Cache key of a resolved asset: path plus query.
fn cache_key(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_string(),
    }
}

// ============================================================================
// Client - Assets
// ============================================================================

impl Client {
    /// Handles `load-static-assets`.
    ///
    /// Returns the cache keys fetched. Without a page there is nothing to do.
    pub(crate) async fn load_static_assets(&self, action: StaticAssetsAction) -> Result<Outcome> {
        let Some((page_url, body)) = self
            .inner
            .session
            .lock()
            .page
            .as_ref()
            .filter(|page| !page.body.is_empty())
            .map(|page| (page.url.clone(), page.body.clone()))
        else {
            warn!("No page body to crawl for static assets");
            return Ok(Outcome::Assets(Vec::new()));
        };

        let extensions: Vec<&str> = match &action.extensions {
            Some(list) => list.iter().map(String::as_str).collect(),
            None => DEFAULT_ASSET_EXTENSIONS.to_vec(),
        };

        let candidates = self.uncached_assets(&page_url, &body, &extensions);
        if candidates.is_empty() {
            debug!("Every referenced asset is cached");
            return Ok(Outcome::Assets(Vec::new()));
        }

        info!(count = candidates.len(), "Fetching static assets");
        let cache = action.cache;
        let fetches = candidates.into_iter().map(|(key, url)| {
            let fetch = HttpAction::new(Method::Get, url.as_str()).discard_response();
            async move {
                let outcome = self.execute_http(ActionKind::Get, fetch).await?;
                if cache
                    && let Some(response) = outcome.response()
                {
                    self.inner
                        .session
                        .lock()
                        .static_cache
                        .insert(key.clone(), response.body.clone());
                }
                Ok::<_, Error>(key)
            }
        });

        let fetched = try_join_all(fetches).await?;
        Ok(Outcome::Assets(fetched))
    }

    /// Resolves references against the page and drops cached and duplicate keys.
    fn uncached_assets(&self, page_url: &Url, body: &str, extensions: &[&str]) -> Vec<(String, Url)> {
        let session = self.inner.session.lock();
        let mut seen = FxHashSet::default();

        extract_asset_references(body, extensions)
            .into_iter()
            .filter_map(|reference| page_url.join(&reference).ok())
            .map(|url| (cache_key(&url), url))
            .filter(|(key, _)| !session.static_cache.contains(key) && seen.insert(key.clone()))
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
