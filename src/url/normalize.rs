//! URL canonicalization
//!
//! This module handles:
//! - Resolving references against the page they appear on
//! - Stripping fragments, default ports and trailing slashes
//! - Rejecting references that never lead to a document

use crate::UrlError;
use url::Url;

/// Schemes that never resolve to a crawlable document
const SKIPPED_SCHEMES: &[&str] = &["javascript:", "mailto:", "tel:", "data:"];

/// Normalizes a URL reference into its canonical form
///
/// # Normalization Steps
///
/// 1. Reject empty, fragment-only and non-navigable (`javascript:`, `mailto:`,
///    `tel:`, `data:`) references
/// 2. Resolve the reference against `base` (absolute references ignore it)
/// 3. Require an `http`/`https` scheme and a host
/// 4. Drop the query string and the fragment
/// 5. Remove a trailing slash, except for the bare root path
///
/// The result is scheme + host (+ port) + path, so
/// `normalize_url(normalized.as_str(), base)` returns the same URL.
///
/// # Examples
///
/// ```
/// use trawl::url::normalize_url;
/// use url::Url;
///
/// let base = Url::parse("https://example.com/docs/").unwrap();
/// let url = normalize_url("guide/?page=2#intro", &base).unwrap();
/// assert_eq!(url.as_str(), "https://example.com/docs/guide");
/// ```
pub fn normalize_url(href: &str, base: &Url) -> Result<Url, UrlError> {
    let mut url = resolve(href, base)?;

    url.set_query(None);
    url.set_fragment(None);

    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/');
        let trimmed = if trimmed.is_empty() { "/" } else { trimmed }.to_string();
        url.set_path(&trimmed);
    }

    Ok(url)
}

/// Parses and normalizes an absolute URL (used for seed URLs)
pub fn normalize_absolute(url_str: &str) -> Result<Url, UrlError> {
    let parsed = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    normalize_url(parsed.as_str(), &parsed)
}

/// Resolves a media reference to an absolute URL
///
/// Unlike [`normalize_url`] the query string survives: signed CDN media URLs
/// are useless without it. Only the fragment is dropped.
pub fn resolve_media_url(href: &str, base: &Url) -> Option<Url> {
    let mut url = resolve(href, base).ok()?;
    url.set_fragment(None);
    Some(url)
}

/// Shared resolution and scheme checks
fn resolve(href: &str, base: &Url) -> Result<Url, UrlError> {
    let href = href.trim();

    if href.is_empty() {
        return Err(UrlError::Parse("empty reference".to_string()));
    }

    if href.starts_with('#') {
        return Err(UrlError::FragmentOnly(href.to_string()));
    }

    let lower = href.to_ascii_lowercase();
    if let Some(scheme) = SKIPPED_SCHEMES.iter().find(|s| lower.starts_with(**s)) {
        return Err(UrlError::InvalidScheme(scheme.trim_end_matches(':').to_string()));
    }

    let url = base.join(href).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingDomain);
    }

    Ok(url)
}
