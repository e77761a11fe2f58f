/// Checks if a host falls under a domain pattern
///
/// Patterns name a domain and everything beneath it; a leading `*.` is
/// accepted and means the same thing:
/// - "example.com" matches "example.com" and "blog.example.com"
/// - "*.example.com" matches exactly the same hosts
///
/// Matching is label-aligned, so "example.com" never matches "notexample.com".
/// Both sides are compared case-insensitively.
///
/// # Examples
///
/// ```
/// use trawl::url::matches_domain;
///
/// assert!(matches_domain("example.com", "example.com"));
/// assert!(matches_domain("example.com", "api.v2.example.com"));
/// assert!(matches_domain("*.example.com", "example.com"));
/// assert!(!matches_domain("example.com", "example.org"));
/// assert!(!matches_domain("example.com", "myexample.com"));
/// ```
pub fn matches_domain(pattern: &str, host: &str) -> bool {
    let base = pattern.strip_prefix("*.").unwrap_or(pattern);
    if base.is_empty() || host.is_empty() {
        return false;
    }

    let base = base.to_ascii_lowercase();
    let host = host.to_ascii_lowercase();

    host == base || host.ends_with(&format!(".{}", base))
}
