use crate::config::CrawlConfig;
use crate::url::matcher::matches_domain;
use url::Url;

/// Extracts the lowercase host from a URL, without the port
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Link admission policy built from `allow_domains` / `deny_domains`
///
/// An empty allow list admits every host. The deny list is checked after the
/// allow list and always wins.
#[derive(Debug, Clone, Default)]
pub struct DomainPolicy {
    allow: Vec<String>,
    deny: Vec<String>,
}

impl DomainPolicy {
    pub fn new(allow: Vec<String>, deny: Vec<String>) -> Self {
        Self { allow, deny }
    }

    pub fn from_config(config: &CrawlConfig) -> Self {
        Self::new(config.allow_domains.clone(), config.deny_domains.clone())
    }

    /// Returns true if a link to `url` may be recorded and followed
    pub fn admits(&self, url: &Url) -> bool {
        if url.scheme() != "http" && url.scheme() != "https" {
            return false;
        }

        let Some(domain) = extract_domain(url) else {
            return false;
        };

        if !self.allow.is_empty() && !self.allow.iter().any(|p| matches_domain(p, &domain)) {
            return false;
        }

        !self.deny.iter().any(|p| matches_domain(p, &domain))
    }
}
