//! URL handling module for Trawl
//!
//! This module provides URL canonicalization, media URL resolution, domain
//! pattern matching and the allow/deny admission policy for discovered links.

mod domain;
mod matcher;
mod normalize;

// Re-export main functions
pub use domain::{extract_domain, DomainPolicy};
pub use matcher::matches_domain;
pub use normalize::{normalize_absolute, normalize_url, resolve_media_url};
