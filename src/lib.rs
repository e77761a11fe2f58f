//! Trawl: a bounded-depth web crawler with media acquisition
//!
//! This crate implements a single-process crawl orchestrator that fetches pages
//! over plain HTTP or through a headless browser, extracts text, metadata, links,
//! images and videos, downloads media to content-addressed paths, and optionally
//! hands each page to an injected AI capability for classification and summaries.

pub mod ai;
pub mod config;
pub mod crawler;
pub mod media;
pub mod output;
pub mod url;

use thiserror::Error;

/// Main error type for Trawl operations
#[derive(Debug, Error)]
pub enum TrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid seed URL '{url}': {source}")]
    InvalidSeed { url: String, source: UrlError },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Extractor setup error: {0}")]
    Extract(#[from] crawler::ExtractError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Fragment-only reference: {0}")]
    FragmentOnly(String),
}

/// Result type alias for Trawl operations
pub type Result<T> = std::result::Result<T, TrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use ai::{AiCapability, AiError, AnalysisInput, AnalysisTask, TextSummary};
pub use config::CrawlConfig;
pub use crawler::{CrawlRequest, Crawler};
pub use output::{CrawlRecord, CrawlResult, FailureRecord, LinkRef, MediaRef, PageRecord};
pub use self::url::{normalize_url, DomainPolicy};
