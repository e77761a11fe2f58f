//! Output module for crawl results
//!
//! This module handles:
//! - The serializable result model (pages, failures, media and link references)
//! - Crawl statistics and their command-line rendering

mod records;
pub mod stats;

pub use records::{CrawlRecord, CrawlResult, FailureRecord, LinkRef, MediaRef, PageRecord};
pub use stats::{print_statistics, CrawlStats};
