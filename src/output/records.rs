//! Crawl result records
//!
//! Every type here is a plain serializable record so a persistence layer can
//! write a [`CrawlResult`] as JSON (or any other serde format) unchanged.

use crate::ai::{AiAnalysis, PageSummary};
use crate::output::stats::CrawlStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

/// A media asset referenced by a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRef {
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Set only when the asset was downloaded
    pub local_path: Option<PathBuf>,

    /// The local copy is a best-effort concatenation with missing segments
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub partial: bool,
}

impl MediaRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            alt: None,
            title: None,
            local_path: None,
            partial: false,
        }
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title.filter(|t| !t.trim().is_empty());
        self
    }
}

/// An outbound link that passed the domain policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRef {
    pub url: String,
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Structured data extracted from one fetched page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    pub url: String,

    /// Depth at which the page was discovered (seed is 0)
    pub depth: u32,

    pub title: Option<String>,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
    pub images: Vec<MediaRef>,
    pub videos: Vec<MediaRef>,
    pub links: Vec<LinkRef>,
    pub timestamp: DateTime<Utc>,

    /// Fetched through the headless browser
    #[serde(default)]
    pub rendered: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_analysis: Option<AiAnalysis>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<PageSummary>,

    /// Extraction problem; the other fields hold whatever succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PageRecord {
    /// Creates an empty record for `url`, stamped with the current time
    pub fn new(url: impl Into<String>, depth: u32) -> Self {
        Self {
            url: url.into(),
            depth,
            title: None,
            text: String::new(),
            metadata: BTreeMap::new(),
            images: Vec::new(),
            videos: Vec::new(),
            links: Vec::new(),
            timestamp: Utc::now(),
            rendered: false,
            ai_analysis: None,
            summary: None,
            error: None,
        }
    }

    /// Appends an error message, keeping earlier ones
    pub fn push_error(&mut self, message: impl AsRef<str>) {
        match &mut self.error {
            Some(existing) => {
                existing.push_str("; ");
                existing.push_str(message.as_ref());
            }
            None => self.error = Some(message.as_ref().to_string()),
        }
    }
}

/// A page that could not be fetched
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub url: String,

    /// Depth at which the page was discovered
    pub depth: u32,

    /// HTTP status for status errors; `None` for transport errors
    pub status_code: Option<u16>,

    pub error: String,
}

/// One entry of [`CrawlResult::results`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CrawlRecord {
    Page(PageRecord),
    Failure(FailureRecord),
}

impl CrawlRecord {
    pub fn url(&self) -> &str {
        match self {
            CrawlRecord::Page(page) => &page.url,
            CrawlRecord::Failure(failure) => &failure.url,
        }
    }

    pub fn depth(&self) -> u32 {
        match self {
            CrawlRecord::Page(page) => page.depth,
            CrawlRecord::Failure(failure) => failure.depth,
        }
    }

    pub(crate) fn set_depth(&mut self, depth: u32) {
        match self {
            CrawlRecord::Page(page) => page.depth = depth,
            CrawlRecord::Failure(failure) => failure.depth = depth,
        }
    }

    pub fn as_page(&self) -> Option<&PageRecord> {
        match self {
            CrawlRecord::Page(page) => Some(page),
            CrawlRecord::Failure(_) => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, CrawlRecord::Failure(_))
    }
}

/// Aggregate outcome of one `crawl` / `crawl_parallel` call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResult {
    /// Seed URL as requested
    pub url: String,

    /// Effective depth limit
    pub depth: u32,

    pub use_ai: bool,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,

    /// `end_time - start_time` in seconds
    pub duration: f64,

    pub pages_crawled: usize,
    pub success_pages: usize,
    pub failed_pages: usize,
    pub results: Vec<CrawlRecord>,
    pub stats: CrawlStats,

    /// Set when the crawl loop ended early on an unrecovered error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CrawlResult {
    /// Starts a result clock for a crawl of `url`
    pub fn start(url: impl Into<String>, depth: u32, use_ai: bool) -> Self {
        let now = Utc::now();
        Self {
            url: url.into(),
            depth,
            use_ai,
            start_time: now,
            end_time: now,
            duration: 0.0,
            pages_crawled: 0,
            success_pages: 0,
            failed_pages: 0,
            results: Vec::new(),
            stats: CrawlStats::default(),
            error: None,
        }
    }

    pub fn record_page(&mut self, page: PageRecord) {
        self.pages_crawled += 1;
        self.success_pages += 1;
        self.results.push(CrawlRecord::Page(page));
    }

    pub fn record_failure(&mut self, failure: FailureRecord) {
        self.pages_crawled += 1;
        self.failed_pages += 1;
        self.results.push(CrawlRecord::Failure(failure));
    }

    /// Appends records and counters from another result
    pub fn absorb(&mut self, other: CrawlResult) {
        self.pages_crawled += other.pages_crawled;
        self.success_pages += other.success_pages;
        self.failed_pages += other.failed_pages;
        self.results.extend(other.results);
    }

    /// Successfully fetched pages, in crawl order
    pub fn pages(&self) -> impl Iterator<Item = &PageRecord> {
        self.results.iter().filter_map(CrawlRecord::as_page)
    }

    /// Every URL that produced a record
    pub fn visited_urls(&self) -> HashSet<&str> {
        self.results.iter().map(CrawlRecord::url).collect()
    }

    /// Stops the clock and computes statistics
    pub fn finish(&mut self) {
        self.end_time = Utc::now().max(self.start_time);
        self.duration = (self.end_time - self.start_time)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        self.stats = CrawlStats::compute(self);
    }
}
