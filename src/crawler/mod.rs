//! Crawler module for page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - Plain HTTP and headless-browser fetching
//! - Per-domain wait policies for rendered pages
//! - Content, link and layered video extraction
//! - The breadth-first frontier and the crawl loop
//! - The two-phase parallel crawl

mod coordinator;
mod extractor;
mod fetcher;
mod frontier;
mod parallel;
mod render;
pub mod video;

pub use coordinator::{CrawlRequest, Crawler};
pub use extractor::{parse_page, ExtractError, ExtractOptions, Extractor, ParsedPage};
pub use fetcher::{build_http_client, fetch_url, FetchResult, Fetcher};
pub use frontier::{CrawlTask, Frontier};
pub use parallel::partition_round_robin;
pub use render::{
    BrowserSession, RenderError, RenderedPage, TriggerAction, WaitPolicy, WaitPolicyRegistry,
};
