//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the sequential crawl loop, which:
//! - Validates the seed and clamps the requested depth
//! - Opens the fetcher (and browser, in rendered mode) for the crawl
//! - Drains the frontier breadth-first, extracting and annotating pages
//! - Releases the browser on every exit path
//! - Produces the final [`CrawlResult`]

use crate::ai::{AiCapability, AiHook};
use crate::config::{validate, CrawlConfig};
use crate::crawler::extractor::Extractor;
use crate::crawler::fetcher::{build_http_client, FetchResult, Fetcher};
use crate::crawler::frontier::Frontier;
use crate::output::{CrawlResult, FailureRecord};
use crate::url::normalize_absolute;
use crate::TrawlError;
use futures::FutureExt;
use reqwest::Client;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use url::Url;

/// Parameters of one crawl call
#[derive(Clone)]
pub struct CrawlRequest {
    /// Seed URL (absolute http/https)
    pub url: String,

    /// Depth limit; clamped to the configured `max-depth`
    pub depth: u32,

    /// Run the AI hook on every page
    pub use_ai: bool,

    pub ai: Option<Arc<dyn AiCapability>>,

    /// Classification labels; empty means similarity against general categories
    pub keywords: Vec<String>,
}

impl CrawlRequest {
    /// A depth-1 crawl of `url` without AI
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            depth: 1,
            use_ai: false,
            ai: None,
            keywords: Vec::new(),
        }
    }

    pub fn depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    pub fn use_ai(mut self, use_ai: bool) -> Self {
        self.use_ai = use_ai;
        self
    }

    /// Enables the AI hook with `capability`
    pub fn with_ai(mut self, capability: Arc<dyn AiCapability>) -> Self {
        self.use_ai = true;
        self.ai = Some(capability);
        self
    }

    pub fn keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }
}

impl fmt::Debug for CrawlRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrawlRequest")
            .field("url", &self.url)
            .field("depth", &self.depth)
            .field("use_ai", &self.use_ai)
            .field("ai", &self.ai.as_ref().map(|_| "<capability>"))
            .field("keywords", &self.keywords)
            .finish()
    }
}

/// A crawler instance
///
/// Holds the validated configuration, the HTTP client and the extractor.
/// Every [`Crawler::crawl`] call gets its own frontier and fetcher, so crawl
/// state never leaks from one call into the next. The only thing remembered
/// is that the headless browser failed to start: rendered mode then stays off
/// for the rest of the instance's life.
pub struct Crawler {
    config: Arc<CrawlConfig>,
    client: Client,
    extractor: Extractor,
    render_unavailable: bool,
}

impl Crawler {
    /// Creates a new crawler
    ///
    /// # Returns
    ///
    /// * `Ok(Crawler)` - Configuration is valid and the HTTP client was built
    /// * `Err(TrawlError)` - Invalid configuration or client setup failure
    pub fn new(config: CrawlConfig) -> Result<Self, TrawlError> {
        validate(&config)?;

        let client = build_http_client(&config)?;
        let extractor = Extractor::new(&config, client.clone())?;

        Ok(Self {
            config: Arc::new(config),
            client,
            extractor,
            render_unavailable: false,
        })
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Clamps a requested depth to `max-depth`
    pub(crate) fn effective_depth(&self, requested: u32) -> u32 {
        if requested > self.config.max_depth {
            tracing::warn!(
                "Requested depth {} exceeds max-depth {}, clamping",
                requested,
                self.config.max_depth
            );
            self.config.max_depth
        } else {
            requested
        }
    }

    /// Crawls breadth-first from the request's seed URL
    ///
    /// Fetch, extraction, download and AI failures are recorded in the
    /// result. A panic inside the loop ends the crawl early and is recorded as
    /// the result's `error`; the pages gathered so far are still returned.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlResult)` - The crawl ran (possibly ending early)
    /// * `Err(TrawlError::InvalidSeed)` - The seed URL is not a usable http(s) URL
    pub async fn crawl(&mut self, request: CrawlRequest) -> Result<CrawlResult, TrawlError> {
        let seed = normalize_absolute(&request.url).map_err(|source| TrawlError::InvalidSeed {
            url: request.url.clone(),
            source,
        })?;

        let depth = self.effective_depth(request.depth);
        let mut result = CrawlResult::start(request.url.clone(), depth, request.use_ai);

        let hook = request.use_ai.then(|| {
            AiHook::new(
                request.ai.clone(),
                request.keywords.clone(),
                self.config.ai_timeout,
                self.config.summary_max_length,
            )
        });

        let render = self.config.use_headless_browser && !self.render_unavailable;
        let fetcher = Fetcher::open(&self.config, self.client.clone(), render).await;
        if render && !fetcher.is_rendered() {
            self.render_unavailable = true;
        }

        tracing::info!(
            "Starting crawl of {} (depth {}, {} mode)",
            seed,
            depth,
            if fetcher.is_rendered() { "rendered" } else { "lightweight" }
        );

        let mut frontier = Frontier::new(seed, depth, self.config.max_pages);

        let outcome = AssertUnwindSafe(self.run_loop(&fetcher, &mut frontier, hook.as_ref(), &mut result))
            .catch_unwind()
            .await;

        if let Err(panic) = outcome {
            let message = panic_message(panic.as_ref());
            tracing::error!("Crawl of {} ended early: {}", request.url, message);
            result.error = Some(message);
        }

        fetcher.close().await;
        result.finish();

        tracing::debug!(
            "Frontier for {}: {} URLs claimed, {} left in queue",
            request.url,
            frontier.visited_count(),
            frontier.queued_count()
        );

        tracing::info!(
            "Crawl of {} finished: {} pages ({} ok, {} failed) in {:.2}s",
            request.url,
            result.pages_crawled,
            result.success_pages,
            result.failed_pages,
            result.duration
        );

        Ok(result)
    }

    async fn run_loop(
        &self,
        fetcher: &Fetcher,
        frontier: &mut Frontier,
        hook: Option<&AiHook>,
        result: &mut CrawlResult,
    ) {
        let depth_limit = result.depth;

        while let Some(task) = frontier.next_task() {
            tracing::debug!("Fetching {} (depth {})", task.url, task.depth);

            match fetcher.fetch(&task.url).await {
                FetchResult::Success {
                    final_url,
                    body,
                    rendered,
                    ..
                } => {
                    let base = Url::parse(&final_url).unwrap_or_else(|_| task.url.clone());
                    let mut page = self
                        .extractor
                        .extract(&task.url, &base, &body, task.depth)
                        .await;
                    page.rendered = rendered;

                    if let Some(hook) = hook {
                        hook.annotate(&mut page).await;
                    }

                    let mut enqueued = 0;
                    if self.config.follow_links && task.depth < depth_limit {
                        for link in &page.links {
                            if let Ok(url) = Url::parse(&link.url) {
                                if frontier.enqueue(url, task.depth + 1) {
                                    enqueued += 1;
                                }
                            }
                        }
                    }

                    tracing::info!(
                        "Crawled {} ({} links, {} queued)",
                        task.url,
                        page.links.len(),
                        enqueued
                    );
                    result.record_page(page);
                }
                FetchResult::HttpError { status_code } => {
                    tracing::warn!("HTTP {} for {}", status_code, task.url);
                    result.record_failure(FailureRecord {
                        url: task.url.to_string(),
                        depth: task.depth,
                        status_code: Some(status_code),
                        error: format!("HTTP {}", status_code),
                    });
                }
                FetchResult::NetworkError { error } => {
                    tracing::warn!("Failed to fetch {}: {}", task.url, error);
                    result.record_failure(FailureRecord {
                        url: task.url.to_string(),
                        depth: task.depth,
                        status_code: None,
                        error,
                    });
                }
            }

            if frontier.has_work() && !self.config.delay.is_zero() {
                tokio::time::sleep(self.config.delay).await;
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("crawl loop panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("crawl loop panicked: {}", message)
    } else {
        "crawl loop panicked".to_string()
    }
}
