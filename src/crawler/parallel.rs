//! Two-phase parallel crawl
//!
//! Phase 1 crawls the seed page alone. Phase 2 spreads the seed's outbound
//! links round-robin over independent worker crawlers, each with its own
//! frontier, fetcher and browser, and with link following disabled. Results
//! are merged only after every worker has finished.

use crate::config::CrawlConfig;
use crate::crawler::coordinator::{CrawlRequest, Crawler};
use crate::output::{CrawlResult, FailureRecord};
use crate::TrawlError;
use futures::future::join_all;
use std::collections::HashSet;

/// Depth recorded for pages fetched by phase-2 workers
const SECOND_LAYER: u32 = 1;

/// Splits `items` into at most `buckets` groups, dealing them out in turn
pub fn partition_round_robin<T>(items: Vec<T>, buckets: usize) -> Vec<Vec<T>> {
    let buckets = buckets.max(1).min(items.len().max(1));
    let mut groups: Vec<Vec<T>> = (0..buckets).map(|_| Vec::new()).collect();

    for (index, item) in items.into_iter().enumerate() {
        groups[index % buckets].push(item);
    }

    groups.retain(|group| !group.is_empty());
    groups
}

impl Crawler {
    /// Crawls the seed, then its outbound links with `workers` concurrent crawlers
    ///
    /// With a (clamped) depth of 0 this is the same as a depth-0 [`Crawler::crawl`].
    /// Phase 2 visits at most `max-pages` second-layer URLs that phase 1 did
    /// not already visit. Pages found by workers are recorded at depth 1.
    ///
    /// # Arguments
    ///
    /// * `request` - Seed, depth, AI settings
    /// * `workers` - Number of concurrent worker crawlers (at least 1)
    pub async fn crawl_parallel(
        &mut self,
        request: CrawlRequest,
        workers: usize,
    ) -> Result<CrawlResult, TrawlError> {
        let depth = self.effective_depth(request.depth);

        let mut result = self.crawl(request.clone().depth(0)).await?;
        result.depth = depth;

        if depth == 0 {
            return Ok(result);
        }

        let visited: HashSet<String> = result.visited_urls().into_iter().map(String::from).collect();
        let mut seen = HashSet::new();
        let targets: Vec<String> = result
            .pages()
            .flat_map(|page| page.links.iter())
            .filter(|link| !visited.contains(&link.url) && seen.insert(link.url.clone()))
            .map(|link| link.url.clone())
            .take(self.config().max_pages)
            .collect();

        if targets.is_empty() {
            tracing::info!("No second-layer links to crawl");
            result.finish();
            return Ok(result);
        }

        let mut worker_config = self.config().clone();
        worker_config.follow_links = false;

        let buckets = partition_round_robin(targets, workers);
        tracing::info!(
            "Crawling second layer with {} workers",
            buckets.len()
        );

        let handles: Vec<_> = buckets
            .iter()
            .cloned()
            .map(|bucket| {
                tokio::spawn(run_worker(
                    worker_config.clone(),
                    request.clone(),
                    bucket,
                ))
            })
            .collect();

        let outcomes = join_all(handles).await;

        for (bucket, outcome) in buckets.into_iter().zip(outcomes) {
            match outcome {
                Ok(worker_result) => result.absorb(worker_result),
                Err(e) => {
                    tracing::error!("Worker failed: {}", e);
                    for url in bucket {
                        result.record_failure(FailureRecord {
                            url,
                            depth: SECOND_LAYER,
                            status_code: None,
                            error: format!("worker failed: {}", e),
                        });
                    }
                }
            }
        }

        result.finish();
        Ok(result)
    }
}

/// Crawls each URL of a bucket at depth 0 with a fresh crawler
async fn run_worker(config: CrawlConfig, request: CrawlRequest, urls: Vec<String>) -> CrawlResult {
    let mut merged = CrawlResult::start(request.url.clone(), SECOND_LAYER, request.use_ai);

    let mut crawler = match Crawler::new(config) {
        Ok(crawler) => crawler,
        Err(e) => {
            for url in urls {
                merged.record_failure(FailureRecord {
                    url,
                    depth: SECOND_LAYER,
                    status_code: None,
                    error: e.to_string(),
                });
            }
            return merged;
        }
    };

    for url in urls {
        let page_request = CrawlRequest {
            url: url.clone(),
            ..request.clone()
        }
        .depth(0);

        match crawler.crawl(page_request).await {
            Ok(mut page_result) => {
                if let Some(error) = &page_result.error {
                    tracing::warn!("Worker crawl of {} ended early: {}", url, error);
                }
                for record in &mut page_result.results {
                    record.set_depth(SECOND_LAYER);
                }
                merged.absorb(page_result);
            }
            Err(e) => merged.record_failure(FailureRecord {
                url,
                depth: SECOND_LAYER,
                status_code: None,
                error: e.to_string(),
            }),
        }
    }

    merged
}
