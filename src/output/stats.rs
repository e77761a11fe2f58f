//! Crawl statistics
//!
//! This module derives summary numbers from a finished [`CrawlResult`] and
//! renders them for the command line.

use crate::output::records::CrawlResult;
use serde::{Deserialize, Serialize};

/// Crawl statistics summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrawlStats {
    /// Number of distinct URLs that produced a record
    pub visited_urls: usize,

    /// Successful pages divided by pages crawled (0 when nothing was crawled)
    pub success_rate: f64,

    /// Wall-clock seconds per crawled page
    pub avg_time_per_page: f64,

    pub images_found: usize,
    pub images_downloaded: usize,
    pub videos_found: usize,
    pub videos_downloaded: usize,
}

impl CrawlStats {
    /// Computes statistics from a result whose clock has been stopped
    pub fn compute(result: &CrawlResult) -> Self {
        let (success_rate, avg_time_per_page) = if result.pages_crawled > 0 {
            (
                result.success_pages as f64 / result.pages_crawled as f64,
                result.duration / result.pages_crawled as f64,
            )
        } else {
            (0.0, 0.0)
        };

        let mut stats = CrawlStats {
            visited_urls: result.visited_urls().len(),
            success_rate,
            avg_time_per_page,
            ..CrawlStats::default()
        };

        for page in result.pages() {
            stats.images_found += page.images.len();
            stats.images_downloaded += page
                .images
                .iter()
                .filter(|image| image.local_path.is_some())
                .count();
            stats.videos_found += page.videos.len();
            stats.videos_downloaded += page
                .videos
                .iter()
                .filter(|video| video.local_path.is_some())
                .count();
        }

        stats
    }
}

/// Prints crawl statistics to stdout
pub fn print_statistics(result: &CrawlResult) {
    let stats = &result.stats;

    println!("=== Crawl Statistics ===\n");
    println!("Seed: {} (depth {})", result.url, result.depth);
    println!("Duration: {:.2}s", result.duration);
    println!();

    println!("Pages:");
    println!("  Crawled: {}", result.pages_crawled);
    println!("  Succeeded: {}", result.success_pages);
    println!("  Failed: {}", result.failed_pages);
    println!("  Success rate: {:.1}%", stats.success_rate * 100.0);
    println!("  Avg time per page: {:.2}s", stats.avg_time_per_page);
    println!();

    println!("Media:");
    println!(
        "  Images: {} found, {} downloaded",
        stats.images_found, stats.images_downloaded
    );
    println!(
        "  Videos: {} found, {} downloaded",
        stats.videos_found, stats.videos_downloaded
    );

    let failures: Vec<_> = result.results.iter().filter(|r| r.is_failure()).collect();
    if !failures.is_empty() {
        println!("\nFailures:");
        for record in failures.iter().take(20) {
            println!("  - {}", record.url());
        }
        if failures.len() > 20 {
            println!("  ... and {} more", failures.len() - 20);
        }
    }

    if let Some(error) = &result.error {
        println!("\nCrawl ended early: {}", error);
    }
}
