//! Crawl frontier
//!
//! This module handles:
//! - The FIFO queue of URLs waiting to be fetched, with their depth
//! - The visited set, which admits each canonical URL once per crawl
//! - The depth and page-count bounds of a crawl

use std::collections::{HashSet, VecDeque};
use url::Url;

/// A URL waiting to be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    /// Canonical URL
    pub url: Url,

    /// Discovery depth (seed is 0)
    pub depth: u32,
}

/// Breadth-first frontier of one crawl
///
/// Not shared between crawler instances; each crawl owns its own.
#[derive(Debug)]
pub struct Frontier {
    queue: VecDeque<CrawlTask>,
    queued: HashSet<String>,
    visited: HashSet<String>,
    max_depth: u32,
    max_pages: usize,
}

impl Frontier {
    /// Creates a frontier seeded with `seed` at depth 0
    pub fn new(seed: Url, max_depth: u32, max_pages: usize) -> Self {
        let mut frontier = Self {
            queue: VecDeque::new(),
            queued: HashSet::new(),
            visited: HashSet::new(),
            max_depth,
            max_pages,
        };
        frontier.enqueue(seed, 0);
        frontier
    }

    /// Queues a URL unless it was already visited or queued
    ///
    /// Returns true if the URL was added.
    pub fn enqueue(&mut self, url: Url, depth: u32) -> bool {
        let key = url.as_str();
        if self.visited.contains(key) || self.queued.contains(key) {
            return false;
        }

        self.queued.insert(key.to_string());
        self.queue.push_back(CrawlTask { url, depth });
        true
    }

    /// Pops the next task to fetch and marks it visited
    ///
    /// Tasks already visited or deeper than the limit are skipped silently.
    /// Returns `None` once the queue is empty or `max_pages` URLs were visited.
    pub fn next_task(&mut self) -> Option<CrawlTask> {
        while self.visited.len() < self.max_pages {
            let task = self.queue.pop_front()?;
            self.queued.remove(task.url.as_str());

            if self.visited.contains(task.url.as_str()) {
                continue;
            }

            if task.depth > self.max_depth {
                tracing::debug!("Skipping {} beyond depth {}", task.url, self.max_depth);
                continue;
            }

            self.visited.insert(task.url.to_string());
            return Some(task);
        }
        None
    }

    /// True while another task could still be returned
    pub fn has_work(&self) -> bool {
        !self.queue.is_empty() && self.visited.len() < self.max_pages
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }
}
