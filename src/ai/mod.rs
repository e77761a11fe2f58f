//! AI filter hook
//!
//! The crawler never owns a model. Callers inject anything implementing
//! [`AiCapability`]; the [`AiHook`] drives it once per page and folds every
//! outcome (missing capability, failure, timeout) into the page record instead
//! of failing the crawl.

use crate::output::PageRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Labels compared against a page when no keywords are given
pub const GENERAL_CATEGORIES: &[&str] = &[
    "news article",
    "tech blog",
    "product page",
    "blog post",
    "tutorial",
    "forum discussion",
    "social media",
    "e-commerce",
];

/// Errors reported by (or on behalf of) an AI capability
#[derive(Debug, Error)]
pub enum AiError {
    #[error("{0}")]
    Capability(String),

    #[error("AI call timed out after {0:?}")]
    Timeout(Duration),
}

/// What the capability is asked to do with a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisTask {
    /// Zero-shot classification against caller keywords
    Classification,
    /// Similarity against the general category list
    Similarity,
}

/// Content handed to [`AiCapability::analyze`]
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisInput {
    pub text: String,

    /// Candidate labels (keywords or [`GENERAL_CATEGORIES`])
    pub labels: Vec<String>,

    /// First image of the page: local path when downloaded, URL otherwise
    pub image: Option<String>,
}

/// Summarizer output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSummary {
    pub summary: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// An injected classifier / summarizer
///
/// Implementations may be slow or fail; both are tolerated by the crawler.
#[async_trait]
pub trait AiCapability: Send + Sync {
    async fn analyze(
        &self,
        input: &AnalysisInput,
        task: AnalysisTask,
    ) -> Result<serde_json::Value, AiError>;

    async fn summarize_text(
        &self,
        text: &str,
        max_length: usize,
        url: Option<&str>,
    ) -> Result<TextSummary, AiError>;
}

/// Outcome of the analysis step, serialized with a `status` tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AiAnalysis {
    Skipped {
        reason: String,
    },
    Completed {
        results: serde_json::Value,
        timestamp: DateTime<Utc>,
    },
    Error {
        error: String,
    },
}

impl AiAnalysis {
    pub fn status(&self) -> &'static str {
        match self {
            AiAnalysis::Skipped { .. } => "skipped",
            AiAnalysis::Completed { .. } => "completed",
            AiAnalysis::Error { .. } => "error",
        }
    }
}

/// Summary attached to a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSummary {
    pub summary: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    /// Characters in the page text
    pub original_length: usize,

    /// Characters in the summary
    pub summary_length: usize,
}

/// Per-crawl driver for an optional capability
#[derive(Clone)]
pub struct AiHook {
    capability: Option<Arc<dyn AiCapability>>,
    keywords: Vec<String>,
    timeout: Duration,
    summary_max_length: usize,
}

impl AiHook {
    pub fn new(
        capability: Option<Arc<dyn AiCapability>>,
        keywords: Vec<String>,
        timeout: Duration,
        summary_max_length: usize,
    ) -> Self {
        Self {
            capability,
            keywords,
            timeout,
            summary_max_length,
        }
    }

    /// Annotates a page with analysis and summary results
    pub async fn annotate(&self, page: &mut PageRecord) {
        let Some(capability) = self.capability.as_deref() else {
            page.ai_analysis = Some(AiAnalysis::Skipped {
                reason: "No AI capability provided".to_string(),
            });
            return;
        };

        let (input, task) = self.analysis_request(page);
        page.ai_analysis = Some(
            match self.bounded(capability.analyze(&input, task)).await {
                Ok(results) => AiAnalysis::Completed {
                    results,
                    timestamp: Utc::now(),
                },
                Err(e) => {
                    tracing::warn!("AI analysis failed for {}: {}", page.url, e);
                    AiAnalysis::Error {
                        error: e.to_string(),
                    }
                }
            },
        );

        if page.text.trim().is_empty() {
            return;
        }

        let summarized = self
            .bounded(capability.summarize_text(
                &page.text,
                self.summary_max_length,
                Some(&page.url),
            ))
            .await;

        match summarized {
            Ok(summary) => {
                page.summary = Some(PageSummary {
                    original_length: page.text.chars().count(),
                    summary_length: summary.summary.chars().count(),
                    summary: summary.summary,
                    note: summary.note,
                });
            }
            Err(e) => tracing::warn!("Summarizing {} failed: {}", page.url, e),
        }
    }

    fn analysis_request(&self, page: &PageRecord) -> (AnalysisInput, AnalysisTask) {
        let image = page.images.first().map(|image| {
            image
                .local_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| image.url.clone())
        });

        let (labels, task) = if self.keywords.is_empty() {
            (
                GENERAL_CATEGORIES.iter().map(|c| c.to_string()).collect(),
                AnalysisTask::Similarity,
            )
        } else {
            (self.keywords.clone(), AnalysisTask::Classification)
        };

        (
            AnalysisInput {
                text: page.text.clone(),
                labels,
                image,
            },
            task,
        )
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, AiError>>,
    ) -> Result<T, AiError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| AiError::Timeout(self.timeout))?
    }
}
