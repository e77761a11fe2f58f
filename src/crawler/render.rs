//! Rendered fetches through a headless Chrome session
//!
//! This module handles:
//! - Launching an isolated browser (own temporary profile) per crawler
//! - Per-domain wait policies applied after navigation
//! - Guaranteed teardown of the browser process and its CDP handler

use crate::config::{CrawlConfig, WaitPolicyEntry};
use crate::url::matches_domain;
use chromiumoxide::browser::{Browser, BrowserConfig, HeadlessMode};
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use std::time::Duration;
use tempfile::TempDir;
use thiserror::Error;
use tokio::task::JoinHandle;
use url::Url;

/// Errors raised by the browser session
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Invalid browser configuration: {0}")]
    Config(String),

    #[error("Failed to create browser profile: {0}")]
    Profile(#[from] std::io::Error),

    #[error("DevTools protocol error: {0}")]
    Cdp(#[from] CdpError),

    #[error("Navigation to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },
}

/// An action performed on a page after it settled
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerAction {
    /// Scrolls to the bottom to trigger lazy loading
    ScrollToBottom,
    /// Clicks the first element matching a CSS selector
    Click { selector: String },
    /// Waits a fixed time
    Pause { duration: Duration },
}

/// What to do between navigation and reading the DOM
#[derive(Debug, Clone, PartialEq)]
pub struct WaitPolicy {
    pub settle: Duration,
    pub actions: Vec<TriggerAction>,
}

impl WaitPolicy {
    pub fn settle(settle: Duration) -> Self {
        Self {
            settle,
            actions: Vec::new(),
        }
    }

    pub fn then(mut self, action: TriggerAction) -> Self {
        self.actions.push(action);
        self
    }
}

impl From<&WaitPolicyEntry> for WaitPolicy {
    fn from(entry: &WaitPolicyEntry) -> Self {
        let mut policy = WaitPolicy::settle(entry.settle);
        if entry.scroll_to_bottom {
            policy = policy.then(TriggerAction::ScrollToBottom);
        }
        for selector in &entry.click {
            policy = policy.then(TriggerAction::Click {
                selector: selector.clone(),
            });
        }
        policy
    }
}

/// Domain pattern to wait policy lookup
///
/// Entries are checked in registration order and the first pattern matching
/// the URL's host wins; hosts with no match get the default policy.
#[derive(Debug, Clone)]
pub struct WaitPolicyRegistry {
    entries: Vec<(String, WaitPolicy)>,
    default: WaitPolicy,
}

impl Default for WaitPolicyRegistry {
    fn default() -> Self {
        Self::new(WaitPolicy::settle(Duration::from_secs(2)))
    }
}

impl WaitPolicyRegistry {
    /// Creates an empty registry
    pub fn new(default: WaitPolicy) -> Self {
        Self {
            entries: Vec::new(),
            default,
        }
    }

    /// Registry with the built-in short-video platform policies
    pub fn with_builtins() -> Self {
        let mut registry = Self::default();
        registry.register_builtins();
        registry
    }

    /// Registry with the configured policies ahead of the built-ins
    pub fn from_config(config: &CrawlConfig) -> Self {
        let mut registry = Self::default();
        for entry in &config.wait_policies {
            registry.register(entry.domain.clone(), WaitPolicy::from(entry));
        }
        registry.register_builtins();
        registry
    }

    /// Appends a policy; earlier registrations take precedence
    pub fn register(&mut self, pattern: impl Into<String>, policy: WaitPolicy) {
        self.entries.push((pattern.into(), policy));
    }

    pub fn policy_for(&self, url: &Url) -> &WaitPolicy {
        let Some(host) = url.host_str() else {
            return &self.default;
        };

        self.entries
            .iter()
            .find(|(pattern, _)| matches_domain(pattern, host))
            .map(|(_, policy)| policy)
            .unwrap_or(&self.default)
    }

    fn register_builtins(&mut self) {
        let pause = |secs| TriggerAction::Pause {
            duration: Duration::from_secs(secs),
        };

        self.register(
            "douyin.com",
            WaitPolicy::settle(Duration::from_secs(5))
                .then(TriggerAction::ScrollToBottom)
                .then(pause(2)),
        );
        self.register(
            "bilibili.com",
            WaitPolicy::settle(Duration::from_secs(3))
                .then(TriggerAction::Click {
                    selector: ".bpx-player-ctrl-play".to_string(),
                })
                .then(pause(2)),
        );
        self.register(
            "kuaishou.com",
            WaitPolicy::settle(Duration::from_secs(5))
                .then(TriggerAction::ScrollToBottom)
                .then(pause(2)),
        );
        self.register(
            "youtube.com",
            WaitPolicy::settle(Duration::from_secs(3))
                .then(TriggerAction::Click {
                    selector: "button.ytp-large-play-button".to_string(),
                })
                .then(pause(2)),
        );
    }
}

/// DOM of a rendered page
#[derive(Debug)]
pub struct RenderedPage {
    pub final_url: String,
    pub html: String,
}

/// A running headless browser owned by one crawler
///
/// Call [`BrowserSession::close`] to shut the browser down cleanly. If the
/// session is dropped instead (panic, cancelled future) the CDP handler task
/// is aborted and the browser process is killed by its own drop.
pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    timeout: Duration,
    policies: WaitPolicyRegistry,

    // Dropped after the browser, which still holds files in it
    _profile: TempDir,
}

impl BrowserSession {
    /// Launches a browser for a crawl
    ///
    /// # Arguments
    ///
    /// * `config` - Supplies headless mode, executable, user agent, timeout and wait policies
    ///
    /// # Returns
    ///
    /// * `Ok(BrowserSession)` - The browser is up and its handler is running
    /// * `Err(RenderError)` - No usable browser; callers fall back to plain HTTP
    pub async fn launch(config: &CrawlConfig) -> Result<Self, RenderError> {
        let profile = TempDir::new()?;

        let mut builder = BrowserConfig::builder()
            .user_data_dir(profile.path())
            .request_timeout(config.timeout)
            .window_size(1920, 1080)
            .arg(format!("--user-agent={}", config.user_agent))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-notifications")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox")
            .arg("--mute-audio");

        builder = if config.headless {
            builder.headless_mode(HeadlessMode::default())
        } else {
            builder.with_head()
        };

        if let Some(executable) = &config.browser_executable {
            builder = builder.chrome_executable(executable);
        }

        let browser_config = builder.build().map_err(RenderError::Config)?;
        let (browser, mut handler) = Browser::launch(browser_config).await?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::trace!("Browser handler event error: {}", e);
                }
            }
            tracing::debug!("Browser handler finished");
        });

        tracing::info!("Headless browser started");

        Ok(Self {
            browser,
            handler,
            timeout: config.timeout,
            policies: WaitPolicyRegistry::from_config(config),
            _profile: profile,
        })
    }

    /// Navigates a fresh tab to `url` and returns the DOM after the wait policy
    pub async fn render(&self, url: &Url) -> Result<RenderedPage, RenderError> {
        let page = self.browser.new_page("about:blank").await?;
        let rendered = self.drive(&page, url).await;

        if let Err(e) = page.close().await {
            tracing::debug!("Failed to close tab for {}: {}", url, e);
        }

        rendered
    }

    async fn drive(&self, page: &Page, url: &Url) -> Result<RenderedPage, RenderError> {
        let navigation = async {
            page.goto(url.as_str()).await?;
            page.wait_for_navigation().await?;
            Ok::<_, CdpError>(())
        };

        tokio::time::timeout(self.timeout, navigation)
            .await
            .map_err(|_| RenderError::Timeout {
                url: url.to_string(),
                timeout: self.timeout,
            })??;

        let policy = self.policies.policy_for(url);
        apply_policy(page, policy).await;

        let html = page.content().await?;
        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| url.to_string());

        Ok(RenderedPage { final_url, html })
    }

    /// Shuts the browser down and waits for the process to exit
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::warn!("Failed to close browser: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            tracing::warn!("Failed to wait for browser exit: {}", e);
        }
        tracing::debug!("Headless browser closed");
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

/// Runs a wait policy; failing actions are logged and skipped
async fn apply_policy(page: &Page, policy: &WaitPolicy) {
    tokio::time::sleep(policy.settle).await;

    for action in &policy.actions {
        match action {
            TriggerAction::ScrollToBottom => {
                if let Err(e) = page
                    .evaluate("window.scrollTo(0, document.body.scrollHeight)")
                    .await
                {
                    tracing::debug!("Scroll failed: {}", e);
                }
            }
            TriggerAction::Click { selector } => match page.find_element(selector.as_str()).await {
                Ok(element) => {
                    if let Err(e) = element.click().await {
                        tracing::debug!("Click on '{}' failed: {}", selector, e);
                    }
                }
                Err(e) => tracing::debug!("No element for '{}': {}", selector, e),
            },
            TriggerAction::Pause { duration } => tokio::time::sleep(*duration).await,
        }
    }
}
