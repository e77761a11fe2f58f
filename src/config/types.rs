use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::PathBuf;
use std::time::Duration;

/// Desktop Chrome user agent sent by default
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Crawl configuration
///
/// Constructed once (from TOML or in code) and handed to a
/// [`Crawler`](crate::crawler::Crawler), which treats it as read-only.
/// Every key is optional in TOML; missing keys take the values from
/// [`CrawlConfig::default`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlConfig {
    /// Hard ceiling on crawl depth; deeper requests are clamped
    pub max_depth: u32,

    /// Maximum number of URLs visited per crawl
    pub max_pages: usize,

    /// Per-request timeout (seconds)
    #[serde(with = "duration_secs")]
    pub timeout: Duration,

    /// User agent for HTTP and browser requests
    pub user_agent: String,

    /// Fixed pause between crawl iterations (seconds)
    #[serde(with = "duration_secs")]
    pub delay: Duration,

    /// Fetch pages through a headless browser
    pub use_headless_browser: bool,

    /// Run the browser without a window
    #[serde(alias = "headless-headless-mode", alias = "chrome-headless")]
    pub headless: bool,

    /// Explicit Chrome/Chromium executable; searched on PATH when absent
    pub browser_executable: Option<PathBuf>,

    /// Only links to these domains (or their subdomains) are admitted
    pub allow_domains: Vec<String>,

    /// Links to these domains (or their subdomains) are never admitted
    pub deny_domains: Vec<String>,

    pub download_images: bool,
    pub image_dir: PathBuf,
    pub download_videos: bool,
    pub video_dir: PathBuf,

    /// Enqueue discovered links for the next depth
    pub follow_links: bool,

    pub extract_text: bool,
    pub extract_images: bool,
    pub extract_videos: bool,
    pub extract_links: bool,
    pub extract_metadata: bool,

    /// Query platform APIs for video URLs when a known platform id is found
    pub probe_platforms: bool,

    /// Extra rendered-mode wait policies, consulted before the built-ins
    pub wait_policies: Vec<WaitPolicyEntry>,

    /// Extra platform probes, tried before the built-ins
    pub platform_probes: Vec<PlatformProbeEntry>,

    /// Upper bound on each AI capability call (seconds)
    #[serde(with = "duration_secs")]
    pub ai_timeout: Duration,

    /// Length requested from the summarizer
    pub summary_max_length: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_pages: 100,
            timeout: Duration::from_secs(10),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            delay: Duration::from_secs(1),
            use_headless_browser: false,
            headless: true,
            browser_executable: None,
            allow_domains: Vec::new(),
            deny_domains: Vec::new(),
            download_images: false,
            image_dir: PathBuf::from("./images"),
            download_videos: false,
            video_dir: PathBuf::from("./videos"),
            follow_links: true,
            extract_text: true,
            extract_images: true,
            extract_videos: true,
            extract_links: true,
            extract_metadata: true,
            probe_platforms: true,
            wait_policies: Vec::new(),
            platform_probes: Vec::new(),
            ai_timeout: Duration::from_secs(60),
            summary_max_length: 200,
        }
    }
}

/// A user-supplied rendered-mode wait policy
///
/// ```toml
/// [[wait-policies]]
/// domain = "*.example.com"
/// settle = 3.5
/// scroll-to-bottom = true
/// click = ["button.play"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WaitPolicyEntry {
    /// Domain pattern (e.g., "example.com" or "*.example.com")
    pub domain: String,

    /// Time to let the page settle after navigation (seconds)
    #[serde(with = "duration_secs")]
    pub settle: Duration,

    #[serde(default)]
    pub scroll_to_bottom: bool,

    /// CSS selectors clicked in order after the settle time
    #[serde(default)]
    pub click: Vec<String>,
}

/// A user-supplied platform probe
///
/// ```toml
/// [[platform-probes]]
/// name = "clips"
/// hosts = ["clips.example.com"]
/// id-patterns = ['/watch/(\d+)']
/// endpoints = ["https://api.example.com/clip?id={id}"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PlatformProbeEntry {
    pub name: String,

    /// Domain patterns of the pages the probe applies to
    pub hosts: Vec<String>,

    /// Regexes whose first capture group is the content id
    pub id_patterns: Vec<String>,

    /// API URLs with `{id}` in place of the content id
    pub endpoints: Vec<String>,
}

/// (De)serializes a `Duration` as fractional seconds
mod duration_secs {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|e| {
            serde::de::Error::custom(format!("invalid duration {} seconds: {}", secs, e))
        })
    }
}
