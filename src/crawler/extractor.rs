//! Content extractor
//!
//! This module turns a fetched document into a [`PageRecord`]:
//! - Title, `name`/`property` metadata and visible text
//! - Images and links, resolved against the page URL
//! - Videos, through the layered discovery in [`crate::crawler::video`]
//! - Optional media downloads
//!
//! Parsing is synchronous and finishes before any network work starts, so
//! the parsed DOM is never held across an await point.

use crate::config::CrawlConfig;
use crate::crawler::video::VideoDiscovery;
use crate::media::{MediaDownloader, MediaKind};
use crate::output::{LinkRef, MediaRef, PageRecord};
use crate::url::{normalize_url, resolve_media_url, DomainPolicy};
use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use url::Url;

/// Elements whose text is never visible
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "iframe", "frame", "template"];

/// Meta tags that carry a playable video URL
const VIDEO_META_SELECTOR: &str = r#"meta[property="og:video"], meta[property="og:video:url"], meta[property="og:video:secure_url"], meta[name="twitter:player:stream"], meta[property="twitter:player:stream"]"#;

/// Errors raised while extracting a page
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Invalid selector '{0}'")]
    Selector(String),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// Which parts of a page to extract
#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    pub text: bool,
    pub images: bool,
    pub videos: bool,
    pub links: bool,
    pub metadata: bool,
}

impl From<&CrawlConfig> for ExtractOptions {
    fn from(config: &CrawlConfig) -> Self {
        Self {
            text: config.extract_text,
            images: config.extract_images,
            videos: config.extract_videos,
            links: config.extract_links,
            metadata: config.extract_metadata,
        }
    }
}

/// Everything read from the document itself
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    pub title: Option<String>,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
    pub images: Vec<MediaRef>,
    pub links: Vec<LinkRef>,

    /// Videos from `<video>`/`<source>` elements and video meta tags
    pub videos: Vec<MediaRef>,

    /// Inline script bodies, input to the script and platform layers
    pub scripts: Vec<String>,

    /// Parts that could not be extracted, as `part: error`
    pub errors: Vec<String>,
}

fn selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|_| ExtractError::Selector(css.to_string()))
}

/// Parses a document and extracts its static content
///
/// Each part is extracted on its own; a part that fails is left empty and
/// its error is recorded in [`ParsedPage::errors`] while the other parts
/// keep their values.
///
/// # Arguments
///
/// * `html` - The document
/// * `base_url` - URL relative references are resolved against
/// * `policy` - Admission policy applied to links
/// * `options` - Parts to extract
///
/// # Example
///
/// ```
/// use trawl::crawler::{parse_page, ExtractOptions};
/// use trawl::config::CrawlConfig;
/// use trawl::DomainPolicy;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base = Url::parse("https://example.com/").unwrap();
/// let options = ExtractOptions::from(&CrawlConfig::default());
/// let parsed = parse_page(html, &base, &DomainPolicy::default(), &options);
/// assert!(parsed.errors.is_empty());
/// assert_eq!(parsed.title.as_deref(), Some("Test"));
/// assert_eq!(parsed.links[0].url, "https://example.com/page");
/// ```
pub fn parse_page(
    html: &str,
    base_url: &Url,
    policy: &DomainPolicy,
    options: &ExtractOptions,
) -> ParsedPage {
    let document = Html::parse_document(html);
    let mut parsed = ParsedPage::default();
    let errors = &mut parsed.errors;

    parsed.title = part("title", extract_title(&document), errors);

    if options.metadata {
        parsed.metadata = part("metadata", extract_metadata(&document), errors);
    }
    if options.text {
        parsed.text = extract_text(&document);
    }
    if options.images {
        parsed.images = part("images", extract_images(&document, base_url), errors);
    }
    if options.links {
        parsed.links = part("links", extract_links(&document, base_url, policy), errors);
    }
    if options.videos {
        parsed.videos = part("videos", extract_native_videos(&document, base_url), errors);
        parsed.scripts = part("scripts", extract_scripts(&document), errors);
    }

    parsed
}

/// Unwraps one part's result, recording its error and falling back to empty
fn part<T: Default>(name: &str, result: Result<T, ExtractError>, errors: &mut Vec<String>) -> T {
    result.unwrap_or_else(|e| {
        errors.push(format!("{}: {}", name, e));
        T::default()
    })
}

fn extract_title(document: &Html) -> Result<Option<String>, ExtractError> {
    let title_selector = selector("title")?;

    Ok(document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty()))
}

/// Collects `<meta name|property=... content=...>` pairs
fn extract_metadata(document: &Html) -> Result<BTreeMap<String, String>, ExtractError> {
    let meta_selector = selector("meta[content]")?;
    let mut metadata = BTreeMap::new();

    for element in document.select(&meta_selector) {
        let attrs = element.value();
        let key = attrs.attr("name").or_else(|| attrs.attr("property"));
        if let (Some(key), Some(content)) = (key, attrs.attr("content")) {
            metadata.insert(key.to_string(), content.to_string());
        }
    }

    Ok(metadata)
}

/// Visible text: every text node on its own line, trimmed, blank lines dropped
fn extract_text(document: &Html) -> String {
    let mut lines = Vec::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map_or(false, |e| HIDDEN_ELEMENTS.contains(&e.name()))
        });

        if !hidden {
            lines.extend(
                text.lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty()),
            );
        }
    }

    lines.join("\n")
}

fn extract_images(document: &Html, base_url: &Url) -> Result<Vec<MediaRef>, ExtractError> {
    let img_selector = selector("img")?;
    let mut seen = HashSet::new();
    let mut images = Vec::new();

    for element in document.select(&img_selector) {
        let attrs = element.value();
        let Some(src) = attrs.attr("src").or_else(|| attrs.attr("data-src")) else {
            continue;
        };
        let Some(url) = resolve_media_url(src, base_url) else {
            continue;
        };

        if seen.insert(url.to_string()) {
            let mut image = MediaRef::new(url.as_str()).with_title(attrs.attr("title").map(String::from));
            image.alt = attrs.attr("alt").map(str::to_string).filter(|a| !a.is_empty());
            images.push(image);
        }
    }

    Ok(images)
}

/// Admitted, canonical, de-duplicated links
fn extract_links(
    document: &Html,
    base_url: &Url,
    policy: &DomainPolicy,
) -> Result<Vec<LinkRef>, ExtractError> {
    let a_selector = selector("a[href]")?;
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&a_selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Ok(url) = normalize_url(href, base_url) else {
            continue;
        };

        if !policy.admits(&url) {
            tracing::trace!("Link {} rejected by domain policy", url);
            continue;
        }

        if seen.insert(url.to_string()) {
            links.push(LinkRef {
                url: url.to_string(),
                text: element_text(&element),
                title: element.value().attr("title").map(str::to_string),
            });
        }
    }

    Ok(links)
}

fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Layer 1 of video discovery: media elements and video meta tags
fn extract_native_videos(document: &Html, base_url: &Url) -> Result<Vec<MediaRef>, ExtractError> {
    let video_selector = selector("video")?;
    let source_selector = selector("source[src]")?;
    let meta_selector = selector(VIDEO_META_SELECTOR)?;
    let mut videos = Vec::new();

    for video in document.select(&video_selector) {
        let title = video.value().attr("title").map(String::from);
        let sources = video
            .value()
            .attr("src")
            .into_iter()
            .chain(video.select(&source_selector).filter_map(|s| s.value().attr("src")));

        for src in sources {
            if let Some(url) = resolve_media_url(src, base_url) {
                videos.push(MediaRef::new(url.as_str()).with_title(title.clone()));
            }
        }
    }

    for meta in document.select(&meta_selector) {
        if let Some(url) = meta
            .value()
            .attr("content")
            .and_then(|content| resolve_media_url(content, base_url))
        {
            videos.push(MediaRef::new(url.as_str()));
        }
    }

    Ok(videos)
}

fn extract_scripts(document: &Html) -> Result<Vec<String>, ExtractError> {
    let script_selector = selector("script:not([src])")?;

    Ok(document
        .select(&script_selector)
        .map(|script| script.text().collect::<String>())
        .filter(|body| !body.trim().is_empty())
        .collect())
}

/// Builds page records for one crawl
pub struct Extractor {
    options: ExtractOptions,
    policy: DomainPolicy,
    videos: VideoDiscovery,
    images_downloader: Option<MediaDownloader>,
    videos_downloader: Option<MediaDownloader>,
}

impl Extractor {
    pub fn new(config: &CrawlConfig, client: reqwest::Client) -> Result<Self, ExtractError> {
        let downloader = if config.download_images || config.download_videos {
            Some(MediaDownloader::new(config)?)
        } else {
            None
        };

        Ok(Self {
            options: ExtractOptions::from(config),
            policy: DomainPolicy::from_config(config),
            videos: VideoDiscovery::new(client, config)?,
            images_downloader: downloader.clone().filter(|_| config.download_images),
            videos_downloader: downloader.filter(|_| config.download_videos),
        })
    }

    /// Extracts a page record
    ///
    /// Never fails: parts that cannot be extracted are named in `error` and
    /// every other field keeps what was extracted.
    ///
    /// # Arguments
    ///
    /// * `url` - Canonical URL the page is recorded under
    /// * `base_url` - URL the document was finally served from
    /// * `html` - The document
    /// * `depth` - Discovery depth
    pub async fn extract(&self, url: &Url, base_url: &Url, html: &str, depth: u32) -> PageRecord {
        let mut page = PageRecord::new(url.as_str(), depth);

        let parsed = parse_page(html, base_url, &self.policy, &self.options);
        for error in &parsed.errors {
            tracing::warn!("Failed to extract {} from {}", error, url);
            page.push_error(error);
        }

        page.title = parsed.title;
        page.text = parsed.text;
        page.metadata = parsed.metadata;
        page.images = parsed.images;
        page.links = parsed.links;

        if self.options.videos {
            page.videos = self
                .videos
                .discover(base_url, parsed.videos, &parsed.scripts)
                .await;
        }

        if let Some(downloader) = &self.images_downloader {
            download_all(downloader, &mut page.images, MediaKind::Image).await;
        }
        if let Some(downloader) = &self.videos_downloader {
            download_all(downloader, &mut page.videos, MediaKind::Video).await;
        }

        page
    }
}

async fn download_all(downloader: &MediaDownloader, assets: &mut [MediaRef], kind: MediaKind) {
    for asset in assets.iter_mut() {
        let Ok(url) = Url::parse(&asset.url) else {
            continue;
        };
        if let Some(download) = downloader.download(&url, kind).await {
            asset.local_path = Some(download.path);
            asset.partial = download.partial;
        }
    }
}
