//! Layered video discovery
//!
//! Candidates come from three layers, merged in this order and de-duplicated
//! by URL:
//! 1. Media elements and video meta tags (parsed by the extractor)
//! 2. Media-URL literals and well-known JSON fields in inline scripts
//! 3. Platform probes: an id found in the page URL or scripts is substituted
//!    into known API endpoints, and each response is searched for media URLs
//!
//! Every layer is best-effort. Platform endpoints are undocumented and may
//! answer with nothing useful; that only means fewer candidates.

use crate::config::{CrawlConfig, PlatformProbeEntry};
use crate::crawler::extractor::ExtractError;
use crate::output::MediaRef;
use crate::url::{matches_domain, resolve_media_url};
use regex::Regex;
use reqwest::Client;
use std::collections::HashSet;
use std::sync::OnceLock;
use std::time::Duration;
use url::Url;

/// File extensions of directly playable or segmented video
const STREAM_EXTENSIONS: &[&str] = &["mp4", "m3u8", "webm", "flv", "mov", "m4v"];

/// File names of placeholder clips served in place of real videos
///
/// The marker must be a whole `_`/`-` separated word of the file stem, so
/// ids that merely contain `404` and names like `terror.mp4` are kept.
const ERROR_PLACEHOLDER: &str = r"^(?:[a-z0-9]+[_-])?(?:error|placeholder|not_?found|404|unavailable|default_video)(?:[_-][a-z0-9]+)?\.[a-z0-9]+$";

static PLACEHOLDER_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

const MEDIA_LITERAL: &str =
    r#"https?://[^\s"'<>\\]+?\.(?:mp4|m3u8|webm|flv|mov|m4v)\b(?:\?[^\s"'<>\\]*)?"#;

const MEDIA_FIELD: &str = r#""(?i:play_?url|play_?addr|video_?url|content_?url|stream_?url|hls_?url|mp4_?url|backup_?url|src_?no_?mark)"\s*:\s*"([^"]+)""#;

/// Returns true if a URL's path ends in a streaming-file extension
pub fn has_stream_extension(url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();
    path.rsplit_once('.')
        .map_or(false, |(_, ext)| STREAM_EXTENSIONS.contains(&ext))
}

/// Returns true if a candidate's file name is a known error placeholder clip
pub fn is_error_placeholder(url: &Url) -> bool {
    let pattern = PLACEHOLDER_PATTERN.get_or_init(|| match Regex::new(ERROR_PLACEHOLDER) {
        Ok(regex) => Some(regex),
        Err(e) => {
            tracing::warn!("Invalid placeholder pattern: {}", e);
            None
        }
    });

    let path = url.path().to_ascii_lowercase();
    let file = path.rsplit('/').next().unwrap_or("");
    pattern.as_ref().map_or(false, |p| p.is_match(file))
}

/// Undoes the JSON escaping commonly applied to URLs inside scripts
fn unescape(text: &str) -> String {
    text.replace("\\u002F", "/")
        .replace("\\u002f", "/")
        .replace("\\u0026", "&")
        .replace("\\/", "/")
}

/// A platform whose pages hide video URLs behind an API
#[derive(Debug, Clone)]
pub struct PlatformProbe {
    pub name: String,

    /// Domain patterns the probe applies to
    pub hosts: Vec<String>,

    /// Patterns whose first capture group is the content id
    pub id_patterns: Vec<Regex>,

    /// API URLs with `{id}` in place of the content id
    pub endpoints: Vec<String>,
}

impl PlatformProbe {
    /// Builds a probe, dropping (and logging) invalid id patterns
    pub fn new(name: &str, hosts: &[&str], id_patterns: &[&str], endpoints: &[&str]) -> Self {
        let id_patterns = id_patterns
            .iter()
            .filter_map(|p| match Regex::new(p) {
                Ok(r) => Some(r),
                Err(e) => {
                    tracing::warn!("Invalid id pattern for {} probe '{}': {}", name, p, e);
                    None
                }
            })
            .collect();

        Self {
            name: name.to_string(),
            hosts: hosts.iter().map(|h| h.to_string()).collect(),
            id_patterns,
            endpoints: endpoints.iter().map(|e| e.to_string()).collect(),
        }
    }

    /// Builds a probe from a `[[platform-probes]]` config entry
    pub fn from_entry(entry: &PlatformProbeEntry) -> Self {
        fn strs(items: &[String]) -> Vec<&str> {
            items.iter().map(String::as_str).collect()
        }
        Self::new(
            &entry.name,
            &strs(&entry.hosts),
            &strs(&entry.id_patterns),
            &strs(&entry.endpoints),
        )
    }

    pub fn applies_to(&self, url: &Url) -> bool {
        url.host_str()
            .map_or(false, |host| self.hosts.iter().any(|p| matches_domain(p, host)))
    }

    /// Content id from the page URL, else from the first script that has one
    pub fn find_id(&self, page_url: &Url, scripts: &[String]) -> Option<String> {
        std::iter::once(page_url.as_str())
            .chain(scripts.iter().map(String::as_str))
            .find_map(|haystack| {
                self.id_patterns.iter().find_map(|pattern| {
                    pattern
                        .captures(haystack)
                        .and_then(|c| c.get(1))
                        .map(|m| m.as_str().to_string())
                })
            })
    }

    pub fn endpoint_urls(&self, id: &str) -> Vec<Url> {
        self.endpoints
            .iter()
            .filter_map(|template| Url::parse(&template.replace("{id}", id)).ok())
            .collect()
    }
}

/// Probes shipped with the crawler
pub fn builtin_probes() -> Vec<PlatformProbe> {
    vec![
        PlatformProbe::new(
            "douyin",
            &["douyin.com", "iesdouyin.com"],
            &[r"/video/(\d{8,})", r#""aweme_?id"\s*:\s*"?(\d{8,})"#],
            &[
                "https://www.iesdouyin.com/web/api/v2/aweme/iteminfo/?item_ids={id}",
                "https://www.douyin.com/aweme/v1/web/aweme/detail/?aweme_id={id}",
            ],
        ),
        PlatformProbe::new(
            "bilibili",
            &["bilibili.com", "b23.tv"],
            &[r"/video/(BV[0-9A-Za-z]{10})", r#""bvid"\s*:\s*"(BV[0-9A-Za-z]{10})""#],
            &[
                "https://api.bilibili.com/x/web-interface/view?bvid={id}",
                "https://api.bilibili.com/x/player/playurl?bvid={id}&qn=64&fnval=1",
            ],
        ),
        PlatformProbe::new(
            "kuaishou",
            &["kuaishou.com", "chenzhongtech.com"],
            &[
                r"/short-video/([0-9A-Za-z_-]{6,})",
                r#""photoId"\s*:\s*"([0-9A-Za-z_-]{6,})""#,
            ],
            &[
                "https://v.m.chenzhongtech.com/rest/wd/photo/info?photoId={id}",
                "https://www.kuaishou.com/short-video/{id}",
            ],
        ),
    ]
}

/// Collects media URLs from any JSON value, depth first
pub fn collect_media_urls(value: &serde_json::Value, out: &mut Vec<Url>) {
    match value {
        serde_json::Value::String(s) => {
            if let Ok(url) = Url::parse(&unescape(s)) {
                if matches!(url.scheme(), "http" | "https") && has_stream_extension(&url) {
                    out.push(url);
                }
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                collect_media_urls(item, out);
            }
        }
        serde_json::Value::Object(map) => {
            for item in map.values() {
                collect_media_urls(item, out);
            }
        }
        _ => {}
    }
}

/// Runs layers 2 and 3 and merges them with the native candidates
pub struct VideoDiscovery {
    client: Client,
    timeout: Duration,
    probe_platforms: bool,
    probes: Vec<PlatformProbe>,
    media_literal: Regex,
    media_field: Regex,
}

impl VideoDiscovery {
    pub fn new(client: Client, config: &CrawlConfig) -> Result<Self, ExtractError> {
        Ok(Self {
            client,
            timeout: config.timeout,
            probe_platforms: config.probe_platforms,
            probes: config
                .platform_probes
                .iter()
                .map(PlatformProbe::from_entry)
                .chain(builtin_probes())
                .collect(),
            media_literal: Regex::new(MEDIA_LITERAL)?,
            media_field: Regex::new(MEDIA_FIELD)?,
        })
    }

    /// Merged, de-duplicated video candidates of a page
    pub async fn discover(
        &self,
        page_url: &Url,
        native: Vec<MediaRef>,
        scripts: &[String],
    ) -> Vec<MediaRef> {
        let mut seen = HashSet::new();
        let mut videos = Vec::new();

        let mut accept = |video: MediaRef, layer: &str| {
            let keep = Url::parse(&video.url).map_or(false, |url| !is_error_placeholder(&url));
            if !keep {
                tracing::debug!("Discarding placeholder video {}", video.url);
                return;
            }
            if seen.insert(video.url.clone()) {
                tracing::debug!("Video candidate from {}: {}", layer, video.url);
                videos.push(video);
            }
        };

        for video in native {
            accept(video, "media elements");
        }

        for url in self.script_candidates(page_url, scripts) {
            accept(MediaRef::new(url.as_str()), "scripts");
        }

        if self.probe_platforms {
            for url in self.probe_candidates(page_url, scripts).await {
                accept(MediaRef::new(url.as_str()), "platform probe");
            }
        }

        videos
    }

    /// Layer 2: literals with streaming extensions and known JSON fields
    pub fn script_candidates(&self, page_url: &Url, scripts: &[String]) -> Vec<Url> {
        let mut candidates = Vec::new();

        for script in scripts {
            let script = unescape(script);

            for found in self.media_literal.find_iter(&script) {
                if let Some(url) = resolve_media_url(found.as_str(), page_url) {
                    candidates.push(url);
                }
            }

            for captures in self.media_field.captures_iter(&script) {
                let Some(value) = captures.get(1) else {
                    continue;
                };
                if let Some(url) = resolve_media_url(value.as_str(), page_url) {
                    if url.as_str().starts_with("http") && value.as_str().contains("//") {
                        candidates.push(url);
                    }
                }
            }
        }

        candidates
    }

    /// Layer 3: API probes for recognized platforms
    pub async fn probe_candidates(&self, page_url: &Url, scripts: &[String]) -> Vec<Url> {
        let mut candidates = Vec::new();

        for probe in self.probes.iter().filter(|p| p.applies_to(page_url)) {
            let Some(id) = probe.find_id(page_url, scripts) else {
                tracing::debug!("No {} id found on {}", probe.name, page_url);
                continue;
            };

            for endpoint in probe.endpoint_urls(&id) {
                match self.probe(&endpoint, page_url).await {
                    Ok(found) => {
                        tracing::debug!(
                            "{} probe {} yielded {} candidates",
                            probe.name,
                            endpoint,
                            found.len()
                        );
                        candidates.extend(found);
                    }
                    Err(e) => tracing::debug!("{} probe {} failed: {}", probe.name, endpoint, e),
                }
            }
        }

        candidates
    }

    async fn probe(&self, endpoint: &Url, referer: &Url) -> Result<Vec<Url>, reqwest::Error> {
        let body = self
            .client
            .get(endpoint.clone())
            .header(reqwest::header::REFERER, referer.as_str())
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let mut found = Vec::new();
        match serde_json::from_str::<serde_json::Value>(&body) {
            Ok(json) => collect_media_urls(&json, &mut found),
            Err(_) => {
                let text = unescape(&body);
                found.extend(
                    self.media_literal
                        .find_iter(&text)
                        .filter_map(|m| Url::parse(m.as_str()).ok()),
                );
            }
        }
        Ok(found)
    }
}
