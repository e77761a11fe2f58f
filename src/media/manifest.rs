//! Segmented video manifests (HLS `.m3u8` playlists)
//!
//! Only the subset needed to rebuild a single file is understood: master
//! playlists (`#EXT-X-STREAM-INF` variants) and media playlists (ordered
//! segment URIs). Encryption and byte ranges are ignored.

use crate::media::DownloadError;
use url::Url;

const HEADER: &str = "#EXTM3U";
const STREAM_INF: &str = "#EXT-X-STREAM-INF:";

/// A parsed playlist
#[derive(Debug, Clone, PartialEq)]
pub enum Playlist {
    /// Points at alternative renditions of the same stream
    Master(Vec<Variant>),
    /// Ordered segment URLs of one rendition
    Media(Vec<Url>),
}

/// One rendition listed by a master playlist
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub bandwidth: u64,
    pub uri: Url,
}

impl Playlist {
    /// Variant with the highest advertised bandwidth, if this is a master playlist
    pub fn best_variant(&self) -> Option<&Variant> {
        match self {
            Playlist::Master(variants) => variants.iter().max_by_key(|v| v.bandwidth),
            Playlist::Media(_) => None,
        }
    }
}

/// Returns true if the URL path names a playlist
pub fn is_manifest_url(url: &Url) -> bool {
    url.path().to_ascii_lowercase().ends_with(".m3u8")
}

/// Returns true if a response body looks like a playlist
pub fn looks_like_manifest(body: &[u8]) -> bool {
    let body = body.strip_prefix("\u{feff}".as_bytes()).unwrap_or(body);
    body.starts_with(HEADER.as_bytes())
}

/// Parses a playlist, resolving every URI against `base`
///
/// # Arguments
///
/// * `body` - The playlist text
/// * `base` - URL the playlist was fetched from
///
/// # Returns
///
/// * `Ok(Playlist)` - A master or media playlist
/// * `Err(DownloadError::Manifest)` - Missing header or unresolvable URI
pub fn parse_playlist(body: &str, base: &Url) -> Result<Playlist, DownloadError> {
    let body = body.trim_start_matches('\u{feff}');
    let mut lines = body.lines().map(str::trim).filter(|l| !l.is_empty());

    if lines.next() != Some(HEADER) {
        return Err(DownloadError::Manifest(format!(
            "{} is not an M3U8 playlist",
            base
        )));
    }

    let mut variants = Vec::new();
    let mut segments = Vec::new();
    let mut pending_bandwidth: Option<u64> = None;

    for line in lines {
        if let Some(attributes) = line.strip_prefix(STREAM_INF) {
            pending_bandwidth = Some(bandwidth(attributes));
            continue;
        }

        if line.starts_with('#') {
            continue;
        }

        let uri = base
            .join(line)
            .map_err(|e| DownloadError::Manifest(format!("bad URI '{}': {}", line, e)))?;

        match pending_bandwidth.take() {
            Some(bandwidth) => variants.push(Variant { bandwidth, uri }),
            None => segments.push(uri),
        }
    }

    if variants.is_empty() {
        Ok(Playlist::Media(segments))
    } else {
        Ok(Playlist::Master(variants))
    }
}

/// Reads the BANDWIDTH attribute of a stream-info tag (0 when absent)
fn bandwidth(attributes: &str) -> u64 {
    attributes
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("BANDWIDTH"))
        .and_then(|(_, value)| value.trim().trim_matches('"').parse().ok())
        .unwrap_or(0)
}
