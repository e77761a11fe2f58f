//! Media downloader
//!
//! Every asset is stored under a content-addressed name (SHA-256 of its URL),
//! so a second request for the same URL finds the file already in place and
//! performs no transfer. Bodies are written to a `.part` sibling and renamed
//! into place once complete.

use crate::config::CrawlConfig;
use crate::media::manifest::{self, Playlist};
use crate::media::DownloadError;
use futures::{Stream, StreamExt};
use reqwest::{Client, Response};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use url::Url;

/// Bytes between two progress log lines for direct video downloads
const PROGRESS_STEP: u64 = 8 * 1024 * 1024;

/// Leading bytes of a direct video inspected for a playlist header
const SNIFF_LEN: usize = 16;

/// Master playlists pointing at master playlists are followed this many times
const MAX_PLAYLIST_HOPS: usize = 3;

/// Kind of asset, which decides the target directory and default extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

/// A completed download
#[derive(Debug, Clone, PartialEq)]
pub struct Download {
    pub path: PathBuf,

    /// Some segments of a segmented video were skipped
    pub partial: bool,
}

/// Builds the content-addressed file name for a media URL
///
/// The name is the hex SHA-256 of the full URL plus an extension taken from
/// the last path segment. Extensions longer than four characters, or with
/// non-alphanumeric characters, are replaced by the default for `kind`:
/// `.jpg` for images, `.mp4` for videos and `.ts` for segmented playlists.
///
/// # Example
///
/// ```
/// use trawl::media::{media_file_name, MediaKind};
/// use url::Url;
///
/// let url = Url::parse("https://cdn.example.com/a/photo.PNG?w=200").unwrap();
/// let name = media_file_name(&url, MediaKind::Image);
/// assert!(name.ends_with(".png"));
/// assert_eq!(name.len(), 64 + 4);
/// ```
pub fn media_file_name(url: &Url, kind: MediaKind) -> String {
    let digest = hex::encode(Sha256::digest(url.as_str().as_bytes()));

    let extension = match kind {
        MediaKind::Video if manifest::is_manifest_url(url) => ".ts".to_string(),
        MediaKind::Video => extension(url).unwrap_or_else(|| ".mp4".to_string()),
        MediaKind::Image => extension(url).unwrap_or_else(|| ".jpg".to_string()),
    };

    format!("{}{}", digest, extension)
}

fn extension(url: &Url) -> Option<String> {
    let file = url.path_segments()?.last()?;
    let (_, ext) = file.rsplit_once('.')?;

    if ext.is_empty() || ext.len() > 4 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }

    Some(format!(".{}", ext.to_ascii_lowercase()))
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

fn check_status(response: Response) -> Result<Response, DownloadError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(DownloadError::Status(status.as_u16()))
    }
}

/// Downloads images and videos into the configured directories
#[derive(Debug, Clone)]
pub struct MediaDownloader {
    client: Client,
    timeout: Duration,
    image_dir: PathBuf,
    video_dir: PathBuf,
}

impl MediaDownloader {
    /// Creates a downloader with its own HTTP client
    ///
    /// The client only bounds connection setup; image, playlist and segment
    /// requests are additionally bounded by `timeout`, while direct video
    /// bodies may stream for as long as the server keeps sending.
    pub fn new(config: &CrawlConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.timeout)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            timeout: config.timeout,
            image_dir: config.image_dir.clone(),
            video_dir: config.video_dir.clone(),
        })
    }

    /// Local path an asset is (or would be) stored at
    pub fn target_path(&self, url: &Url, kind: MediaKind) -> PathBuf {
        let dir = match kind {
            MediaKind::Image => &self.image_dir,
            MediaKind::Video => &self.video_dir,
        };
        dir.join(media_file_name(url, kind))
    }

    /// Downloads an asset, returning `None` when no local copy could be made
    ///
    /// Failures are logged, never propagated: a missing local copy only means
    /// the asset is recorded as metadata.
    pub async fn download(&self, url: &Url, kind: MediaKind) -> Option<Download> {
        match self.try_download(url, kind).await {
            Ok(download) => Some(download),
            Err(e) => {
                tracing::warn!("Failed to download {:?} {}: {}", kind, url, e);
                None
            }
        }
    }

    async fn try_download(&self, url: &Url, kind: MediaKind) -> Result<Download, DownloadError> {
        let path = self.target_path(url, kind);

        if fs::try_exists(&path).await? {
            tracing::debug!("{} already downloaded to {}", url, path.display());
            return Ok(Download {
                path,
                partial: false,
            });
        }

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }

        match kind {
            MediaKind::Image => {
                let bytes = self.fetch_bytes(url).await?;
                self.write_whole(&path, &bytes).await?;
                tracing::debug!("Saved image {} to {}", url, path.display());
                Ok(Download {
                    path,
                    partial: false,
                })
            }
            MediaKind::Video if manifest::is_manifest_url(url) => {
                let body = self.fetch_text(url).await?;
                self.rebuild_segmented(url.clone(), body, path).await
            }
            MediaKind::Video => self.fetch_direct(url, path).await,
        }
    }

    async fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>, DownloadError> {
        let response = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await?;
        let mut stream = check_status(response)?.bytes_stream();

        let mut buffer = Vec::new();
        while let Some(chunk) = stream.next().await {
            buffer.extend_from_slice(&chunk?);
        }
        Ok(buffer)
    }

    async fn fetch_text(&self, url: &Url) -> Result<String, DownloadError> {
        let response = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await?;
        Ok(check_status(response)?.text().await?)
    }

    async fn write_whole(&self, path: &Path, bytes: &[u8]) -> Result<(), DownloadError> {
        let part = part_path(path);
        if let Err(e) = fs::write(&part, bytes).await {
            let _ = fs::remove_file(&part).await;
            return Err(e.into());
        }
        fs::rename(&part, path).await?;
        Ok(())
    }

    /// Streams a single video file to disk
    ///
    /// A response that turns out to be a playlist (by content type) is handed
    /// to segmented reconstruction instead.
    /// Streams a direct video to disk
    ///
    /// A body announced as `mpegurl`, or whose first bytes carry the playlist
    /// header, is treated as a playlist instead of being saved as the video.
    async fn fetch_direct(&self, url: &Url, path: PathBuf) -> Result<Download, DownloadError> {
        let response = check_status(self.client.get(url.clone()).send().await?)?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        if content_type.contains("mpegurl") {
            let body = response.text().await?;
            return self.rebuild_segmented(url.clone(), body, path).await;
        }

        let expected = response.content_length();
        let mut stream = Box::pin(response.bytes_stream());

        let mut head = Vec::new();
        while head.len() < SNIFF_LEN {
            match stream.next().await {
                Some(chunk) => head.extend_from_slice(&chunk?),
                None => break,
            }
        }

        if manifest::looks_like_manifest(&head) {
            tracing::debug!("{} serves a playlist as {:?}", url, content_type);
            while let Some(chunk) = stream.next().await {
                head.extend_from_slice(&chunk?);
            }
            let body = String::from_utf8_lossy(&head).into_owned();
            return self.rebuild_segmented(url.clone(), body, path).await;
        }

        let part = part_path(&path);
        match stream_to_file(head, &mut stream, expected, &part, url).await {
            Ok(total) => {
                fs::rename(&part, &path).await?;
                tracing::info!(
                    "Saved video {} ({} bytes) to {}",
                    url,
                    total,
                    path.display()
                );
                Ok(Download {
                    path,
                    partial: false,
                })
            }
            Err(e) => {
                let _ = fs::remove_file(&part).await;
                Err(e)
            }
        }
    }

    /// Rebuilds a segmented video from its playlist
    ///
    /// Master playlists are followed to their highest-bandwidth variant.
    /// Segments that fail are skipped; the result is marked partial when any
    /// were skipped and fails outright when none succeeded.
    async fn rebuild_segmented(
        &self,
        mut playlist_url: Url,
        mut body: String,
        path: PathBuf,
    ) -> Result<Download, DownloadError> {
        let mut segments = None;

        for _ in 0..=MAX_PLAYLIST_HOPS {
            let playlist = manifest::parse_playlist(&body, &playlist_url)?;
            if let Playlist::Media(list) = playlist {
                segments = Some(list);
                break;
            }

            let variant = playlist
                .best_variant()
                .map(|v| v.uri.clone())
                .ok_or_else(|| DownloadError::Manifest("master playlist has no variants".into()))?;
            tracing::debug!("Following variant playlist {}", variant);
            body = self.fetch_text(&variant).await?;
            playlist_url = variant;
        }

        let segments = segments
            .ok_or_else(|| DownloadError::Manifest("too many nested playlists".to_string()))?;
        if segments.is_empty() {
            return Err(DownloadError::Manifest(format!(
                "{} lists no segments",
                playlist_url
            )));
        }

        let part = part_path(&path);
        let written = self.write_segments(&segments, &part).await;

        let (fetched, skipped) = match written {
            Ok(counts) => counts,
            Err(e) => {
                let _ = fs::remove_file(&part).await;
                return Err(e);
            }
        };

        if fetched == 0 {
            let _ = fs::remove_file(&part).await;
            return Err(DownloadError::NoSegments(playlist_url.to_string()));
        }

        fs::rename(&part, &path).await?;

        if skipped > 0 {
            tracing::warn!(
                "Saved {} with {} of {} segments missing",
                path.display(),
                skipped,
                segments.len()
            );
        } else {
            tracing::info!(
                "Saved segmented video ({} segments) to {}",
                fetched,
                path.display()
            );
        }

        Ok(Download {
            path,
            partial: skipped > 0,
        })
    }

    async fn write_segments(
        &self,
        segments: &[Url],
        part: &Path,
    ) -> Result<(usize, usize), DownloadError> {
        let mut file = fs::File::create(part).await?;
        let mut fetched = 0;
        let mut skipped = 0;

        for (index, segment) in segments.iter().enumerate() {
            match self.fetch_bytes(segment).await {
                Ok(bytes) => {
                    file.write_all(&bytes).await?;
                    fetched += 1;
                }
                Err(e) => {
                    tracing::warn!("Skipping segment {} ({}): {}", index, segment, e);
                    skipped += 1;
                }
            }
        }

        file.flush().await?;
        Ok((fetched, skipped))
    }
}

/// Writes `head` and then the rest of `stream` to `part`, returning the byte count
async fn stream_to_file<S, B>(
    head: Vec<u8>,
    stream: &mut S,
    expected: Option<u64>,
    part: &Path,
    url: &Url,
) -> Result<u64, DownloadError>
where
    S: Stream<Item = Result<B, reqwest::Error>> + Unpin,
    B: AsRef<[u8]>,
{
    let mut file = fs::File::create(part).await?;
    file.write_all(&head).await?;

    let mut total = head.len() as u64;
    let mut next_report = PROGRESS_STEP;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(chunk.as_ref()).await?;
        total += chunk.as_ref().len() as u64;

        if total >= next_report {
            match expected {
                Some(len) if len > 0 => tracing::debug!(
                    "{}: {} / {} bytes ({:.0}%)",
                    url,
                    total,
                    len,
                    total as f64 * 100.0 / len as f64
                ),
                _ => tracing::debug!("{}: {} bytes", url, total),
            }
            next_report += PROGRESS_STEP;
        }
    }

    file.flush().await?;
    Ok(total)
}
