//! Media acquisition
//!
//! This module handles:
//! - Content-addressed local file names for media URLs
//! - Streamed image and direct video downloads
//! - Reconstruction of segmented (HLS) videos from their playlists

pub mod downloader;
pub mod manifest;

pub use downloader::{media_file_name, Download, MediaDownloader, MediaKind};

use thiserror::Error;

/// Errors raised while downloading a single asset
///
/// These never leave the downloader's public API; a failed asset is reported
/// as "no local copy" and the error is logged.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid manifest: {0}")]
    Manifest(String),

    #[error("No segment of {0} could be downloaded")]
    NoSegments(String),
}
