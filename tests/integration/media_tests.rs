use crate::common::{mount_page, test_config};
use tempfile::TempDir;
use trawl::config::CrawlConfig;
use trawl::media::{MediaDownloader, MediaKind};
use trawl::{CrawlRequest, Crawler};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn media_config(dir: &TempDir) -> CrawlConfig {
    CrawlConfig {
        download_images: true,
        download_videos: true,
        image_dir: dir.path().join("images"),
        video_dir: dir.path().join("videos"),
        ..test_config()
    }
}

async fn mount_bytes(server: &MockServer, route: &str, body: &[u8], content_type: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(body.to_vec())
                .insert_header("content-type", content_type),
        )
        .mount(server)
        .await;
}

fn leftover_parts(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|e| e.path().extension().is_some_and(|ext| ext == "part"))
                .count()
        })
        .unwrap_or(0)
}

#[tokio::test]
async fn test_repeat_download_reuses_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cat.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"meow".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let downloader = MediaDownloader::new(&media_config(&dir)).unwrap();
    let url = Url::parse(&format!("{}/cat.jpg", server.uri())).unwrap();

    let first = downloader.download(&url, MediaKind::Image).await.unwrap();
    let second = downloader.download(&url, MediaKind::Image).await.unwrap();

    assert_eq!(first.path, second.path);
    assert!(first.path.starts_with(dir.path().join("images")));
    assert_eq!(std::fs::read(&first.path).unwrap(), b"meow");
}

#[tokio::test]
async fn test_direct_video_is_streamed_to_disk() {
    let server = MockServer::start().await;
    let content = vec![7u8; 64 * 1024];
    mount_bytes(&server, "/clip.mp4", &content, "video/mp4").await;

    let dir = TempDir::new().unwrap();
    let downloader = MediaDownloader::new(&media_config(&dir)).unwrap();
    let url = Url::parse(&format!("{}/clip.mp4", server.uri())).unwrap();

    let download = downloader.download(&url, MediaKind::Video).await.unwrap();

    assert!(!download.partial);
    assert!(download.path.to_string_lossy().ends_with(".mp4"));
    assert_eq!(std::fs::read(&download.path).unwrap(), content);
    assert_eq!(leftover_parts(&dir.path().join("videos")), 0);
}

#[tokio::test]
async fn test_master_playlist_follows_best_variant() {
    let server = MockServer::start().await;
    let master = "#EXTM3U\n\
        #EXT-X-STREAM-INF:BANDWIDTH=400000\n\
        lo/index.m3u8\n\
        #EXT-X-STREAM-INF:BANDWIDTH=2000000\n\
        hi/index.m3u8\n";
    let variant = "#EXTM3U\n\
        #EXT-X-TARGETDURATION:4\n\
        #EXTINF:4.0,\n\
        seg0.ts\n\
        #EXTINF:4.0,\n\
        seg1.ts\n\
        #EXTINF:4.0,\n\
        seg2.ts\n\
        #EXT-X-ENDLIST\n";

    mount_bytes(&server, "/live/master.m3u8", master.as_bytes(), "application/vnd.apple.mpegurl").await;
    mount_bytes(&server, "/live/hi/index.m3u8", variant.as_bytes(), "application/vnd.apple.mpegurl").await;
    Mock::given(method("GET"))
        .and(path("/live/lo/index.m3u8"))
        .respond_with(ResponseTemplate::new(200).set_body_string(variant))
        .expect(0)
        .mount(&server)
        .await;
    mount_bytes(&server, "/live/hi/seg0.ts", b"AAA", "video/mp2t").await;
    Mock::given(method("GET"))
        .and(path("/live/hi/seg1.ts"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_bytes(&server, "/live/hi/seg2.ts", b"CCC", "video/mp2t").await;

    let dir = TempDir::new().unwrap();
    let downloader = MediaDownloader::new(&media_config(&dir)).unwrap();
    let url = Url::parse(&format!("{}/live/master.m3u8", server.uri())).unwrap();

    let download = downloader.download(&url, MediaKind::Video).await.unwrap();

    assert!(download.partial);
    assert!(download.path.to_string_lossy().ends_with(".ts"));
    assert_eq!(std::fs::read(&download.path).unwrap(), b"AAACCC");
    assert_eq!(leftover_parts(&dir.path().join("videos")), 0);
}

#[tokio::test]
async fn test_playlist_with_no_fetchable_segments_fails() {
    let server = MockServer::start().await;
    let playlist = "#EXTM3U\n#EXTINF:4.0,\na.ts\n#EXTINF:4.0,\nb.ts\n#EXT-X-ENDLIST\n";
    mount_bytes(&server, "/v/index.m3u8", playlist.as_bytes(), "application/x-mpegurl").await;

    let dir = TempDir::new().unwrap();
    let downloader = MediaDownloader::new(&media_config(&dir)).unwrap();
    let url = Url::parse(&format!("{}/v/index.m3u8", server.uri())).unwrap();

    assert!(downloader.download(&url, MediaKind::Video).await.is_none());
    assert!(!downloader.target_path(&url, MediaKind::Video).exists());
    assert_eq!(leftover_parts(&dir.path().join("videos")), 0);
}

#[tokio::test]
async fn test_playlist_served_under_plain_url() {
    let server = MockServer::start().await;
    let playlist = "#EXTM3U\n#EXTINF:2.0,\n/stream/s0.ts\n#EXTINF:2.0,\n/stream/s1.ts\n#EXT-X-ENDLIST\n";
    mount_bytes(&server, "/watch", playlist.as_bytes(), "application/vnd.apple.mpegurl").await;
    mount_bytes(&server, "/stream/s0.ts", b"01", "video/mp2t").await;
    mount_bytes(&server, "/stream/s1.ts", b"23", "video/mp2t").await;

    let dir = TempDir::new().unwrap();
    let downloader = MediaDownloader::new(&media_config(&dir)).unwrap();
    let url = Url::parse(&format!("{}/watch", server.uri())).unwrap();

    let download = downloader.download(&url, MediaKind::Video).await.unwrap();
    assert!(!download.partial);
    assert_eq!(std::fs::read(&download.path).unwrap(), b"0123");
}

#[tokio::test]
async fn test_playlist_detected_by_body() {
    let server = MockServer::start().await;
    mount_bytes(&server, "/play", b"#EXTM3U\n#EXTINF:1,\nseg0.ts\n", "text/plain").await;
    mount_bytes(&server, "/seg0.ts", b"SEGMENT0", "video/mp2t").await;

    let dir = TempDir::new().unwrap();
    let downloader = MediaDownloader::new(&media_config(&dir)).unwrap();
    let url = Url::parse(&format!("{}/play", server.uri())).unwrap();

    let download = downloader.download(&url, MediaKind::Video).await.unwrap();
    assert!(!download.partial);
    assert_eq!(std::fs::read(&download.path).unwrap(), b"SEGMENT0");
    assert_eq!(leftover_parts(&dir.path().join("videos")), 0);
}

#[tokio::test]
async fn test_octet_stream_video_is_not_a_playlist() {
    let server = MockServer::start().await;
    mount_bytes(&server, "/raw", b"\x00\x00\x00\x18ftypmp42 movie data", "application/octet-stream").await;

    let dir = TempDir::new().unwrap();
    let downloader = MediaDownloader::new(&media_config(&dir)).unwrap();
    let url = Url::parse(&format!("{}/raw", server.uri())).unwrap();

    let download = downloader.download(&url, MediaKind::Video).await.unwrap();
    assert_eq!(
        std::fs::read(&download.path).unwrap(),
        b"\x00\x00\x00\x18ftypmp42 movie data"
    );
}

#[tokio::test]
async fn test_missing_video_returns_none() {
    let server = MockServer::start().await;

    let dir = TempDir::new().unwrap();
    let downloader = MediaDownloader::new(&media_config(&dir)).unwrap();
    let url = Url::parse(&format!("{}/gone.mp4", server.uri())).unwrap();

    assert!(downloader.download(&url, MediaKind::Video).await.is_none());
    assert!(!downloader.target_path(&url, MediaKind::Video).exists());
}

#[tokio::test]
async fn test_crawl_downloads_page_media() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<html><head><title>Gallery</title></head><body>
            <img src="/img/a.png" alt="first">
            <img data-src="/img/b.gif">
            <video src="/media/intro.mp4"></video>
        </body></html>"#
            .to_string(),
    )
    .await;
    mount_bytes(&server, "/img/a.png", b"png", "image/png").await;
    mount_bytes(&server, "/img/b.gif", b"gif", "image/gif").await;
    mount_bytes(&server, "/media/intro.mp4", b"mp4", "video/mp4").await;

    let dir = TempDir::new().unwrap();
    let mut crawler = Crawler::new(media_config(&dir)).unwrap();
    let result = crawler
        .crawl(CrawlRequest::new(format!("{}/", server.uri())).depth(0))
        .await
        .unwrap();

    let page = result.pages().next().unwrap();
    assert_eq!(page.images.len(), 2);
    assert_eq!(page.images[0].alt.as_deref(), Some("first"));
    assert!(page.images.iter().all(|i| i.local_path.is_some()));

    assert_eq!(page.videos.len(), 1);
    let video = page.videos[0].local_path.as_ref().unwrap();
    assert!(video.starts_with(dir.path().join("videos")));
    assert_eq!(std::fs::read(video).unwrap(), b"mp4");

    assert_eq!(result.stats.images_downloaded, 2);
    assert_eq!(result.stats.videos_downloaded, 1);
}
