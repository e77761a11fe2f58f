use crate::common::{mount_page, mount_page_expect, page, test_config};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use trawl::ai::AiAnalysis;
use trawl::config::{CrawlConfig, PlatformProbeEntry};
use trawl::{
    AiCapability, AiError, AnalysisInput, AnalysisTask, CrawlRecord, CrawlRequest, Crawler,
    TextSummary,
};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct BrokenModel;

#[async_trait]
impl AiCapability for BrokenModel {
    async fn analyze(
        &self,
        _input: &AnalysisInput,
        _task: AnalysisTask,
    ) -> Result<serde_json::Value, AiError> {
        Err(AiError::Capability("classifier crashed".to_string()))
    }

    async fn summarize_text(
        &self,
        _text: &str,
        _max_length: usize,
        _url: Option<&str>,
    ) -> Result<TextSummary, AiError> {
        Err(AiError::Capability("summarizer crashed".to_string()))
    }
}

struct EchoModel;

#[async_trait]
impl AiCapability for EchoModel {
    async fn analyze(
        &self,
        input: &AnalysisInput,
        task: AnalysisTask,
    ) -> Result<serde_json::Value, AiError> {
        Ok(serde_json::json!({ "task": task, "labels": input.labels }))
    }

    async fn summarize_text(
        &self,
        text: &str,
        max_length: usize,
        _url: Option<&str>,
    ) -> Result<TextSummary, AiError> {
        Ok(TextSummary {
            summary: text.chars().take(max_length).collect(),
            note: Some("truncated".to_string()),
        })
    }
}

fn seed(server: &MockServer) -> String {
    format!("{}/", server.uri())
}

#[tokio::test]
async fn test_single_page_depth_zero() {
    let server = MockServer::start().await;
    mount_page_expect(&server, "/", page("Home", &["/a", "/b"]), 1).await;
    mount_page_expect(&server, "/a", page("A", &[]), 0).await;
    mount_page_expect(&server, "/b", page("B", &[]), 0).await;

    let mut crawler = Crawler::new(test_config()).unwrap();
    let result = crawler
        .crawl(CrawlRequest::new(seed(&server)).depth(0))
        .await
        .unwrap();

    assert_eq!(result.results.len(), 1);
    assert_eq!(result.pages_crawled, 1);
    assert_eq!(result.success_pages, 1);

    let home = result.pages().next().unwrap();
    assert_eq!(home.title.as_deref(), Some("Home"));
    assert_eq!(home.depth, 0);
    assert_eq!(home.links.len(), 2);
    assert!(home.ai_analysis.is_none());
}

#[tokio::test]
async fn test_seed_links_crawled_at_depth_one() {
    let server = MockServer::start().await;
    mount_page(&server, "/", page("Home", &["/a", "/b", "/c"])).await;
    for route in ["/a", "/b", "/c"] {
        mount_page_expect(&server, route, page(route, &["/deeper"]), 1).await;
    }
    mount_page_expect(&server, "/deeper", page("Deeper", &[]), 0).await;

    let mut crawler = Crawler::new(test_config()).unwrap();
    let result = crawler
        .crawl(CrawlRequest::new(seed(&server)).depth(1))
        .await
        .unwrap();

    assert_eq!(result.success_pages, 4);
    assert_eq!(result.depth, 1);
    assert!(result.results.iter().all(|r| r.depth() <= 1));

    let discovered: Vec<_> = result.pages().filter(|p| p.url != seed(&server)).collect();
    assert_eq!(discovered.len(), 3);
    assert!(discovered.iter().all(|p| p.depth == 1));
}

#[tokio::test]
async fn test_allow_domains_filters_links() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        page(
            "Home",
            &["https://other.org/x", "https://example.com/y", "https://blog.example.com/z"],
        ),
    )
    .await;

    let config = CrawlConfig {
        allow_domains: vec!["example.com".to_string()],
        ..test_config()
    };
    let mut crawler = Crawler::new(config).unwrap();
    let result = crawler
        .crawl(CrawlRequest::new(seed(&server)).depth(0))
        .await
        .unwrap();

    let links: Vec<_> = result.pages().next().unwrap().links.iter().map(|l| l.url.as_str()).collect();
    assert_eq!(links, vec!["https://example.com/y", "https://blog.example.com/z"]);
}

#[tokio::test]
async fn test_deny_domains_blocks_following() {
    let server = MockServer::start().await;
    let host = url::Url::parse(&server.uri()).unwrap().host_str().unwrap().to_string();
    mount_page(&server, "/", page("Home", &["/private"])).await;
    mount_page_expect(&server, "/private", page("Private", &[]), 0).await;

    let config = CrawlConfig {
        deny_domains: vec![host],
        ..test_config()
    };
    let mut crawler = Crawler::new(config).unwrap();
    let result = crawler
        .crawl(CrawlRequest::new(seed(&server)).depth(1))
        .await
        .unwrap();

    assert_eq!(result.pages_crawled, 1);
    assert!(result.pages().next().unwrap().links.is_empty());
}

#[tokio::test]
async fn test_failed_image_download_keeps_page() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<html><body><img src="http://127.0.0.1:1/x.png" alt="broken"></body></html>"#.to_string(),
    )
    .await;

    let images = TempDir::new().unwrap();
    let config = CrawlConfig {
        download_images: true,
        image_dir: images.path().to_path_buf(),
        ..test_config()
    };
    let mut crawler = Crawler::new(config).unwrap();
    let result = crawler
        .crawl(CrawlRequest::new(seed(&server)).depth(0))
        .await
        .unwrap();

    assert_eq!(result.success_pages, 1);
    assert_eq!(result.failed_pages, 0);

    let page = result.pages().next().unwrap();
    assert_eq!(page.images.len(), 1);
    assert_eq!(page.images[0].url, "http://127.0.0.1:1/x.png");
    assert!(page.images[0].local_path.is_none());
    assert!(page.error.is_none());
    assert_eq!(result.stats.images_found, 1);
    assert_eq!(result.stats.images_downloaded, 0);
}

#[tokio::test]
async fn test_downloaded_image_recorded() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<html><body><img src="/logo.png"></body></html>"#.to_string(),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\x89PNG fake".to_vec()))
        .mount(&server)
        .await;

    let images = TempDir::new().unwrap();
    let config = CrawlConfig {
        download_images: true,
        image_dir: images.path().to_path_buf(),
        ..test_config()
    };
    let mut crawler = Crawler::new(config).unwrap();
    let result = crawler
        .crawl(CrawlRequest::new(seed(&server)).depth(0))
        .await
        .unwrap();

    let image = &result.pages().next().unwrap().images[0];
    let local: &PathBuf = image.local_path.as_ref().unwrap();
    assert!(local.starts_with(images.path()));
    assert!(local.to_string_lossy().ends_with(".png"));
    assert_eq!(std::fs::read(local).unwrap(), b"\x89PNG fake");
    assert_eq!(result.stats.images_downloaded, 1);
}

#[tokio::test]
async fn test_failing_ai_capability_is_recorded() {
    let server = MockServer::start().await;
    mount_page(&server, "/", page("Home", &[])).await;

    let mut crawler = Crawler::new(test_config()).unwrap();
    let request = CrawlRequest::new(seed(&server))
        .depth(0)
        .with_ai(Arc::new(BrokenModel));
    let result = crawler.crawl(request).await.unwrap();

    assert!(result.use_ai);
    assert_eq!(result.success_pages, 1);

    let page = result.pages().next().unwrap();
    match page.ai_analysis.as_ref().unwrap() {
        AiAnalysis::Error { error } => assert!(error.contains("classifier crashed")),
        other => panic!("unexpected analysis: {:?}", other),
    }
    assert!(page.summary.is_none());

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["results"][0]["ai_analysis"]["status"], "error");
}

#[tokio::test]
async fn test_ai_without_capability_is_skipped() {
    let server = MockServer::start().await;
    mount_page(&server, "/", page("Home", &[])).await;

    let mut crawler = Crawler::new(test_config()).unwrap();
    let result = crawler
        .crawl(CrawlRequest::new(seed(&server)).depth(0).use_ai(true))
        .await
        .unwrap();

    let page = result.pages().next().unwrap();
    assert_eq!(page.ai_analysis.as_ref().unwrap().status(), "skipped");
}

#[tokio::test]
async fn test_ai_classification_and_summary() {
    let server = MockServer::start().await;
    mount_page(&server, "/", page("Home", &[])).await;

    let config = CrawlConfig {
        summary_max_length: 4,
        ..test_config()
    };
    let mut crawler = Crawler::new(config).unwrap();
    let request = CrawlRequest::new(seed(&server))
        .depth(0)
        .with_ai(Arc::new(EchoModel))
        .keywords(vec!["rust".to_string(), "web".to_string()]);
    let result = crawler.crawl(request).await.unwrap();

    let page = result.pages().next().unwrap();
    match page.ai_analysis.as_ref().unwrap() {
        AiAnalysis::Completed { results, .. } => {
            assert_eq!(results["task"], "classification");
            assert_eq!(results["labels"][0], "rust");
        }
        other => panic!("unexpected analysis: {:?}", other),
    }

    let summary = page.summary.as_ref().unwrap();
    assert_eq!(summary.summary_length, 4);
    assert_eq!(summary.original_length, page.text.chars().count());
    assert_eq!(summary.note.as_deref(), Some("truncated"));
}

#[tokio::test]
async fn test_http_error_becomes_failure_record() {
    let server = MockServer::start().await;
    mount_page(&server, "/", page("Home", &["/ok", "/missing", "/broken"])).await;
    mount_page(&server, "/ok", page("Ok", &[])).await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut crawler = Crawler::new(test_config()).unwrap();
    let result = crawler
        .crawl(CrawlRequest::new(seed(&server)).depth(1))
        .await
        .unwrap();

    assert_eq!(result.pages_crawled, 4);
    assert_eq!(result.success_pages, 2);
    assert_eq!(result.failed_pages, 2);
    assert_eq!(
        result.pages_crawled,
        result.success_pages + result.failed_pages
    );
    assert!(result.error.is_none());

    let statuses: Vec<_> = result
        .results
        .iter()
        .filter_map(|r| match r {
            CrawlRecord::Failure(f) => f.status_code,
            CrawlRecord::Page(_) => None,
        })
        .collect();
    assert!(statuses.contains(&404));
    assert!(statuses.contains(&503));
    assert_eq!(result.stats.success_rate, 0.5);
}

#[tokio::test]
async fn test_unreachable_seed_is_transport_failure() {
    let mut crawler = Crawler::new(test_config()).unwrap();
    let result = crawler
        .crawl(CrawlRequest::new("http://127.0.0.1:1/").depth(1))
        .await
        .unwrap();

    assert_eq!(result.pages_crawled, 1);
    assert_eq!(result.failed_pages, 1);
    match &result.results[0] {
        CrawlRecord::Failure(failure) => {
            assert_eq!(failure.status_code, None);
            assert!(!failure.error.is_empty());
        }
        CrawlRecord::Page(_) => panic!("expected a failure record"),
    }
}

#[tokio::test]
async fn test_equivalent_links_fetched_once() {
    let server = MockServer::start().await;
    mount_page_expect(
        &server,
        "/",
        page("Home", &["/a", "/a/", "/a?ref=1", "/a#part", "/b"]),
        1,
    )
    .await;
    mount_page_expect(&server, "/a", page("A", &["/", "/b"]), 1).await;
    mount_page_expect(&server, "/b", page("B", &["/a/"]), 1).await;

    let mut crawler = Crawler::new(test_config()).unwrap();
    let result = crawler
        .crawl(CrawlRequest::new(seed(&server)).depth(2))
        .await
        .unwrap();

    assert_eq!(result.pages_crawled, 3);
    assert_eq!(result.stats.visited_urls, 3);
}

#[tokio::test]
async fn test_max_pages_bounds_the_crawl() {
    let server = MockServer::start().await;
    mount_page(&server, "/", page("Home", &["/1", "/2", "/3", "/4", "/5"])).await;
    for route in ["/1", "/2", "/3", "/4", "/5"] {
        mount_page(&server, route, page(route, &[])).await;
    }

    let config = CrawlConfig {
        max_pages: 3,
        ..test_config()
    };
    let mut crawler = Crawler::new(config).unwrap();
    let result = crawler
        .crawl(CrawlRequest::new(seed(&server)).depth(1))
        .await
        .unwrap();

    assert_eq!(result.pages_crawled, 3);
}

#[tokio::test]
async fn test_depth_clamped_to_max_depth() {
    let server = MockServer::start().await;
    mount_page(&server, "/", page("Home", &["/a"])).await;
    mount_page(&server, "/a", page("A", &["/b"])).await;
    mount_page_expect(&server, "/b", page("B", &[]), 0).await;

    let config = CrawlConfig {
        max_depth: 1,
        ..test_config()
    };
    let mut crawler = Crawler::new(config).unwrap();
    let result = crawler
        .crawl(CrawlRequest::new(seed(&server)).depth(5))
        .await
        .unwrap();

    assert_eq!(result.depth, 1);
    assert_eq!(result.pages_crawled, 2);
}

#[tokio::test]
async fn test_follow_links_disabled() {
    let server = MockServer::start().await;
    mount_page(&server, "/", page("Home", &["/a"])).await;
    mount_page_expect(&server, "/a", page("A", &[]), 0).await;

    let config = CrawlConfig {
        follow_links: false,
        ..test_config()
    };
    let mut crawler = Crawler::new(config).unwrap();
    let result = crawler
        .crawl(CrawlRequest::new(seed(&server)).depth(2))
        .await
        .unwrap();

    assert_eq!(result.pages_crawled, 1);
    assert_eq!(result.pages().next().unwrap().links.len(), 1);
}

#[tokio::test]
async fn test_missing_browser_degrades_to_http() {
    let server = MockServer::start().await;
    mount_page(&server, "/", page("Home", &["/a"])).await;
    mount_page(&server, "/a", page("A", &[])).await;

    let config = CrawlConfig {
        use_headless_browser: true,
        browser_executable: Some(PathBuf::from("/nonexistent/chrome")),
        ..test_config()
    };
    let mut crawler = Crawler::new(config).unwrap();

    for _ in 0..2 {
        let result = crawler
            .crawl(CrawlRequest::new(seed(&server)).depth(1))
            .await
            .unwrap();

        assert_eq!(result.success_pages, 2);
        assert!(result.pages().all(|p| !p.rendered));
    }
}

#[tokio::test]
async fn test_result_serializes_to_json() {
    let server = MockServer::start().await;
    mount_page(&server, "/", page("Home", &["/gone"])).await;

    let mut crawler = Crawler::new(test_config()).unwrap();
    let result = crawler
        .crawl(CrawlRequest::new(seed(&server)).depth(1))
        .await
        .unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["pages_crawled"], 2);
    assert_eq!(json["results"][0]["title"], "Home");
    assert_eq!(json["results"][1]["status_code"], 404);
    assert!(json["stats"]["success_rate"].is_number());
}

#[tokio::test]
async fn test_platform_probe_responses_become_videos() {
    let server = MockServer::start().await;
    let page_url = format!("{}/watch/4711", server.uri());
    mount_page(&server, "/watch/4711", page("Clip", &[])).await;

    Mock::given(method("GET"))
        .and(path("/api/detail"))
        .and(query_param("id", "4711"))
        .and(header("referer", page_url.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {
                "cover": format!("{}/img/cover.jpg", server.uri()),
                "play_url": format!("{}/v/detail.mp4", server.uri())
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<script>player.load("{}\/v\/embed.m3u8")</script>"#,
            server.uri().replace('/', "\\/")
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let endpoint = |route: &str| format!("{}{}?id={{id}}", server.uri(), route);
    let config = CrawlConfig {
        platform_probes: vec![PlatformProbeEntry {
            name: "local".to_string(),
            hosts: vec!["127.0.0.1".to_string()],
            id_patterns: vec![r"/watch/(\d+)".to_string()],
            endpoints: vec![
                endpoint("/api/broken"),
                endpoint("/api/detail"),
                endpoint("/api/embed"),
            ],
        }],
        ..test_config()
    };
    let mut crawler = Crawler::new(config).unwrap();
    let result = crawler
        .crawl(CrawlRequest::new(page_url.clone()).depth(0))
        .await
        .unwrap();

    assert_eq!(result.success_pages, 1);
    let page = result.pages().next().unwrap();
    assert!(page.error.is_none());

    let videos: Vec<_> = page.videos.iter().map(|v| v.url.clone()).collect();
    assert_eq!(
        videos,
        vec![
            format!("{}/v/detail.mp4", server.uri()),
            format!("{}/v/embed.m3u8", server.uri()),
        ]
    );
}

#[tokio::test]
async fn test_platform_probing_can_be_disabled() {
    let server = MockServer::start().await;
    mount_page(&server, "/watch/4711", page("Clip", &[])).await;
    Mock::given(method("GET"))
        .and(path("/api/detail"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(0)
        .mount(&server)
        .await;

    let config = CrawlConfig {
        probe_platforms: false,
        platform_probes: vec![PlatformProbeEntry {
            name: "local".to_string(),
            hosts: vec!["127.0.0.1".to_string()],
            id_patterns: vec![r"/watch/(\d+)".to_string()],
            endpoints: vec![format!("{}/api/detail?id={{id}}", server.uri())],
        }],
        ..test_config()
    };
    let mut crawler = Crawler::new(config).unwrap();
    let result = crawler
        .crawl(CrawlRequest::new(format!("{}/watch/4711", server.uri())).depth(0))
        .await
        .unwrap();

    assert!(result.pages().next().unwrap().videos.is_empty());
}
