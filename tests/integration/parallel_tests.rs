use crate::common::{mount_page, mount_page_expect, page, test_config};
use trawl::config::CrawlConfig;
use trawl::{CrawlRecord, CrawlRequest, Crawler};
use wiremock::MockServer;

#[tokio::test]
async fn test_parallel_crawls_second_layer() {
    let server = MockServer::start().await;
    mount_page_expect(&server, "/", page("Home", &["/a", "/b", "/c", "/d"]), 1).await;
    for route in ["/a", "/b", "/c", "/d"] {
        mount_page_expect(&server, route, page(route, &["/deep", "/"]), 1).await;
    }
    mount_page_expect(&server, "/deep", page("Deep", &[]), 0).await;

    let mut crawler = Crawler::new(test_config()).unwrap();
    let result = crawler
        .crawl_parallel(CrawlRequest::new(format!("{}/", server.uri())).depth(1), 2)
        .await
        .unwrap();

    assert_eq!(result.depth, 1);
    assert_eq!(result.pages_crawled, 5);
    assert_eq!(result.success_pages, 5);
    assert_eq!(result.stats.visited_urls, 5);
    assert!(result.error.is_none());

    let seed = &result.results[0];
    assert_eq!(seed.depth(), 0);
    assert!(result.results[1..].iter().all(|r| r.depth() == 1));
}

#[tokio::test]
async fn test_parallel_depth_zero_is_seed_only() {
    let server = MockServer::start().await;
    mount_page(&server, "/", page("Home", &["/a"])).await;
    mount_page_expect(&server, "/a", page("A", &[]), 0).await;

    let mut crawler = Crawler::new(test_config()).unwrap();
    let result = crawler
        .crawl_parallel(CrawlRequest::new(format!("{}/", server.uri())).depth(0), 4)
        .await
        .unwrap();

    assert_eq!(result.depth, 0);
    assert_eq!(result.pages_crawled, 1);
}

#[tokio::test]
async fn test_parallel_records_worker_failures() {
    let server = MockServer::start().await;
    mount_page(&server, "/", page("Home", &["/ok", "/missing"])).await;
    mount_page(&server, "/ok", page("Ok", &[])).await;

    let mut crawler = Crawler::new(test_config()).unwrap();
    let result = crawler
        .crawl_parallel(CrawlRequest::new(format!("{}/", server.uri())).depth(1), 3)
        .await
        .unwrap();

    assert_eq!(result.pages_crawled, 3);
    assert_eq!(result.success_pages, 2);
    assert_eq!(result.failed_pages, 1);

    let failure = result
        .results
        .iter()
        .find_map(|r| match r {
            CrawlRecord::Failure(f) => Some(f),
            CrawlRecord::Page(_) => None,
        })
        .unwrap();
    assert!(failure.url.ends_with("/missing"));
    assert_eq!(failure.status_code, Some(404));
    assert_eq!(failure.depth, 1);
}

#[tokio::test]
async fn test_parallel_respects_max_pages_for_second_layer() {
    let server = MockServer::start().await;
    mount_page(&server, "/", page("Home", &["/1", "/2", "/3", "/4"])).await;
    for route in ["/1", "/2", "/3", "/4"] {
        mount_page(&server, route, page(route, &[])).await;
    }

    let config = CrawlConfig {
        max_pages: 2,
        ..test_config()
    };
    let mut crawler = Crawler::new(config).unwrap();
    let result = crawler
        .crawl_parallel(CrawlRequest::new(format!("{}/", server.uri())).depth(1), 2)
        .await
        .unwrap();

    // seed plus at most max-pages second-layer pages
    assert_eq!(result.pages_crawled, 3);
}
