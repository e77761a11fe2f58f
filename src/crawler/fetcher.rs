//! Page fetcher
//!
//! This module handles retrieving page content, including:
//! - Building the HTTP client with the configured user agent and timeout
//! - Lightweight fetches (plain GET, charset taken from the response)
//! - Rendered fetches through a [`BrowserSession`]
//! - Classifying every outcome as a [`FetchResult`]
//!
//! A single attempt is made per URL; there is no retry at this layer.

use crate::config::CrawlConfig;
use crate::crawler::render::BrowserSession;
use reqwest::{redirect::Policy, Client};
use url::Url;

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// Successfully fetched the page
    Success {
        /// Final URL after redirects
        final_url: String,
        /// HTTP status code (rendered fetches report 200)
        status_code: u16,
        /// Page body (rendered DOM in rendered mode)
        body: String,
        /// Fetched through the headless browser
        rendered: bool,
    },

    /// The server answered with a 4xx/5xx status
    HttpError {
        /// The HTTP status code
        status_code: u16,
    },

    /// Transport failure (DNS, connection refused, timeout, browser error)
    NetworkError {
        /// Error description
        error: String,
    },
}

/// Builds an HTTP client with the crawl's user agent and timeout
///
/// # Arguments
///
/// * `config` - The crawl configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use trawl::config::CrawlConfig;
/// use trawl::crawler::build_http_client;
///
/// let client = build_http_client(&CrawlConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &CrawlConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.timeout)
        .connect_timeout(config.timeout)
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL with a plain GET
///
/// # Error Classification
///
/// | Condition | Result |
/// |-----------|--------|
/// | 2xx/3xx after redirects | Success |
/// | 4xx / 5xx | HttpError |
/// | Timeout | NetworkError |
/// | Connection refused / DNS | NetworkError |
/// | Body decoding failure | NetworkError |
///
/// The body is decoded with the charset named by the `Content-Type`
/// header, falling back to UTF-8.
pub async fn fetch_url(client: &Client, url: &Url) -> FetchResult {
    let response = match client.get(url.clone()).send().await {
        Ok(response) => response,
        Err(e) => return classify_error(e),
    };

    let status = response.status();
    let final_url = response.url().to_string();

    if status.is_client_error() || status.is_server_error() {
        return FetchResult::HttpError {
            status_code: status.as_u16(),
        };
    }

    match response.text().await {
        Ok(body) => FetchResult::Success {
            final_url,
            status_code: status.as_u16(),
            body,
            rendered: false,
        },
        Err(e) => classify_error(e),
    }
}

fn classify_error(e: reqwest::Error) -> FetchResult {
    let error = if e.is_timeout() {
        "Request timeout".to_string()
    } else if e.is_connect() {
        format!("Connection failed: {}", e)
    } else {
        e.to_string()
    };
    FetchResult::NetworkError { error }
}

/// Fetch strategy owned by one crawl
///
/// Rendered mode is used when a browser session is present; otherwise pages
/// are fetched with the HTTP client.
pub struct Fetcher {
    client: Client,
    session: Option<BrowserSession>,
}

impl Fetcher {
    /// Plain HTTP fetcher
    pub fn lightweight(client: Client) -> Self {
        Self {
            client,
            session: None,
        }
    }

    /// Opens a fetcher, launching a browser when rendered mode is requested
    ///
    /// A browser that fails to start is logged and the fetcher falls back to
    /// plain HTTP; [`Fetcher::is_rendered`] tells the caller which one it got.
    pub async fn open(config: &CrawlConfig, client: Client, render: bool) -> Self {
        if !render {
            return Self::lightweight(client);
        }

        match BrowserSession::launch(config).await {
            Ok(session) => Self {
                client,
                session: Some(session),
            },
            Err(e) => {
                tracing::warn!(
                    "Headless browser unavailable ({}), falling back to plain HTTP",
                    e
                );
                Self::lightweight(client)
            }
        }
    }

    pub fn is_rendered(&self) -> bool {
        self.session.is_some()
    }

    /// Fetches one URL with the active strategy
    pub async fn fetch(&self, url: &Url) -> FetchResult {
        let Some(session) = &self.session else {
            return fetch_url(&self.client, url).await;
        };

        match session.render(url).await {
            Ok(page) => FetchResult::Success {
                final_url: page.final_url,
                status_code: 200,
                body: page.html,
                rendered: true,
            },
            Err(e) => FetchResult::NetworkError {
                error: e.to_string(),
            },
        }
    }

    /// Releases the browser, if any
    pub async fn close(self) {
        if let Some(session) = self.session {
            session.close().await;
        }
    }
}
