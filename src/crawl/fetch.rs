//! Page fetching

use crate::config::CrawlConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, REFERER};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Status recorded when a fetch times out
pub const TIMEOUT_STATUS: u16 = 408;

/// Status recorded for connection, TLS, redirect and body errors
pub const TRANSPORT_FAILURE_STATUS: u16 = 520;

/// Result of fetching one URL
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL after redirects
    pub url: Url,

    /// HTTP status, or a synthetic status for transport failures
    pub code: u16,

    pub body: String,

    /// Whether the body can be parsed for links
    pub is_html: bool,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        self.code == 200
    }

    fn failed(url: &Url, code: u16) -> Self {
        Self {
            url: url.clone(),
            code,
            body: String::new(),
            is_html: false,
        }
    }
}

/// Source of pages for the crawler.
///
/// Fetching never fails: every problem is reported through the status code.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> FetchedPage;
}

/// reqwest-backed fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if !config.referrer.is_empty() {
            let referrer = HeaderValue::from_str(&config.referrer).map_err(|e| {
                Error::Config(format!("Invalid referrer {:?}: {}", config.referrer, e))
            })?;
            headers.insert(REFERER, referrer);
        }

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| Error::Crawl(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    fn failure_status(url: &Url, error: &reqwest::Error) -> u16 {
        let code = if error.is_timeout() {
            TIMEOUT_STATUS
        } else {
            TRANSPORT_FAILURE_STATUS
        };
        debug!("Fetch of {} failed ({}): {}", url, code, error);
        code
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> FetchedPage {
        debug!("Fetching: {}", url);

        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => return FetchedPage::failed(url, Self::failure_status(url, &e)),
        };

        let code = response.status().as_u16();
        let final_url = response.url().clone();
        let is_html = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.to_ascii_lowercase().contains("html"))
            .unwrap_or(true);

        match response.text().await {
            Ok(body) => FetchedPage {
                url: final_url,
                code,
                body,
                is_html,
            },
            Err(e) => FetchedPage::failed(url, Self::failure_status(url, &e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> CrawlConfig {
        CrawlConfig {
            timeout_secs: 1,
            ..CrawlConfig::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_sends_identity_headers() {
        let server = MockServer::start().await;
        let config = test_config();
        Mock::given(method("GET"))
            .and(path("/"))
            .and(header("user-agent", config.user_agent.as_str()))
            .and(header("referer", config.referrer.as_str()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html><body>hi</body></html>", "text/html"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&config).unwrap();
        let page = fetcher.fetch(&Url::parse(&server.uri()).unwrap()).await;

        assert!(page.is_success());
        assert!(page.is_html);
        assert!(page.body.contains("hi"));
    }

    #[tokio::test]
    async fn test_fetch_reports_http_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404).set_body_raw("nope", "text/html"))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&test_config()).unwrap();
        let url = Url::parse(&format!("{}/gone", server.uri())).unwrap();
        let page = fetcher.fetch(&url).await;

        assert_eq!(page.code, 404);
        assert!(!page.is_success());
    }

    #[tokio::test]
    async fn test_fetch_timeout_becomes_408() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&test_config()).unwrap();
        let page = fetcher.fetch(&Url::parse(&server.uri()).unwrap()).await;

        assert_eq!(page.code, TIMEOUT_STATUS);
        assert!(page.body.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_connection_refused_becomes_520() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let url = Url::parse(&format!("http://{}/", addr)).unwrap();

        let fetcher = HttpFetcher::new(&test_config()).unwrap();
        let page = fetcher.fetch(&url).await;

        assert_eq!(page.code, TRANSPORT_FAILURE_STATUS);
    }

    #[tokio::test]
    async fn test_plain_text_is_not_html() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("plain words"))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&test_config()).unwrap();
        let page = fetcher.fetch(&Url::parse(&server.uri()).unwrap()).await;

        assert!(page.is_success());
        assert!(!page.is_html);
    }
}
