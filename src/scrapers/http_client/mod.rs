//! HTTP page fetcher with retries and status classification.

mod error;
mod response;
mod user_agent;

pub use error::FetchError;
pub use response::FetchedPage;
pub use user_agent::{resolve_user_agent, USER_AGENT};

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use user_agent::{ACCEPT_HTML, ACCEPT_LANGUAGE};

/// Fetches a page by URL. Implemented over HTTP for real crawls and by
/// stubs in tests.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

/// Attempt budget and backoff bases. The wait before attempt `n + 1` is
/// `n * base`, with the base chosen by failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Base wait after connection errors and unparseable bodies.
    pub network_backoff: Duration,
    /// Base wait after 5xx responses.
    pub server_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            network_backoff: Duration::from_secs(2),
            server_backoff: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, err: &FetchError, attempt: u32) -> Duration {
        let base = match err {
            FetchError::HttpStatus { .. } => self.server_backoff,
            _ => self.network_backoff,
        };
        base * attempt
    }
}

/// Fetcher settings.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// See [`resolve_user_agent`].
    pub user_agent: Option<String>,
    pub retry: RetryPolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(45),
            user_agent: None,
            retry: RetryPolicy::default(),
        }
    }
}

/// `PageFetcher` over reqwest, with browser-like headers and transparent
/// gzip/brotli decoding.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    retry: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        let user_agent = resolve_user_agent(config.user_agent.as_deref());

        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE));

        let client = Client::builder()
            .user_agent(&user_agent)
            .default_headers(headers)
            .timeout(config.timeout)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            retry: config.retry,
        })
    }

    async fn attempt(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::network(url, e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if let Some(ct) = content_type.as_deref() {
            if !is_markup(ct) {
                return Err(FetchError::Parse {
                    url: url.to_string(),
                    reason: format!("not an HTML document ({})", ct),
                });
            }
        }

        let body = response.text().await.map_err(|e| FetchError::Parse {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if body.trim().is_empty() {
            return Err(FetchError::Parse {
                url: url.to_string(),
                reason: "empty body".to_string(),
            });
        }

        Ok(FetchedPage {
            url: url.to_string(),
            final_url,
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let url = url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://"))
            || url::Url::parse(url).is_err()
        {
            return Err(FetchError::InvalidUrl(url.to_string()));
        }

        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.attempt(url).await {
                Ok(page) => {
                    debug!("Fetched {} ({} bytes)", url, page.body.len());
                    return Ok(page);
                }
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let wait = self.retry.backoff(&err, attempt);
                    warn!(
                        "Attempt {}/{} failed: {}; retrying in {:?}",
                        attempt, max_attempts, err, wait
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn is_markup(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ct.contains("html") || ct.contains("xml") || ct.starts_with("text/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_by_failure_kind() {
        let policy = RetryPolicy::default();
        let server = FetchError::HttpStatus {
            url: String::new(),
            status: 502,
        };
        let network = FetchError::network("", "refused");
        assert_eq!(policy.backoff(&server, 2), Duration::from_secs(6));
        assert_eq!(policy.backoff(&network, 1), Duration::from_secs(2));
    }

    #[test]
    fn test_markup_content_types() {
        assert!(is_markup("text/html; charset=utf-8"));
        assert!(is_markup("application/xhtml+xml"));
        assert!(!is_markup("image/jpeg"));
        assert!(!is_markup("application/pdf"));
    }

    #[tokio::test]
    async fn test_rejects_non_http_urls() {
        let fetcher = HttpFetcher::new(&FetchConfig::default()).unwrap();
        for url in ["ftp://example.com/", "example.com/recipes", "javascript:void(0)"] {
            assert_eq!(
                fetcher.fetch(url).await,
                Err(FetchError::InvalidUrl(url.to_string()))
            );
        }
    }
}
