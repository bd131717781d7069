//! HTTP retrieval and HTML parsing.
//!
//! A single [`Transport`] owns the `reqwest` client for the whole run so the
//! user agent and timeout are applied uniformly to listing pages, article
//! pages and image downloads. There is no caching, rate limiting or retrying
//! here; every failure surfaces as a [`FetchError`] for the caller to judge.

use crate::error::FetchError;
use reqwest::Response;
use scraper::Html;
use std::time::Duration;
use tracing::{debug, instrument};

/// Browser-like user agent; the source site serves a reduced page to bots.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0 Safari/537.36";

/// Per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct Transport {
    client: reqwest::Client,
    timeout: Duration,
}

impl Transport {
    pub fn new(user_agent: &str, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client, timeout })
    }

    /// Download `url` and parse it as an HTML document.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch(&self, url: &str) -> Result<Html, FetchError> {
        let response = self.get(url).await?;
        let body = response
            .text()
            .await
            .map_err(|e| self.request_error(url, e))?;
        debug!(bytes = body.len(), "Fetched page");
        Ok(Html::parse_document(&body))
    }

    /// Download `url` as raw bytes (used for images).
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.get(url).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.request_error(url, e))?;
        debug!(bytes = bytes.len(), "Fetched asset");
        Ok(bytes.to_vec())
    }

    async fn get(&self, url: &str) -> Result<Response, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }
        Ok(response)
    }

    fn request_error(&self, url: &str, source: reqwest::Error) -> FetchError {
        if source.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                timeout: self.timeout,
            }
        } else {
            FetchError::Request {
                url: url.to_string(),
                source,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use scraper::Selector;

    fn test_transport() -> Transport {
        Transport::new("test-agent", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_parses_document() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/news").header("user-agent", "test-agent");
            then.status(200)
                .header("content-type", "text/html; charset=utf-8")
                .body("<html><head><title>Новини</title></head><body></body></html>");
        });

        let document = test_transport().fetch(&server.url("/news")).await.unwrap();
        mock.assert();

        let title = Selector::parse("title").unwrap();
        let text: String = document.select(&title).next().unwrap().text().collect();
        assert_eq!(text, "Новини");
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_success_status() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/missing");
            then.status(404).body("not found");
        });

        let err = test_transport()
            .fetch(&server.url("/missing"))
            .await
            .expect_err("404 must fail");
        mock.assert();

        match err {
            FetchError::Status { status, .. } => assert_eq!(status.as_u16(), 404),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_bytes_returns_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/images/photo.jpg");
            then.status(200).body(vec![0xFF, 0xD8, 0xFF]);
        });

        let bytes = test_transport()
            .fetch_bytes(&server.url("/images/photo.jpg"))
            .await
            .unwrap();
        mock.assert();
        assert_eq!(bytes, vec![0xFF, 0xD8, 0xFF]);
    }

    #[tokio::test]
    async fn test_fetch_unreachable_host_is_request_error() {
        let err = test_transport()
            .fetch("http://127.0.0.1:1/news")
            .await
            .expect_err("connection must fail");
        assert!(matches!(err, FetchError::Request { .. } | FetchError::Timeout { .. }));
        assert_eq!(err.url(), "http://127.0.0.1:1/news");
    }
}
