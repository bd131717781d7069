//! Error types for each stage of the ingestion pipeline.
//!
//! Errors are split by who is allowed to recover from them:
//!
//! - [`FetchError`]: a single HTTP retrieval failed. Callers decide whether
//!   that skips one article or ends the run.
//! - [`ExtractionError`]: one article could not be turned into a record.
//!   The crawler logs it and moves on.
//! - [`CrawlError`]: the crawl itself cannot continue (listing page gone).
//! - [`ConfigError`] / [`OutputError`]: startup and shutdown failures that
//!   abort the run with a non-zero exit.

use std::time::Duration;
use thiserror::Error;

/// A failed HTTP retrieval. Never retried.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("{url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },
}

impl FetchError {
    /// The URL that could not be retrieved.
    pub fn url(&self) -> &str {
        match self {
            FetchError::Request { url, .. }
            | FetchError::Status { url, .. }
            | FetchError::Timeout { url, .. } => url,
        }
    }
}

/// Failure to build a record from an article page.
///
/// Only the page fetch can fail; everything after it degrades to defaults.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("article page unavailable: {0}")]
    Fetch(#[from] FetchError),
}

/// Failure that terminates a crawl.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("listing page unavailable: {0}")]
    Listing(#[source] FetchError),

    #[error("invalid listing URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Invalid or unreadable configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed rule table: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid rule table: {0}")]
    Invalid(String),

    #[error("invalid base URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Failure to persist the final record set.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("I/O error writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
