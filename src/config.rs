//! Source-site configuration: where the listing lives and what an article URL looks like.

use crate::error::ConfigError;
use crate::models::AUTHOR_NAME;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Production site.
pub const DEFAULT_BASE_URL: &str = "https://ukrainejudo.com";

/// Path of the paginated news listing.
pub const LISTING_PATH: &str = "/news";

/// `/news/<numeric id>-<slug>`; the numeric ID is capture group 1.
static ARTICLE_PATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)/news/([0-9]+)-[\w-]+").unwrap());

static START_PARAM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[?&]start=([0-9]+)").unwrap());

#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub base_url: Url,
    pub listing_path: String,
    pub author_name: String,
}

impl SiteConfig {
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let base_url = Url::parse(base_url).map_err(|source| ConfigError::InvalidUrl {
            url: base_url.to_string(),
            source,
        })?;
        Ok(Self {
            base_url,
            listing_path: LISTING_PATH.to_string(),
            author_name: AUTHOR_NAME.to_string(),
        })
    }

    /// Listing page at `offset` (`0` is the oldest page).
    pub fn listing_url(&self, offset: u64) -> String {
        format!(
            "{}{}?start={}",
            self.base_url.as_str().trim_end_matches('/'),
            self.listing_path,
            offset
        )
    }

    /// Resolve a possibly relative reference against the site root.
    pub fn resolve(&self, href: &str) -> Option<Url> {
        self.base_url.join(href.trim()).ok()
    }

    /// True when `url` points at the source site itself.
    pub fn is_same_site(&self, url: &Url) -> bool {
        url.host_str() == self.base_url.host_str()
            && url.port_or_known_default() == self.base_url.port_or_known_default()
    }

    /// Absolute article URL for an href that matches the article pattern.
    pub fn article_url(&self, href: &str) -> Option<String> {
        if !ARTICLE_PATH_RE.is_match(href) {
            return None;
        }
        self.resolve(href).map(String::from)
    }

    /// Numeric source ID of an article href on this site.
    pub fn article_id(&self, href: &str) -> Option<String> {
        let url = self.resolve(href)?;
        if !self.is_same_site(&url) {
            return None;
        }
        article_id_in(url.path())
    }
}

/// Numeric article ID anywhere in `text`.
pub fn article_id_in(text: &str) -> Option<String> {
    ARTICLE_PATH_RE
        .captures(text)
        .map(|caps| caps[1].to_string())
}

/// The `start=` offset of a listing URL.
pub fn listing_offset(url: &str) -> Option<u64> {
    START_PARAM_RE
        .captures(url)
        .and_then(|caps| caps[1].parse().ok())
}
