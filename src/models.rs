//! Data models for scraped articles and per-run crawl state.
//!
//! - [`ArticleRecord`]: one scraped article, serialized as-is into the output JSON
//! - [`ArticleIdMap`]: numeric source IDs seen so far in this run, mapped to slugs
//! - [`AssetPeriod`]: the `year/month` folder that an article's images are stored under
//!
//! Field names of [`ArticleRecord`] match the column set of the content store's
//! article table, so the JSON can be imported without renaming.

use crate::normalize::DateOutcome;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Attribution used for every scraped article.
pub const AUTHOR_NAME: &str = "Пресс-служба ФДУ";

/// A single scraped news article.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ArticleRecord {
    /// Slug derived from the title.
    pub id: String,
    /// Title in its original script.
    pub title: String,
    /// `YYYY-MM-DD`, or the raw date text when it could not be normalized.
    pub date: String,
    /// Absolute source URL.
    pub url: String,
    /// Cleaned body HTML with localized images and rewritten links.
    pub html: String,
    /// One label from the classifier taxonomy.
    pub category: String,
    pub author_name: String,
    /// Plain-text preview of the body.
    pub excerpt: String,
    /// Editorial flag, always `false` at scrape time.
    pub featured: bool,
    /// Local path of the preview image, or empty.
    pub image: String,
    /// Lowercase keywords, deduplicated.
    pub tags: Vec<String>,
}

impl ArticleRecord {
    /// Minimal check applied before handing records to the content store.
    pub fn has_required_fields(&self) -> bool {
        !self.id.is_empty() && !self.title.is_empty() && !self.date.is_empty()
    }

    /// Tags in the store's `a;b;c` column format.
    pub fn joined_tags(&self) -> String {
        self.tags.join(";")
    }
}

/// Maps numeric source-site article IDs to the slugs generated for them.
///
/// Filled in crawl order, so a lookup only succeeds for articles that were
/// parsed earlier in the same run.
#[derive(Debug, Default, Clone)]
pub struct ArticleIdMap {
    slugs: HashMap<String, String>,
}

impl ArticleIdMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source_id: impl Into<String>, slug: impl Into<String>) {
        self.slugs.insert(source_id.into(), slug.into());
    }

    pub fn slug_for(&self, source_id: &str) -> Option<&str> {
        self.slugs.get(source_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.slugs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slugs.is_empty()
    }
}

/// Asset partition for an article's images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPeriod {
    pub year: String,
    pub month: String,
}

impl AssetPeriod {
    /// Period used when the article date did not normalize.
    pub fn fallback() -> Self {
        Self {
            year: "2025".to_string(),
            month: "01".to_string(),
        }
    }

    /// Period for a parsed date; any fallback outcome uses [`AssetPeriod::fallback`].
    pub fn from_outcome(outcome: &DateOutcome) -> Self {
        match outcome {
            DateOutcome::Normalized(iso) => Self::from_date(iso),
            DateOutcome::Fallback { .. } => Self::fallback(),
        }
    }

    /// Take `year`/`month` from a `YYYY-MM-...` date, or fall back.
    pub fn from_date(date: &str) -> Self {
        let mut parts = date.splitn(3, '-');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(year), Some(month), Some(_))
                if year.len() == 4
                    && month.len() == 2
                    && year.bytes().all(|b| b.is_ascii_digit())
                    && month.bytes().all(|b| b.is_ascii_digit()) =>
            {
                Self {
                    year: year.to_string(),
                    month: month.to_string(),
                }
            }
            _ => Self::fallback(),
        }
    }
}
