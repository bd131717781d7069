//! Article page extraction.
//!
//! Turns one article URL into one [`ArticleRecord`]. Only the page fetch can
//! fail; once the document is in hand every field degrades to a default
//! (empty title, raw date text, empty body, default category) instead of
//! failing the article.
//!
//! Page fields are located with ordered selector lists. Each selector is tried in
//! turn and the first non-empty result wins:
//!
//! | Field   | Selectors |
//! |---------|--------|
//! | title   | `h2.*header*` → `h1` → `<title>` |
//! | date    | `<time>` → `span.*date*/*created*` → `meta[article:published_time]` |
//! | body    | `div.*itemFullText*/*entry-content*/*article-body*/*content*` → `div.*article-content*` |
//! | preview | `og:image` → `twitter:image` → first body image |

use crate::classifier::Classifier;
use crate::config::SiteConfig;
use crate::error::ExtractionError;
use crate::localizer::{ArticleBody, ContentLocalizer};
use crate::models::{ArticleIdMap, ArticleRecord, AssetPeriod};
use crate::normalize::{
    extract_excerpt, extract_tags, parse_date, slugify, DateOutcome, EXCERPT_LEN, TAG_LIMIT,
};
use crate::transport::Transport;
use crate::utils::truncate_for_log;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::path::PathBuf;
use tracing::{debug, info, instrument, warn};

static H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").unwrap());
static H2: Lazy<Selector> = Lazy::new(|| Selector::parse("h2").unwrap());
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static TIME: Lazy<Selector> = Lazy::new(|| Selector::parse("time").unwrap());
static SPAN: Lazy<Selector> = Lazy::new(|| Selector::parse("span").unwrap());
static DIV: Lazy<Selector> = Lazy::new(|| Selector::parse("div").unwrap());
static PUBLISHED_META: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="article:published_time"]"#).unwrap());
static OG_IMAGE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:image"]"#).unwrap());
static TWITTER_IMAGE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="twitter:image"]"#).unwrap());

static HEADER_CLASS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)header").unwrap());
static DATE_CLASS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)date|created").unwrap());
static BODY_CLASS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)itemFullText|entry-content|article-body|content").unwrap()
});
static ARTICLE_CONTENT_CLASS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)article-content").unwrap());

/// One step of a fallback chain.
struct FieldSelector {
    name: &'static str,
    extract: fn(&Html) -> Option<String>,
}

const TITLE_SELECTORS: &[FieldSelector] = &[
    FieldSelector { name: "h2.header", extract: title_from_header },
    FieldSelector { name: "h1", extract: title_from_h1 },
    FieldSelector { name: "title", extract: title_from_title_tag },
];

const DATE_SELECTORS: &[FieldSelector] = &[
    FieldSelector { name: "time", extract: date_from_time },
    FieldSelector { name: "span.date", extract: date_from_span },
    FieldSelector { name: "meta.published_time", extract: date_from_meta },
];

/// Body selectors return the container's inner HTML.
const BODY_SELECTORS: &[FieldSelector] = &[
    FieldSelector { name: "div.content", extract: body_from_content_div },
    FieldSelector { name: "div.article-content", extract: body_from_article_content_div },
];

const PREVIEW_SELECTORS: &[FieldSelector] = &[
    FieldSelector { name: "og:image", extract: preview_from_og },
    FieldSelector { name: "twitter:image", extract: preview_from_twitter },
];

/// Run `selectors` in order and return the first non-empty value.
fn first_match(selectors: &[FieldSelector], document: &Html) -> Option<(&'static str, String)> {
    selectors.iter().find_map(|selector| {
        (selector.extract)(document)
            .filter(|value| !value.trim().is_empty())
            .map(|value| (selector.name, value))
    })
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

/// First `selector` match with at least one class matching `pattern`.
fn with_class<'a>(document: &'a Html, selector: &Selector, pattern: &Regex) -> Option<ElementRef<'a>> {
    document
        .select(selector)
        .find(|el| el.value().classes().any(|class| pattern.is_match(class)))
}

fn meta_content(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .find_map(|meta| meta.value().attr("content"))
        .map(|content| content.trim().to_string())
}

fn title_from_header(document: &Html) -> Option<String> {
    with_class(document, &H2, &HEADER_CLASS_RE).map(element_text)
}

fn title_from_h1(document: &Html) -> Option<String> {
    document.select(&H1).next().map(element_text)
}

fn title_from_title_tag(document: &Html) -> Option<String> {
    document.select(&TITLE).next().map(element_text)
}

fn date_from_time(document: &Html) -> Option<String> {
    document.select(&TIME).next().map(element_text)
}

fn date_from_span(document: &Html) -> Option<String> {
    with_class(document, &SPAN, &DATE_CLASS_RE).map(element_text)
}

fn date_from_meta(document: &Html) -> Option<String> {
    meta_content(document, &PUBLISHED_META)
}

fn body_from_content_div(document: &Html) -> Option<String> {
    with_class(document, &DIV, &BODY_CLASS_RE).map(|div| div.inner_html())
}

fn body_from_article_content_div(document: &Html) -> Option<String> {
    with_class(document, &DIV, &ARTICLE_CONTENT_CLASS_RE).map(|div| div.inner_html())
}

fn preview_from_og(document: &Html) -> Option<String> {
    meta_content(document, &OG_IMAGE)
}

fn preview_from_twitter(document: &Html) -> Option<String> {
    meta_content(document, &TWITTER_IMAGE)
}

/// Builds [`ArticleRecord`]s from article pages.
#[derive(Debug)]
pub struct ArticleExtractor<'a> {
    transport: &'a Transport,
    site: &'a SiteConfig,
    classifier: &'a Classifier,
    localizer: ContentLocalizer<'a>,
}

impl<'a> ArticleExtractor<'a> {
    pub fn new(
        transport: &'a Transport,
        site: &'a SiteConfig,
        classifier: &'a Classifier,
        assets_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            transport,
            site,
            classifier,
            localizer: ContentLocalizer::new(transport, site, assets_root),
        }
    }

    /// Fetch `url` and build its record.
    ///
    /// On success the article's numeric source ID is registered in `ids`, so
    /// articles extracted later in the run can link back to it.
    #[instrument(level = "info", skip(self, ids), fields(known_ids = ids.len()))]
    pub async fn extract(
        &self,
        url: &str,
        ids: &mut ArticleIdMap,
    ) -> Result<ArticleRecord, ExtractionError> {
        let document = self.transport.fetch(url).await?;
        let record = self.build_record(url, &document, ids).await;

        match self.site.article_id(url) {
            Some(source_id) => ids.insert(source_id, record.id.clone()),
            None => debug!(url, "Article URL carries no numeric ID"),
        }

        info!(
            id = %record.id,
            date = %record.date,
            category = %record.category,
            tags = record.tags.len(),
            excerpt = %truncate_for_log(&record.excerpt, 60),
            "Extracted article"
        );
        Ok(record)
    }

    async fn build_record(&self, url: &str, document: &Html, ids: &ArticleIdMap) -> ArticleRecord {
        let title = match first_match(TITLE_SELECTORS, document) {
            Some((selector, title)) => {
                debug!(selector, "Found title");
                title
            }
            None => {
                warn!(url, "No title found");
                String::new()
            }
        };

        let raw_date = first_match(DATE_SELECTORS, document)
            .map(|(_, raw)| raw)
            .unwrap_or_default();
        let outcome = parse_date(&raw_date);
        if outcome.is_fallback() && raw_date.is_empty() {
            warn!(url, "No publication date found");
        } else if let DateOutcome::Fallback { raw, reason } = &outcome {
            warn!(url, raw = %raw, ?reason, "Date not normalized; keeping raw text");
        }
        let period = AssetPeriod::from_outcome(&outcome);
        let date = outcome.into_value();
        let id = slugify(&title);

        let mut body = first_match(BODY_SELECTORS, document).map(|(selector, inner)| {
            debug!(selector, bytes = inner.len(), "Found body container");
            ArticleBody::parse(&inner)
        });
        if body.is_none() {
            warn!(url, "No body container found");
        }

        let preview_src = first_match(PREVIEW_SELECTORS, document)
            .map(|(_, src)| src)
            .or_else(|| body.as_ref().and_then(ArticleBody::first_image_src));
        let image = match preview_src {
            Some(src) => self
                .localizer
                .ensure_image(&src, &period)
                .await
                .unwrap_or_default(),
            None => String::new(),
        };

        let (html, text) = match body.as_mut() {
            Some(body) => {
                let text = body.plain_text();
                self.localizer.strip_presentational_attributes(body);
                let images = self.localizer.localize_images(body, &period).await;
                let internal = if ids.is_empty() {
                    0
                } else {
                    self.localizer.rewrite_internal_links(body, ids)
                };
                let documents = self.localizer.rewrite_keyword_links(body);
                debug!(images, internal, documents, "Localized body");
                (body.to_html(), text)
            }
            None => (String::new(), String::new()),
        };

        let category = self.classifier.classify(&title, &text).to_string();
        let excerpt = extract_excerpt(&text, EXCERPT_LEN);
        let tags = extract_tags(&title, &text, TAG_LIMIT);

        ArticleRecord {
            id,
            title,
            date,
            url: url.to_string(),
            html,
            category,
            author_name: self.site.author_name.clone(),
            excerpt,
            featured: false,
            image,
            tags,
        }
    }
}
