//! Paginated listing crawler.
//!
//! The crawl is a small state machine driven one step at a time:
//!
//! ```text
//! FetchingList ──links──▶ ExtractingArticles ──next page──▶ FetchingList
//!      │                         │
//!      └──────────────▶ Done ◀───┘  (limit hit, empty page, no next page)
//! ```
//!
//! Articles are extracted strictly in listing order so an article can only
//! link back to ones already recorded in the [`ArticleIdMap`].

use crate::config::{listing_offset, SiteConfig};
use crate::error::CrawlError;
use crate::models::{ArticleIdMap, ArticleRecord};
use crate::scrapers::article::ArticleExtractor;
use crate::transport::Transport;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, instrument, warn};
use url::Url;

static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static NEXT_PAGE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)Вперед|Next").unwrap());

/// Optional bounds on a crawl. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlLimits {
    pub max_pages: Option<usize>,
    pub max_articles: Option<usize>,
    /// Ordinal of the last article to process, counted from the start offset.
    pub end_article: Option<usize>,
}

impl CrawlLimits {
    /// The tighter of `max_articles` and `end_article`.
    fn article_limit(&self) -> Option<usize> {
        match (self.max_articles, self.end_article) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

/// Why a crawl ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The last listing page had no next-page link.
    Exhausted,
    /// A listing page contained no article links.
    EmptyListing,
    /// `max_articles` or `end_article` reached.
    ArticleLimit,
    /// `max_pages` reached.
    PageLimit,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            StopReason::Exhausted => "no more pages",
            StopReason::EmptyListing => "empty listing page",
            StopReason::ArticleLimit => "article limit reached",
            StopReason::PageLimit => "page limit reached",
        };
        f.write_str(reason)
    }
}

#[derive(Debug)]
enum CrawlState {
    FetchingList { url: String },
    ExtractingArticles { links: Vec<String>, next: Option<String> },
    Done(StopReason),
}

/// Everything a finished crawl produced.
#[derive(Debug)]
pub struct CrawlReport {
    pub records: Vec<ArticleRecord>,
    /// `start=` offset of the last listing page fetched.
    pub last_offset: u64,
    pub pages_processed: usize,
    pub stop_reason: StopReason,
}

/// Absolute article URLs on a listing page, deduplicated, in page order.
pub fn extract_article_links(document: &Html, site: &SiteConfig) -> Vec<String> {
    document
        .select(&LINK_SELECTOR)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| site.article_url(href))
        .unique()
        .collect()
}

/// Absolute URL of the "next page" link, if the page has one.
pub fn find_next_page(document: &Html, site: &SiteConfig) -> Option<String> {
    document
        .select(&LINK_SELECTOR)
        .find(|a| NEXT_PAGE_RE.is_match(&a.text().collect::<String>()))
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| site.resolve(href))
        .map(String::from)
}

/// Walks listing pages and extracts each article once.
pub struct Crawler<'a> {
    transport: &'a Transport,
    site: &'a SiteConfig,
    extractor: &'a ArticleExtractor<'a>,
    limits: CrawlLimits,
}

impl<'a> Crawler<'a> {
    pub fn new(
        transport: &'a Transport,
        site: &'a SiteConfig,
        extractor: &'a ArticleExtractor<'a>,
        limits: CrawlLimits,
    ) -> Self {
        Self {
            transport,
            site,
            extractor,
            limits,
        }
    }

    /// Crawl from the listing page at `start` until a stop condition is hit.
    ///
    /// Per-article failures are logged and skipped. A listing page that cannot
    /// be fetched ends the run with [`CrawlError::Listing`].
    #[instrument(level = "info", skip(self), fields(limits = ?self.limits))]
    pub async fn run(&self, start: u64) -> Result<CrawlReport, CrawlError> {
        let article_limit = self.limits.article_limit();

        let mut ids = ArticleIdMap::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut records = Vec::new();
        let mut processed = 0usize;
        let mut pages = 0usize;
        let mut last_offset = start;

        let mut state = CrawlState::FetchingList {
            url: self.site.listing_url(start),
        };

        let stop_reason = loop {
            state = match state {
                CrawlState::FetchingList { url } => {
                    if self.limits.max_pages.is_some_and(|max| pages >= max) {
                        CrawlState::Done(StopReason::PageLimit)
                    } else {
                        let listing = Url::parse(&url).map_err(|source| CrawlError::InvalidUrl {
                            url: url.clone(),
                            source,
                        })?;
                        info!(%listing, page = pages + 1, "Fetching listing page");
                        let document = self
                            .transport
                            .fetch(listing.as_str())
                            .await
                            .map_err(CrawlError::Listing)?;
                        pages += 1;
                        last_offset = listing_offset(&url).unwrap_or(last_offset);

                        let links = extract_article_links(&document, self.site);
                        let next = find_next_page(&document, self.site);
                        info!(links = links.len(), has_next = next.is_some(), "Parsed listing page");

                        if links.is_empty() {
                            CrawlState::Done(StopReason::EmptyListing)
                        } else {
                            CrawlState::ExtractingArticles { links, next }
                        }
                    }
                }
                CrawlState::ExtractingArticles { links, next } => {
                    let mut limit_hit = false;
                    for link in links {
                        if article_limit.is_some_and(|limit| processed >= limit) {
                            limit_hit = true;
                            break;
                        }
                        if !seen.insert(link.clone()) {
                            debug!(%link, "Already processed; skipping");
                            continue;
                        }
                        processed += 1;

                        match self.extractor.extract(&link, &mut ids).await {
                            Ok(record) => records.push(record),
                            Err(e) => warn!(%link, error = %e, "Article extraction failed; skipping"),
                        }
                    }

                    // Don't fetch another listing page just to find the limit is spent.
                    let limit_hit =
                        limit_hit || article_limit.is_some_and(|limit| processed >= limit);
                    match (limit_hit, next) {
                        (true, _) => CrawlState::Done(StopReason::ArticleLimit),
                        (false, Some(url)) => CrawlState::FetchingList { url },
                        (false, None) => CrawlState::Done(StopReason::Exhausted),
                    }
                }
                CrawlState::Done(reason) => break reason,
            };
        };

        info!(
            records = records.len(),
            processed,
            pages,
            last_offset,
            stop_reason = %stop_reason,
            "Crawl finished"
        );

        Ok(CrawlReport {
            records,
            last_offset,
            pages_processed: pages,
            stop_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Classifier, ClassifierRules};
    use httpmock::prelude::*;
    use httpmock::Mock;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn listing_page(article_ids: &[u32], next: Option<u64>) -> String {
        let mut html = String::from("<html><body><ul>");
        for id in article_ids {
            html.push_str(&format!("<li><a href=\"/news/{id}-stattya-{id}\">Стаття {id}</a></li>"));
        }
        html.push_str("</ul><a href=\"/contacts\">Контакти</a>");
        if let Some(offset) = next {
            html.push_str(&format!("<a href=\"/news?start={offset}\">Вперед</a>"));
        }
        html.push_str("</body></html>");
        html
    }

    fn article_page(title: &str, body: &str) -> String {
        format!(
            "<html><body><h2 class=\"itemHeader\">{title}</h2>\
             <span class=\"itemDateCreated\">14 лютого, 2025</span>\
             <div class=\"itemFullText\">{body}</div></body></html>"
        )
    }

    fn mock_listing<'a>(server: &'a MockServer, start: u64, html: String) -> Mock<'a> {
        server.mock(|when, then| {
            when.method(GET)
                .path("/news")
                .query_param("start", start.to_string());
            then.status(200)
                .header("content-type", "text/html; charset=utf-8")
                .body(html);
        })
    }

    fn mock_article(server: &MockServer, id: u32) {
        server.mock(|when, then| {
            when.method(GET).path(format!("/news/{id}-stattya-{id}"));
            then.status(200)
                .body(article_page(&format!("Стаття номер {id}"), "<p>Текст</p>"));
        });
    }

    struct Fixture {
        transport: Transport,
        site: SiteConfig,
        classifier: Classifier,
        assets: tempfile::TempDir,
    }

    impl Fixture {
        fn new(server: &MockServer) -> Self {
            Self {
                transport: Transport::new("test-agent", Duration::from_secs(5)).unwrap(),
                site: SiteConfig::new(&server.base_url()).unwrap(),
                classifier: Classifier::new(ClassifierRules::builtin().unwrap()),
                assets: tempfile::tempdir().unwrap(),
            }
        }

        fn extractor(&self) -> ArticleExtractor<'_> {
            ArticleExtractor::new(&self.transport, &self.site, &self.classifier, self.assets.path())
        }
    }

    #[test]
    fn test_extract_article_links_dedups_in_order() {
        let site = SiteConfig::new("https://ukrainejudo.com").unwrap();
        let doc = Html::parse_document(
            r#"<a href="/news/2-b">b</a><a href="/news?start=5">page</a>
               <a href="https://ukrainejudo.com/news/1-a">a</a><a href="/news/2-b">b again</a>"#,
        );
        assert_eq!(
            extract_article_links(&doc, &site),
            vec![
                "https://ukrainejudo.com/news/2-b".to_string(),
                "https://ukrainejudo.com/news/1-a".to_string(),
            ]
        );
    }

    #[test]
    fn test_find_next_page() {
        let site = SiteConfig::new("https://ukrainejudo.com").unwrap();
        let doc = Html::parse_document(r#"<a href="/news?start=0">Назад</a><a href="/news?start=15">Вперед</a>"#);
        assert_eq!(
            find_next_page(&doc, &site).as_deref(),
            Some("https://ukrainejudo.com/news?start=15")
        );
        let doc = Html::parse_document(r#"<a href="/news?start=30"> next page </a>"#);
        assert!(find_next_page(&doc, &site).is_some());
        let doc = Html::parse_document(r#"<a href="/news?start=0">Назад</a>"#);
        assert_eq!(find_next_page(&doc, &site), None);
    }

    #[test]
    fn test_article_limit_is_the_tighter_bound() {
        let limits = CrawlLimits {
            max_articles: Some(10),
            end_article: Some(4),
            ..Default::default()
        };
        assert_eq!(limits.article_limit(), Some(4));
        assert_eq!(CrawlLimits::default().article_limit(), None);
    }

    #[tokio::test]
    async fn test_max_articles_counts_distinct_urls() {
        let server = MockServer::start();
        // Page 2 repeats two links from page 1.
        mock_listing(&server, 0, listing_page(&[1, 2, 3, 4, 5], Some(5)));
        mock_listing(&server, 5, listing_page(&[4, 5, 6, 7, 8], Some(10)));
        mock_listing(&server, 10, listing_page(&[9, 10, 11, 12, 13], Some(15)));
        for id in 1..=13 {
            mock_article(&server, id);
        }

        let fixture = Fixture::new(&server);
        let extractor = fixture.extractor();
        let limits = CrawlLimits {
            max_articles: Some(10),
            ..Default::default()
        };
        let report = Crawler::new(&fixture.transport, &fixture.site, &extractor, limits)
            .run(0)
            .await
            .unwrap();

        assert_eq!(report.records.len(), 10);
        assert_eq!(report.stop_reason, StopReason::ArticleLimit);
        assert_eq!(report.pages_processed, 3);
        assert_eq!(report.last_offset, 10);

        let urls: HashSet<&str> = report.records.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls.len(), 10);
        assert!(report.records.last().unwrap().url.ends_with("/news/10-stattya-10"));
    }

    #[tokio::test]
    async fn test_empty_listing_page_ends_crawl() {
        let server = MockServer::start();
        mock_listing(&server, 0, listing_page(&[1, 2], Some(5)));
        mock_listing(&server, 5, listing_page(&[], Some(10)));
        let third = mock_listing(&server, 10, listing_page(&[3], None));
        mock_article(&server, 1);
        mock_article(&server, 2);

        let fixture = Fixture::new(&server);
        let extractor = fixture.extractor();
        let report = Crawler::new(&fixture.transport, &fixture.site, &extractor, CrawlLimits::default())
            .run(0)
            .await
            .unwrap();

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.stop_reason, StopReason::EmptyListing);
        assert_eq!(report.pages_processed, 2);
        assert_eq!(report.last_offset, 5);
        third.assert_calls(0);
    }

    #[tokio::test]
    async fn test_max_pages_checked_before_fetch() {
        let server = MockServer::start();
        mock_listing(&server, 20, listing_page(&[1], Some(25)));
        let second = mock_listing(&server, 25, listing_page(&[2], None));
        mock_article(&server, 1);

        let fixture = Fixture::new(&server);
        let extractor = fixture.extractor();
        let limits = CrawlLimits {
            max_pages: Some(1),
            ..Default::default()
        };
        let report = Crawler::new(&fixture.transport, &fixture.site, &extractor, limits)
            .run(20)
            .await
            .unwrap();

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.stop_reason, StopReason::PageLimit);
        assert_eq!(report.pages_processed, 1);
        assert_eq!(report.last_offset, 20);
        second.assert_calls(0);
    }

    #[tokio::test]
    async fn test_failed_article_is_skipped_but_counted() {
        let server = MockServer::start();
        mock_listing(&server, 0, listing_page(&[1, 2, 3], None));
        mock_article(&server, 1);
        server.mock(|when, then| {
            when.method(GET).path("/news/2-stattya-2");
            then.status(503);
        });
        mock_article(&server, 3);

        let fixture = Fixture::new(&server);
        let extractor = fixture.extractor();
        let limits = CrawlLimits {
            end_article: Some(2),
            ..Default::default()
        };
        let report = Crawler::new(&fixture.transport, &fixture.site, &extractor, limits)
            .run(0)
            .await
            .unwrap();

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.stop_reason, StopReason::ArticleLimit);
        assert_eq!(report.records[0].title, "Стаття номер 1");
    }

    #[tokio::test]
    async fn test_listing_failure_is_fatal() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/news");
            then.status(500);
        });

        let fixture = Fixture::new(&server);
        let extractor = fixture.extractor();
        let result = Crawler::new(&fixture.transport, &fixture.site, &extractor, CrawlLimits::default())
            .run(0)
            .await;
        assert!(matches!(result, Err(CrawlError::Listing(_))));
    }

    #[tokio::test]
    async fn test_unparseable_listing_url_is_error() {
        let server = MockServer::start();
        let fixture = Fixture::new(&server);
        let extractor = fixture.extractor();
        let site = SiteConfig {
            listing_path: "news".to_string(),
            ..fixture.site.clone()
        };
        let result = Crawler::new(&fixture.transport, &site, &extractor, CrawlLimits::default())
            .run(0)
            .await;
        assert!(matches!(result, Err(CrawlError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_only_backward_links_are_rewritten() {
        let server = MockServer::start();
        mock_listing(&server, 0, listing_page(&[1, 2], None));
        server.mock(|when, then| {
            when.method(GET).path("/news/1-stattya-1");
            then.status(200).body(article_page(
                "Перша",
                "<p><a href=\"/news/2-stattya-2\">далі</a></p>",
            ));
        });
        server.mock(|when, then| {
            when.method(GET).path("/news/2-stattya-2");
            then.status(200).body(article_page(
                "Друга",
                "<p><a href=\"/news/1-stattya-1\">назад</a></p>",
            ));
        });

        let fixture = Fixture::new(&server);
        let extractor = fixture.extractor();
        let report = Crawler::new(&fixture.transport, &fixture.site, &extractor, CrawlLimits::default())
            .run(0)
            .await
            .unwrap();

        assert_eq!(report.stop_reason, StopReason::Exhausted);
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[0].html, "<p><a href=\"/news/2-stattya-2\">далі</a></p>");
        assert_eq!(report.records[1].html, "<p><a href=\"/news/persha\">назад</a></p>");
    }
}
