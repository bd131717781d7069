//! Scrapers for the source news site.
//!
//! Scraping follows a two-phase pattern:
//!
//! 1. **Listing**: walk the paginated `/news?start=N` index and collect article URLs
//! 2. **Extraction**: download each article page and build an [`ArticleRecord`]
//!
//! # Modules
//!
//! | Module | Role |
//! |--------|------|
//! | [`listing`] | Pagination state machine, limits, deduplication |
//! | [`article`] | Field selectors, localization, classification |
//!
//! Both phases run sequentially. Failed article fetches are logged and
//! skipped; a failed listing fetch ends the run.
//!
//! [`ArticleRecord`]: crate::models::ArticleRecord

pub mod article;
pub mod listing;
