//! Command-line interface definitions for judo_news.
//!
//! Every option can also be supplied through a `JUDO_NEWS_*` environment
//! variable, which is how the scheduled import job configures it.

use crate::transport::DEFAULT_TIMEOUT;
use clap::Parser;
use std::path::PathBuf;

/// Scrape the federation news archive into a JSON file for the content store.
///
/// # Examples
///
/// ```sh
/// # Whole archive into news.json
/// judo_news
///
/// # First 20 articles from offset 30, plus a CSV export
/// judo_news out/news.json --start 30 --max-articles 20 --csv out/news.csv
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Output JSON file
    #[arg(env = "JUDO_NEWS_OUTPUT", default_value = "news.json")]
    pub output: PathBuf,

    /// Listing offset to start from (`start=` query parameter)
    #[arg(short, long, env = "JUDO_NEWS_START", default_value_t = 0)]
    pub start: u64,

    /// Stop after visiting this many listing pages
    #[arg(long, env = "JUDO_NEWS_MAX_PAGES")]
    pub max_pages: Option<usize>,

    /// Stop after processing this many distinct articles
    #[arg(long, env = "JUDO_NEWS_MAX_ARTICLES")]
    pub max_articles: Option<usize>,

    /// Ordinal of the last article to process
    #[arg(long, env = "JUDO_NEWS_END_ARTICLE")]
    pub end_article: Option<usize>,

    /// Root directory for downloaded images
    #[arg(short, long, env = "JUDO_NEWS_ASSETS_DIR", default_value = "assets/news")]
    pub assets_dir: PathBuf,

    /// Site to scrape
    #[arg(long, env = "JUDO_NEWS_BASE_URL", default_value = crate::config::DEFAULT_BASE_URL)]
    pub base_url: String,

    /// YAML classifier rules replacing the built-in table
    #[arg(short, long, env = "JUDO_NEWS_RULES")]
    pub rules: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, env = "JUDO_NEWS_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT.as_secs())]
    pub timeout_secs: u64,

    /// Also write a CSV export for the content store
    #[arg(long, env = "JUDO_NEWS_CSV")]
    pub csv: Option<PathBuf>,
}
