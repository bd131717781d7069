//! # judo_news
//!
//! Ingests the Ukrainian Judo Federation news archive into structured records
//! for a static content store.
//!
//! ## Features
//!
//! - Walks the paginated `/news?start=N` listing with page and article limits
//! - Extracts title, date, body and preview image with ordered fallback selectors
//! - Downloads article images into `<assets>/<year>/<month>/` and rewrites
//!   references to the local copies
//! - Rewrites links between scraped articles to local slugs, and document
//!   links to the canonical protocols/regulations pages
//! - Classifies each article with a weighted keyword table (YAML)
//! - Writes a JSON array of records, and optionally a CSV export
//!
//! ## Usage
//!
//! ```sh
//! judo_news news.json --max-articles 50 --csv news.csv
//! ```
//!
//! ## Architecture
//!
//! 1. **Listing**: fetch a listing page and collect article links
//! 2. **Extraction**: fetch each article, localize its content, classify it
//! 3. **Output**: write all records once the crawl has finished
//!
//! Everything runs sequentially on a single-threaded runtime; the order in
//! which articles are extracted decides which internal links can be resolved.

use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod classifier;
mod cli;
mod config;
mod error;
mod localizer;
mod models;
mod normalize;
mod outputs;
mod scrapers;
mod transport;
mod utils;

use classifier::{Classifier, ClassifierRules};
use cli::Cli;
use config::SiteConfig;
use outputs::{csv, json};
use scrapers::article::ArticleExtractor;
use scrapers::listing::{CrawlLimits, Crawler};
use transport::{Transport, DEFAULT_USER_AGENT};
use utils::ensure_writable_dir;

#[tokio::main(flavor = "current_thread")]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("judo_news starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    // --- Configuration ---
    let rules = match &args.rules {
        Some(path) => ClassifierRules::load(path)?,
        None => ClassifierRules::builtin()?,
    };
    let classifier = Classifier::new(rules);
    info!(
        categories = classifier.taxonomy().count(),
        default_category = classifier.default_category(),
        "Classifier ready"
    );
    let site = SiteConfig::new(&args.base_url)?;
    let transport = Transport::new(DEFAULT_USER_AGENT, Duration::from_secs(args.timeout_secs))?;

    // Fail before any network work if images cannot be stored
    if let Err(e) = ensure_writable_dir(&args.assets_dir).await {
        error!(
            path = %args.assets_dir.display(),
            error = %e,
            "Asset directory is not writable (fix perms or choose a different path)"
        );
        return Err(e.into());
    }

    // --- Crawl ---
    let limits = CrawlLimits {
        max_pages: args.max_pages,
        max_articles: args.max_articles,
        end_article: args.end_article,
    };
    let extractor = ArticleExtractor::new(&transport, &site, &classifier, args.assets_dir.clone());
    let report = Crawler::new(&transport, &site, &extractor, limits)
        .run(args.start)
        .await
        .inspect_err(|e| error!(error = %e, "Crawl aborted; no output written"))?;

    // --- Output ---
    json::write_records(&report.records, &args.output).await?;
    if let Some(csv_path) = &args.csv {
        csv::write_records(&report.records, csv_path).await?;
    }

    info!(
        records = report.records.len(),
        pages_processed = report.pages_processed,
        last_offset = report.last_offset,
        stop_reason = %report.stop_reason,
        output = %args.output.display(),
        elapsed_secs = start_time.elapsed().as_secs_f64(),
        "Run complete"
    );
    println!(
        "Saved {} articles to {} ({} pages, last offset {}, {})",
        report.records.len(),
        args.output.display(),
        report.pages_processed,
        report.last_offset,
        report.stop_reason
    );

    Ok(())
}
