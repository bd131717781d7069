//! JSON output.
//!
//! The whole run is written as one array of [`ArticleRecord`] objects,
//! two-space indented, with non-ASCII text kept verbatim. An existing file is
//! overwritten.

use crate::error::OutputError;
use crate::models::ArticleRecord;
use std::path::Path;
use tracing::{info, instrument};

/// Write `records` to `path` as a pretty-printed JSON array.
#[instrument(level = "info", skip_all, fields(path = %path.display(), records = records.len()))]
pub async fn write_records(records: &[ArticleRecord], path: &Path) -> Result<(), OutputError> {
    let json = serde_json::to_string_pretty(records)?;
    super::write_file(path, json).await?;
    info!("Wrote JSON output");
    Ok(())
}
