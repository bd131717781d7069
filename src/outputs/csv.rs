//! CSV export for the content store's bulk importer.
//!
//! One row per record with the columns in [`HEADER`]. Records missing an
//! `id`, `title` or `date` are skipped. Fields containing a comma, quote or
//! line break are quoted with embedded quotes doubled.

use crate::error::OutputError;
use crate::models::ArticleRecord;
use std::path::Path;
use tracing::{info, instrument, warn};

pub const HEADER: [&str; 10] = [
    "id",
    "title",
    "category",
    "author_name",
    "publishedAt",
    "excerpt",
    "featured",
    "image_url",
    "tags",
    "content",
];

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

fn push_row<'a>(out: &mut String, cells: impl IntoIterator<Item = &'a str>) {
    for (i, cell) in cells.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        if needs_quotes(cell) {
            out.push('"');
            out.push_str(&cell.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(cell);
        }
    }
    out.push_str("\r\n");
}

/// Render the header plus one row per importable record.
///
/// Returns the CSV text and the number of rows written.
pub fn render(records: &[ArticleRecord]) -> (String, usize) {
    let mut out = String::new();
    push_row(&mut out, HEADER);

    let mut rows = 0;
    for record in records {
        if !record.has_required_fields() {
            warn!(url = %record.url, "Skipping record without id, title or date");
            continue;
        }
        let featured = if record.featured { "true" } else { "false" };
        let tags = record.joined_tags();
        push_row(
            &mut out,
            [
                record.id.as_str(),
                record.title.as_str(),
                record.category.as_str(),
                record.author_name.as_str(),
                record.date.as_str(),
                record.excerpt.as_str(),
                featured,
                record.image.as_str(),
                tags.as_str(),
                record.html.as_str(),
            ],
        );
        rows += 1;
    }
    (out, rows)
}

/// Write importable `records` to `path`; returns the number of data rows.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_records(records: &[ArticleRecord], path: &Path) -> Result<usize, OutputError> {
    let (csv, rows) = render(records);
    super::write_file(path, csv).await?;
    info!(rows, skipped = records.len() - rows, "Wrote CSV export");
    Ok(rows)
}
