//! Writers for the final record set.
//!
//! # Submodules
//!
//! - [`json`]: the primary output, a pretty-printed JSON array of records
//! - [`csv`]: optional flattened rows for importing into the content store
//!
//! Both writers run once at the end of a successful crawl and create missing
//! parent directories.

pub mod csv;
pub mod json;

use crate::error::OutputError;
use std::path::Path;
use tokio::fs;

/// Create the parent directory of `path` if it has one.
async fn ensure_parent(path: &Path) -> Result<(), OutputError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| OutputError::Io {
                    path: parent.display().to_string(),
                    source,
                })
        }
        _ => Ok(()),
    }
}

async fn write_file(path: &Path, contents: String) -> Result<(), OutputError> {
    ensure_parent(path).await?;
    fs::write(path, contents)
        .await
        .map_err(|source| OutputError::Io {
            path: path.display().to_string(),
            source,
        })
}
