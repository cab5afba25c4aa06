//! Bulk indexing of plain-text files.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::{DocumentStore, document::Document, errors::StoreError};

/// Writes every `*.txt` file directly under `dir` as one document.
///
/// The document id is the file stem and the file name is stored as meta `name`,
/// so re-indexing the same directory replaces rather than duplicates. Empty
/// files are skipped. Returns the number of documents written.
///
/// # Errors
/// Returns `StoreError::Io` if the directory or a file cannot be read.
pub fn index_text_files(store: &dyn DocumentStore, dir: impl AsRef<Path>) -> Result<usize, StoreError> {
    let dir = dir.as_ref();
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == "txt") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut docs = Vec::with_capacity(paths.len());
    for path in paths {
        let text = std::fs::read_to_string(&path)?;
        if text.trim().is_empty() {
            warn!("Skipping empty file {}", path.display());
            continue;
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let id = path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.clone());

        debug!("index_text_files: {name} ({} chars)", text.chars().count());
        docs.push(Document::new(text).with_id(id).with_meta("name", name));
    }

    let written = store.write_documents(&docs)?;
    info!("Indexed {written} text files from {}", dir.display());
    Ok(written)
}
