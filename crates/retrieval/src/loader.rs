//! Reads product documents from the documents directory.
//!
//! Plain text and Markdown files are accepted. A form feed (`\x0c`) starts a
//! new page; page numbers are 1-based.

use finanbot_core::RetrievalError;
use std::path::Path;
use tracing::{debug, warn};

const EXTENSIONS: [&str; 3] = ["txt", "md", "markdown"];
const PAGE_BREAK: char = '\x0c';

/// One page of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedPage {
    /// File name relative to the documents directory.
    pub source: String,
    pub page: usize,
    pub text: String,
}

fn is_document(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Recursively load every document under `dir`, in path order.
/// Blank pages are skipped.
pub fn load_documents(dir: &Path) -> Result<Vec<LoadedPage>, RetrievalError> {
    let mut files = Vec::new();
    collect_files(dir, &mut files)?;
    files.sort();

    let mut pages = Vec::new();
    for path in files {
        let content = std::fs::read_to_string(&path).map_err(|e| RetrievalError::Ingestion {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let source = path
            .strip_prefix(dir)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");

        let before = pages.len();
        for (i, text) in content.split(PAGE_BREAK).enumerate() {
            if text.trim().is_empty() {
                continue;
            }
            pages.push(LoadedPage {
                source: source.clone(),
                page: i + 1,
                text: text.to_string(),
            });
        }
        debug!(source = %source, pages = pages.len() - before, "Loaded document");
    }

    Ok(pages)
}

fn collect_files(dir: &Path, out: &mut Vec<std::path::PathBuf>) -> Result<(), RetrievalError> {
    let entries = std::fs::read_dir(dir).map_err(|e| RetrievalError::Ingestion {
        path: dir.display().to_string(),
        reason: e.to_string(),
    })?;

    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Skipping unreadable directory entry");
                continue;
            }
        };
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else if is_document(&path) {
            out.push(path);
        }
    }
    Ok(())
}
