use crate::error::{RagserveError, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A unit of ingested content, produced by the loader and consumed by the chunker.
#[derive(Debug, Clone)]
pub struct Document {
    pub content: String,
    pub source_path: PathBuf,
}

/// Extensions read as UTF-8 text (case-insensitive).
const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "mdx"];

/// Check whether a path has an extension we know how to ingest.
///
/// Plain text family (`.txt`, `.md`, `.mdx`) and PDFs. Everything else
/// is skipped silently.
pub fn is_eligible(path: &Path) -> bool {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();
    TEXT_EXTENSIONS.contains(&extension.as_str()) || extension == "pdf"
}

/// Recursively enumerate all eligible files under `root`.
///
/// Directories are traversed fully; unreadable entries are skipped. The result
/// is sorted so scans are deterministic. An empty directory yields an empty vec.
pub fn discover_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_file() && is_eligible(path) {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    log::debug!("Discovered {} files in {}", files.len(), root.display());
    Ok(files)
}

/// Load a single file into a Document, extracting text according to its type.
pub fn load_document(path: &Path) -> Result<Document> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();

    let content = if extension == "pdf" {
        pdf_extract::extract_text(path)
            .map_err(|e| RagserveError::Parse(format!("{}: {}", path.display(), e)))?
    } else {
        std::fs::read_to_string(path).map_err(RagserveError::Io)?
    };

    Ok(Document {
        content,
        source_path: path.to_path_buf(),
    })
}

/// Load every eligible document under `root`.
///
/// A read or extraction failure on one file is logged and that file is
/// skipped; it never aborts the rest of the scan.
pub fn load_documents(root: &Path) -> Result<Vec<Document>> {
    let files = discover_files(root)?;
    let mut docs = Vec::with_capacity(files.len());

    for path in &files {
        match load_document(path) {
            Ok(doc) => docs.push(doc),
            Err(e) => log::warn!("Skipping unreadable file {}: {}", path.display(), e),
        }
    }

    Ok(docs)
}
