//! Discovering PDFs in a user-chosen directory and extracting their text page by page.
//!
//! The corpus directory is chosen by the user; we only read it. A PDF that cannot be
//! parsed is skipped and reported, it never aborts the rest of the load.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

/// Where a piece of text came from: file and 1-based page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub source_path: PathBuf,
    /// `None` when the page is unknown; rendered as `N/A`.
    pub page_number: Option<u32>,
}

impl SourceRef {
    pub fn new(source_path: impl Into<PathBuf>, page_number: Option<u32>) -> Self {
        Self {
            source_path: source_path.into(),
            page_number,
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.page_number {
            Some(p) => write!(f, "{} (page {})", self.source_path.display(), p),
            None => write!(f, "{} (page N/A)", self.source_path.display()),
        }
    }
}

/// Text of one page of one PDF.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    pub text: String,
    pub source: SourceRef,
}

/// A PDF we found but could not read.
#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of loading a directory: the pages, plus the files that were skipped.
#[derive(Debug, Default)]
pub struct Corpus {
    pub documents: Vec<SourceDocument>,
    pub skipped: Vec<SkippedFile>,
}

/// Scans `dir` (not recursively) for `.pdf` files and returns one document per page.
/// Files come in file-name order, pages in ascending order.
#[tracing::instrument(skip_all, fields(dir = %dir.display()))]
pub fn load_pdfs(dir: &Path) -> Result<Corpus, IngestionError> {
    if !dir.exists() {
        return Err(IngestionError::NotFound(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(IngestionError::NotADirectory(dir.to_path_buf()));
    }
    let mut corpus = Corpus::default();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| IngestionError::Walk(e.to_string()))?;
        let path = entry.path();
        if is_hidden(&entry) || !is_pdf(path) || !path.is_file() {
            continue;
        }
        match extract_pages(path) {
            Ok(pages) => {
                tracing::debug!(file = %path.display(), pages = pages.len(), "loaded PDF");
                corpus.documents.extend(pages);
            }
            Err(reason) => {
                tracing::warn!(file = %path.display(), %reason, "skipping unreadable PDF");
                corpus.skipped.push(SkippedFile {
                    path: path.to_path_buf(),
                    reason,
                });
            }
        }
    }
    tracing::info!(
        pages = corpus.documents.len(),
        skipped = corpus.skipped.len(),
        "PDF directory loaded"
    );
    Ok(corpus)
}

fn extract_pages(path: &Path) -> Result<Vec<SourceDocument>, String> {
    let doc = lopdf::Document::load(path).map_err(|e| format!("failed to parse PDF: {e}"))?;
    let mut pages = Vec::new();
    // get_pages is keyed by 1-based page number, already sorted.
    for page_number in doc.get_pages().into_keys() {
        match doc.extract_text(&[page_number]) {
            Ok(text) => pages.push(SourceDocument {
                text,
                source: SourceRef::new(path, Some(page_number)),
            }),
            Err(e) => {
                tracing::warn!(file = %path.display(), page = page_number, error = %e, "dropping page without extractable text");
            }
        }
    }
    Ok(pages)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|s| s.starts_with('.'))
}

#[derive(Debug, thiserror::Error)]
pub enum IngestionError {
    #[error("PDF directory does not exist: {0}")]
    NotFound(PathBuf),
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("walk error: {0}")]
    Walk(String),
    #[error("PDF loading task failed: {0}")]
    Task(String),
    #[error("no indexable text in {dir} ({skipped} file(s) skipped)")]
    EmptyCorpus { dir: PathBuf, skipped: usize },
}
