//! PDF discovery and page loading.
//!
//! Walks the data directory, keeps files matching the include globs (minus
//! the exclude globs), and extracts each one page by page. Paths are matched
//! relative to the data directory and case-insensitively, so `Report.PDF` is
//! picked up by the default `**/*.pdf` pattern.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::LoaderConfig;
use crate::error::{RagError, Result};
use crate::extract;
use crate::models::Document;

/// List matching files under `data_dir` in sorted path order.
pub fn discover_pdfs(data_dir: &Path, config: &LoaderConfig) -> Result<Vec<PathBuf>> {
    if !data_dir.is_dir() {
        return Err(RagError::ingestion(format!(
            "data directory does not exist or is not a directory: {}",
            data_dir.display()
        )));
    }

    let include_set = build_globset(&config.include_globs)?;
    let exclude_set = build_globset(&config.exclude_globs)?;

    let mut paths = Vec::new();

    let walker = WalkDir::new(data_dir).follow_links(config.follow_symlinks);
    for entry in walker {
        let entry = entry.map_err(|e| {
            RagError::ingestion(format!("failed to walk {}: {}", data_dir.display(), e))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(data_dir).unwrap_or(path);
        let rel_str = relative.to_string_lossy();

        if exclude_set.is_match(rel_str.as_ref()) {
            continue;
        }
        if !include_set.is_match(rel_str.as_ref()) {
            continue;
        }

        paths.push(path.to_path_buf());
    }

    paths.sort();

    if paths.is_empty() {
        return Err(RagError::ingestion(format!(
            "no PDF files found under {}",
            data_dir.display()
        )));
    }

    Ok(paths)
}

/// Load every matching PDF as one [`Document`] per non-blank page.
///
/// Extraction failure on any file aborts the whole load.
pub fn load_documents(data_dir: &Path, config: &LoaderConfig) -> Result<Vec<Document>> {
    let paths = discover_pdfs(data_dir, config)?;
    tracing::info!(files = paths.len(), dir = %data_dir.display(), "discovered PDFs");

    let mut documents = Vec::new();
    for path in &paths {
        let pages = extract::extract_pages_from_path(path).map_err(|e| {
            RagError::ingestion(format!("{}: {}", path.display(), e))
        })?;
        tracing::debug!(file = %path.display(), pages = pages.len(), "extracted");
        documents.extend(pages_to_documents(&path.display().to_string(), pages));
    }

    tracing::info!(documents = documents.len(), "loaded documents");
    Ok(documents)
}

/// Number pages from 1, dropping pages without text.
fn pages_to_documents(source: &str, pages: Vec<String>) -> Vec<Document> {
    pages
        .into_iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(i, text)| Document {
            source: source.to_string(),
            page: Some(i as u32 + 1),
            text,
        })
        .collect()
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| RagError::config(format!("invalid glob '{}': {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| RagError::config(format!("invalid glob set: {}", e)))
}
