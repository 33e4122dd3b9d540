//! PDF text extraction.
//!
//! Turns the bytes of a PDF into one plain-text string per page. Pages keep
//! their order; a page with no extractable text comes back as an empty string
//! so page numbers stay aligned with the file.

use std::path::Path;

/// Extraction error. Never panics; the loader turns it into an ingestion error.
#[derive(Debug)]
pub enum ExtractError {
    Io(String),
    Pdf(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Io(e) => write!(f, "failed to read PDF: {}", e),
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Extract the text of every page, in page order.
///
/// pdf-extract panics on some malformed inputs (missing font resources,
/// unsupported encodings); those panics come back as [`ExtractError::Pdf`].
pub fn extract_pages(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    contain_panic(|| pdf_extract::extract_text_from_mem_by_pages(bytes))?
        .map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn contain_panic<T>(f: impl FnOnce() -> T) -> Result<T, ExtractError> {
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)).map_err(|payload| {
        let msg = if let Some(s) = payload.downcast_ref::<&str>() {
            format!("extractor panicked: {}", s)
        } else if let Some(s) = payload.downcast_ref::<String>() {
            format!("extractor panicked: {}", s)
        } else {
            "extractor panicked".to_string()
        };
        ExtractError::Pdf(msg)
    })
}

/// Read a PDF from disk and extract its pages.
pub fn extract_pages_from_path(path: &Path) -> Result<Vec<String>, ExtractError> {
    let bytes = std::fs::read(path).map_err(|e| ExtractError::Io(e.to_string()))?;
    extract_pages(&bytes)
}
