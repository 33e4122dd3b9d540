//! Core data models used throughout the pipeline.
//!
//! Documents and chunks flow through ingestion; retrieval results exist only
//! for the duration of a single query.

/// Extracted text of one PDF page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Path of the source PDF, as discovered under the data directory.
    pub source: String,
    /// 1-based page number.
    pub page: Option<u32>,
    pub text: String,
}

/// A contiguous span of a document's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Stable id derived from source, page, and start offset.
    pub id: String,
    pub source: String,
    pub page: Option<u32>,
    /// Position of the chunk within its document.
    pub chunk_index: i64,
    /// Character offset where the chunk begins in the document text.
    pub start_index: usize,
    pub text: String,
    /// SHA-256 of `text`.
    pub hash: String,
}

/// A chunk paired with its embedding vector, as written to the store.
#[derive(Debug, Clone)]
pub struct IndexedRecord {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// A stored chunk scored against a query vector.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub chunk_id: String,
    pub text: String,
    pub source: String,
    pub page: Option<u32>,
    pub start_index: usize,
    /// Cosine similarity; higher means more similar.
    pub score: f64,
}
