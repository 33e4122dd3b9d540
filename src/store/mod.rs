//! Vector store abstraction.
//!
//! The [`VectorStore`] trait covers the two things the pipelines need: a full
//! rebuild from a set of records (ingestion) and a nearest-neighbour query
//! (retrieval). There is no incremental update.
//!
//! Implementations:
//! - [`SqliteStore`]: persistent, one SQLite database per store directory.
//! - [`InMemoryStore`]: process-local, for tests and library use.
//!
//! Both rank by brute-force cosine similarity over every stored vector.

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{IndexedRecord, RetrievalResult};

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Replace every record in the store with `records`, tagged with the
    /// embedding model that produced them. An empty `records` leaves an
    /// empty store.
    async fn replace_all(&self, model: &str, records: Vec<IndexedRecord>) -> Result<()>;

    /// The `k` records most similar to `query`, highest score first. Equal
    /// scores keep insertion order. An empty store returns an empty list.
    async fn similarity_search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievalResult>>;

    /// Number of stored records.
    async fn count(&self) -> Result<usize>;

    /// Embedding model recorded at the last rebuild, if any.
    async fn embedding_model(&self) -> Result<Option<String>>;
}

/// Sort by descending score and keep the first `k`.
///
/// The sort is stable, so candidates given in insertion order keep that
/// order among equal scores.
pub(crate) fn rank(mut candidates: Vec<RetrievalResult>, k: usize) -> Vec<RetrievalResult> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(k);
    candidates
}
