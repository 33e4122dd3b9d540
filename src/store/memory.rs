//! In-memory [`VectorStore`] implementation for tests and library use.
//!
//! Records live in a `Vec` behind `std::sync::RwLock`. Vector search is
//! brute-force cosine similarity over all stored vectors.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::error::{RagError, Result};
use crate::models::{IndexedRecord, RetrievalResult};

use super::{rank, VectorStore};

#[derive(Default)]
struct State {
    model: Option<String>,
    records: Vec<IndexedRecord>,
}

/// Process-local store. Contents are lost when it is dropped.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> RagError {
    RagError::retrieval("in-memory store lock poisoned")
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn replace_all(&self, model: &str, records: Vec<IndexedRecord>) -> Result<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| RagError::indexing("in-memory store lock poisoned"))?;
        state.model = Some(model.to_string());
        state.records = records;
        Ok(())
    }

    async fn similarity_search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievalResult>> {
        let state = self.state.read().map_err(|_| poisoned())?;
        let candidates = state
            .records
            .iter()
            .map(|r| RetrievalResult {
                chunk_id: r.chunk.id.clone(),
                text: r.chunk.text.clone(),
                source: r.chunk.source.clone(),
                page: r.chunk.page,
                start_index: r.chunk.start_index,
                score: cosine_similarity(query, &r.embedding) as f64,
            })
            .collect();
        Ok(rank(candidates, k))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.state.read().map_err(|_| poisoned())?.records.len())
    }

    async fn embedding_model(&self) -> Result<Option<String>> {
        Ok(self.state.read().map_err(|_| poisoned())?.model.clone())
    }
}
