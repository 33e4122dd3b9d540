//! Index rebuild: embed every chunk, then replace the store in one step.
//!
//! All embedding happens before the store is touched, so a failed or
//! inconsistent embedding run leaves the previous index untouched.

use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::models::{Chunk, IndexedRecord};
use crate::store::VectorStore;

/// Embed `chunks` in batches of `batch_size` and replace the store contents.
///
/// Returns the number of records written. An empty chunk list rebuilds an
/// empty store.
pub async fn rebuild_index(
    chunks: Vec<Chunk>,
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    batch_size: usize,
) -> Result<usize> {
    let batch_size = batch_size.max(1);
    let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());

    for (batch_no, batch) in chunks.chunks(batch_size).enumerate() {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let embedded = embedder.embed_batch(&texts).await.map_err(|e| match e {
            RagError::Indexing(_) | RagError::Timeout { .. } | RagError::Config(_) => e,
            other => RagError::indexing(other),
        })?;

        if embedded.len() != texts.len() {
            return Err(RagError::indexing(format!(
                "embedding backend returned {} vectors for {} texts",
                embedded.len(),
                texts.len()
            )));
        }

        tracing::debug!(batch = batch_no, size = texts.len(), "embedded batch");
        vectors.extend(embedded);
    }

    if let Some(first) = vectors.first() {
        let dims = first.len();
        if dims == 0 {
            return Err(RagError::indexing("embedding backend returned empty vectors"));
        }
        if let Some(bad) = vectors.iter().position(|v| v.len() != dims) {
            return Err(RagError::indexing(format!(
                "inconsistent embedding dimensions: expected {}, got {} for chunk {}",
                dims,
                vectors[bad].len(),
                bad
            )));
        }
    }

    let records: Vec<IndexedRecord> = chunks
        .into_iter()
        .zip(vectors)
        .map(|(chunk, embedding)| IndexedRecord { chunk, embedding })
        .collect();
    let count = records.len();

    store.replace_all(embedder.model_name(), records).await?;
    Ok(count)
}
