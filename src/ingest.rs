//! Ingestion pipeline orchestration.
//!
//! Coordinates the full rebuild: load PDFs → chunk → embed → replace store.
//! Every run starts from scratch; the previous store survives only if the
//! run fails before the new one is complete.

use crate::chunk::Chunker;
use crate::config::Config;
use crate::embedding::{create_embedder, Embedder};
use crate::error::{Result, Stage};
use crate::index::rebuild_index;
use crate::loader;
use crate::models::Chunk;
use crate::store::{SqliteStore, VectorStore};

/// Characters of the sample chunk shown after splitting.
const SAMPLE_PREVIEW_CHARS: usize = 500;

/// Documents and chunks produced from the data directory.
#[derive(Debug)]
pub struct ChunkedCorpus {
    pub documents: usize,
    pub chunks: Vec<Chunk>,
}

/// Load every PDF under `paths.data_dir` and split it into chunks.
pub fn load_and_chunk(config: &Config) -> Result<ChunkedCorpus> {
    let chunker = Chunker::from_config(&config.chunking)?;
    let documents = loader::load_documents(&config.paths.data_dir, &config.loader)?;
    let chunks = chunker.split_documents(&documents);
    tracing::info!(
        documents = documents.len(),
        chunks = chunks.len(),
        "split documents"
    );
    Ok(ChunkedCorpus {
        documents: documents.len(),
        chunks,
    })
}

/// Index of the chunk previewed after splitting: the eleventh, or the last
/// one when there are fewer.
pub fn sample_index(chunk_count: usize) -> Option<usize> {
    chunk_count.checked_sub(1).map(|last| last.min(10))
}

fn format_metadata(chunk: &Chunk) -> String {
    format!(
        "source={} page={} start_index={}",
        chunk.source,
        chunk
            .page
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string()),
        chunk.start_index
    )
}

/// Run ingestion with the configured embedder and the on-disk store.
pub async fn run_ingest(config: &Config) -> Result<usize> {
    let store = SqliteStore::new(&config.paths.store_dir);
    let corpus = load_and_chunk(config)?;
    print_split_summary(&corpus);

    let embedder = create_embedder(&config.embedding, Stage::Indexing)?;
    save(config, corpus.chunks, embedder.as_ref(), &store).await
}

/// Run ingestion against the given embedder and store.
pub async fn run_ingest_with(
    config: &Config,
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
) -> Result<usize> {
    let corpus = load_and_chunk(config)?;
    print_split_summary(&corpus);
    save(config, corpus.chunks, embedder, store).await
}

fn print_split_summary(corpus: &ChunkedCorpus) {
    println!(
        "Split {} documents into {} chunks.",
        corpus.documents,
        corpus.chunks.len()
    );

    if let Some(sample) = sample_index(corpus.chunks.len()).map(|i| &corpus.chunks[i]) {
        let preview: String = sample.text.chars().take(SAMPLE_PREVIEW_CHARS).collect();
        println!("{}", preview);
        println!("{}", format_metadata(sample));
    }
}

async fn save(
    config: &Config,
    chunks: Vec<Chunk>,
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
) -> Result<usize> {
    let saved = rebuild_index(chunks, embedder, store, config.embedding.batch_size).await?;
    println!(
        "Saved {} chunks to {}.",
        saved,
        config.paths.store_dir.display()
    );
    Ok(saved)
}
