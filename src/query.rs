//! Query pipeline orchestration.
//!
//! Embed the question → nearest `top_k` chunks → drop bibliography noise →
//! keep `final_context_size` → render prompt → ask the language model.
//!
//! An empty store is not an error: the outcome is [`QueryOutcome::NoResults`]
//! and the language model is never contacted.

use crate::config::{Config, RetrievalConfig};
use crate::embedding::{create_embedder, Embedder};
use crate::error::{RagError, Result, Stage};
use crate::filter::select_context;
use crate::llm::{create_completer, Completer};
use crate::models::RetrievalResult;
use crate::observer::{NoopObserver, QueryObserver, StderrObserver};
use crate::prompt::build_prompt;
use crate::store::{rank, SqliteStore, VectorStore};

/// Message printed when the store has nothing to offer.
pub const NO_RESULTS_MESSAGE: &str = "Unable to find matching results.";

#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    NoResults,
    Answered {
        answer: String,
        /// Source path of each context chunk, in ranked order.
        sources: Vec<String>,
    },
}

/// The `top_k` stored chunks nearest to `question`, best first.
pub async fn retrieve(
    question: &str,
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    top_k: usize,
) -> Result<Vec<RetrievalResult>> {
    if let Some(stored) = store.embedding_model().await? {
        if stored != embedder.model_name() {
            tracing::warn!(
                stored = %stored,
                query = %embedder.model_name(),
                "store was built with a different embedding model; results may be meaningless"
            );
        }
    }

    let query_vec = embedder.embed(question).await.map_err(|e| match e {
        RagError::Retrieval(_) | RagError::Timeout { .. } | RagError::Config(_) => e,
        other => RagError::retrieval(other),
    })?;

    let results = store.similarity_search(&query_vec, top_k).await?;
    tracing::info!(results = results.len(), top_k, "retrieved");
    Ok(rank(results, top_k))
}

/// Retrieve and filter down to the chunks that will become prompt context.
pub async fn retrieve_context(
    config: &RetrievalConfig,
    question: &str,
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    observer: &dyn QueryObserver,
) -> Result<Vec<RetrievalResult>> {
    let results = retrieve(question, embedder, store, config.top_k).await?;
    let context = select_context(results, config.final_context_size);
    observer.on_retrieved(&context);
    Ok(context)
}

/// Build the prompt from `context` and return the model's answer.
pub async fn generate(
    question: &str,
    context: &[RetrievalResult],
    completer: &dyn Completer,
    observer: &dyn QueryObserver,
) -> Result<QueryOutcome> {
    let prompt = build_prompt(context, question);
    observer.on_prompt(&prompt);

    tracing::debug!(model = completer.model_name(), chunks = context.len(), "asking model");
    let answer = completer.complete(&prompt).await.map_err(|e| match e {
        RagError::Inference(_) | RagError::Timeout { .. } | RagError::Config(_) => e,
        other => RagError::inference(other),
    })?;

    Ok(QueryOutcome::Answered {
        answer,
        sources: context.iter().map(|r| r.source.clone()).collect(),
    })
}

/// Answer `question` with explicit components.
pub async fn ask(
    config: &RetrievalConfig,
    question: &str,
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    completer: &dyn Completer,
    observer: &dyn QueryObserver,
) -> Result<QueryOutcome> {
    let context = retrieve_context(config, question, embedder, store, observer).await?;
    if context.is_empty() {
        return Ok(QueryOutcome::NoResults);
    }
    generate(question, &context, completer, observer).await
}

/// Run a query against the on-disk store and print the outcome.
///
/// The language-model backend is only constructed when there is context to
/// send it.
pub async fn run_query(config: &Config, question: &str, debug: bool) -> Result<QueryOutcome> {
    let embedder = create_embedder(&config.embedding, Stage::Retrieval)?;
    let store = SqliteStore::new(&config.paths.store_dir);
    let observer: Box<dyn QueryObserver> = if debug {
        Box::new(StderrObserver)
    } else {
        Box::new(NoopObserver)
    };

    let context = retrieve_context(
        &config.retrieval,
        question,
        embedder.as_ref(),
        &store,
        observer.as_ref(),
    )
    .await?;

    let outcome = if context.is_empty() {
        QueryOutcome::NoResults
    } else {
        let completer = create_completer(&config.llm)?;
        generate(question, &context, completer.as_ref(), observer.as_ref()).await?
    };

    print!("{}", format_outcome(&outcome));
    Ok(outcome)
}

/// Text printed to stdout for an outcome.
pub fn format_outcome(outcome: &QueryOutcome) -> String {
    match outcome {
        QueryOutcome::NoResults => format!("{}\n", NO_RESULTS_MESSAGE),
        QueryOutcome::Answered { answer, sources } => {
            let mut out = format!("\nResponse:\n{}\n\nSources:\n", answer);
            for source in sources {
                out.push_str(source);
                out.push('\n');
            }
            out
        }
    }
}
