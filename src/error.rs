//! Error type shared by both pipelines.
//!
//! Each variant names the stage that failed so the CLI can report where a
//! run stopped. Every error is fatal to the current invocation; nothing is
//! retried.

use std::fmt;

use thiserror::Error;

/// Pipeline stage, used to label timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ingestion,
    Indexing,
    Retrieval,
    Inference,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Ingestion => "ingestion",
            Stage::Indexing => "indexing",
            Stage::Retrieval => "retrieval",
            Stage::Inference => "inference",
        };
        f.write_str(name)
    }
}

/// Top-level error for ingestion and query runs.
#[derive(Debug, Error)]
pub enum RagError {
    /// Bad or missing data directory, or a PDF that could not be extracted.
    #[error("ingestion error: {0}")]
    Ingestion(String),

    /// Embedding or storage failure while rebuilding the store.
    #[error("indexing error: {0}")]
    Indexing(String),

    /// Store read failure or query embedding failure.
    #[error("retrieval error: {0}")]
    Retrieval(String),

    /// Language-model backend unreachable or rejected the prompt.
    #[error("inference error: {0}")]
    Inference(String),

    /// Invalid configuration or missing credentials.
    #[error("config error: {0}")]
    Config(String),

    /// An external call exceeded its deadline.
    #[error("{stage} timed out: {detail}")]
    Timeout { stage: Stage, detail: String },
}

impl RagError {
    pub fn ingestion(e: impl fmt::Display) -> Self {
        RagError::Ingestion(e.to_string())
    }

    pub fn indexing(e: impl fmt::Display) -> Self {
        RagError::Indexing(e.to_string())
    }

    pub fn retrieval(e: impl fmt::Display) -> Self {
        RagError::Retrieval(e.to_string())
    }

    pub fn inference(e: impl fmt::Display) -> Self {
        RagError::Inference(e.to_string())
    }

    pub fn config(e: impl fmt::Display) -> Self {
        RagError::Config(e.to_string())
    }

    /// Wrap an error raised at `stage`.
    pub fn at(stage: Stage, e: impl fmt::Display) -> Self {
        match stage {
            Stage::Ingestion => RagError::ingestion(e),
            Stage::Indexing => RagError::indexing(e),
            Stage::Retrieval => RagError::retrieval(e),
            Stage::Inference => RagError::inference(e),
        }
    }

    /// Map an HTTP client error, turning deadline expiry into [`RagError::Timeout`].
    pub fn from_http(stage: Stage, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RagError::Timeout {
                stage,
                detail: e.to_string(),
            }
        } else {
            RagError::at(stage, e)
        }
    }

    /// The stage this error belongs to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            RagError::Ingestion(_) => Some(Stage::Ingestion),
            RagError::Indexing(_) => Some(Stage::Indexing),
            RagError::Retrieval(_) => Some(Stage::Retrieval),
            RagError::Inference(_) => Some(Stage::Inference),
            RagError::Config(_) => None,
            RagError::Timeout { stage, .. } => Some(*stage),
        }
    }
}

pub type Result<T> = std::result::Result<T, RagError>;
