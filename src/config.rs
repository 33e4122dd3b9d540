//! TOML configuration.
//!
//! Every field has a default, so a config file is optional. Components take
//! the relevant section at construction time; nothing reads global state.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{RagError, Result};

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "rag.toml";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub loader: LoaderConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory scanned for PDFs during ingestion.
    pub data_dir: PathBuf,
    /// Directory holding the persistent index; replaced by every ingestion.
    pub store_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("Data"),
            store_dir: PathBuf::from("chroma"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoaderConfig {
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
    pub follow_symlinks: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            include_globs: vec!["**/*.pdf".to_string()],
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Maximum overlap between consecutive chunks, in characters.
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 150,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of nearest records fetched from the store.
    pub top_k: usize,
    /// Number of records kept as prompt context after filtering.
    pub final_context_size: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 20,
            final_context_size: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub url: Option<String>,
    /// Vector size; only read by the `hash` provider.
    pub dims: Option<usize>,
    pub batch_size: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "nomic-embed-text".to_string(),
            url: None,
            dims: None,
            batch_size: 64,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "llama3.2:3b".to_string(),
            url: None,
            timeout_secs: 120,
        }
    }
}

/// Load configuration.
///
/// With an explicit `path` the file must exist. Without one, `./rag.toml`
/// is read when present and the built-in defaults are used otherwise.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(p) => parse_file(p)?,
        None => {
            let fallback = Path::new(DEFAULT_CONFIG_FILE);
            if fallback.is_file() {
                parse_file(fallback)?
            } else {
                Config::default()
            }
        }
    };
    validate(&config)?;
    Ok(config)
}

/// Parse configuration from a TOML string and validate it.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)
        .map_err(|e| RagError::config(format!("failed to parse config: {}", e)))?;
    validate(&config)?;
    Ok(config)
}

fn parse_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        RagError::config(format!(
            "failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;
    toml::from_str(&content).map_err(|e| {
        RagError::config(format!(
            "failed to parse config file {}: {}",
            path.display(),
            e
        ))
    })
}

pub fn validate(config: &Config) -> Result<()> {
    let chunking = &config.chunking;
    if chunking.chunk_size == 0 {
        return Err(RagError::config("chunking.chunk_size must be > 0"));
    }
    if chunking.chunk_overlap >= chunking.chunk_size {
        return Err(RagError::config(format!(
            "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
            chunking.chunk_overlap, chunking.chunk_size
        )));
    }

    if config.retrieval.top_k == 0 {
        return Err(RagError::config("retrieval.top_k must be >= 1"));
    }
    if config.retrieval.final_context_size == 0 {
        return Err(RagError::config("retrieval.final_context_size must be >= 1"));
    }

    if config.loader.include_globs.is_empty() {
        return Err(RagError::config("loader.include_globs must not be empty"));
    }

    let embedding = &config.embedding;
    match embedding.provider.as_str() {
        "ollama" | "openai" | "hash" | "local" => {}
        other => {
            return Err(RagError::config(format!(
                "Unknown embedding provider: '{}'. Must be ollama, openai, hash, or local.",
                other
            )))
        }
    }
    if embedding.model.trim().is_empty() {
        return Err(RagError::config("embedding.model must not be empty"));
    }
    if embedding.dims == Some(0) {
        return Err(RagError::config("embedding.dims must be > 0"));
    }
    if embedding.batch_size == 0 {
        return Err(RagError::config("embedding.batch_size must be > 0"));
    }
    if embedding.timeout_secs == 0 {
        return Err(RagError::config("embedding.timeout_secs must be > 0"));
    }

    match config.llm.provider.as_str() {
        "ollama" | "openai" => {}
        other => {
            return Err(RagError::config(format!(
                "Unknown llm provider: '{}'. Must be ollama or openai.",
                other
            )))
        }
    }
    if config.llm.model.trim().is_empty() {
        return Err(RagError::config("llm.model must not be empty"));
    }
    if config.llm.timeout_secs == 0 {
        return Err(RagError::config("llm.timeout_secs must be > 0"));
    }

    Ok(())
}
