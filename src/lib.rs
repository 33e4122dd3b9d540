//! # pdf-rag
//!
//! A small retrieval-augmented-generation pipeline over a directory of PDFs.
//!
//! Two independent pipelines share a persisted vector store:
//!
//! ```text
//!  ingest:  Data/*.pdf ──▶ loader ──▶ chunk ──▶ embedding ──▶ store (rebuild)
//!
//!  query:   question ──▶ embedding ──▶ store (top-k) ──▶ filter ──▶ prompt ──▶ llm
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rag ingest                                   # rebuild ./chroma from ./Data
//! rag query "What is the capital of Francia?"
//! rag query "..." --debug                      # scores and prompt on stderr
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Stage-tagged error type |
//! | [`models`] | Core data types |
//! | [`extract`] | PDF page text extraction |
//! | [`loader`] | PDF discovery and page loading |
//! | [`chunk`] | Recursive boundary chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Vector store trait, SQLite and in-memory stores |
//! | [`index`] | Full index rebuild |
//! | [`filter`] | Bibliography noise filter |
//! | [`prompt`] | Prompt template rendering |
//! | [`llm`] | Language-model completion backends |
//! | [`observer`] | Query diagnostics hooks |
//! | [`ingest`] | Ingestion pipeline |
//! | [`query`] | Query pipeline |

pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod filter;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod loader;
pub mod models;
pub mod observer;
pub mod prompt;
pub mod query;
pub mod store;
