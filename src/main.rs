//! # pdf-rag CLI (`rag`)
//!
//! ## Usage
//!
//! ```bash
//! rag [--config ./rag.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rag ingest` | Rebuild the vector store from every PDF in the data directory |
//! | `rag query "<question>"` | Answer a question from the indexed PDFs |
//!
//! Log verbosity follows `RUST_LOG` (default `warn`); logs go to stderr.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use pdf_rag::{config, ingest, query};

/// Answer questions about a directory of PDFs with a local language model.
#[derive(Parser)]
#[command(
    name = "rag",
    about = "Minimal PDF retrieval-augmented generation",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./rag.toml` when present, otherwise built-in defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the vector store from the PDFs in the data directory.
    ///
    /// The existing store is replaced only after the new one is complete.
    Ingest,

    /// Ask a question against the vector store.
    Query {
        /// The question text.
        question: String,

        /// Print retrieval scores and the full prompt to stderr.
        #[arg(long)]
        debug: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Ingest => {
            ingest::run_ingest(&cfg).await.context("ingest failed")?;
        }
        Commands::Query { question, debug } => {
            query::run_query(&cfg, &question, debug)
                .await
                .context("query failed")?;
        }
    }

    Ok(())
}
