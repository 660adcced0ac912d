//! # Manual RAG CLI (`mrag`)
//!
//! Command-line front end for the ingestion and retrieval core.
//!
//! ## Usage
//!
//! ```bash
//! mrag --config ./config/mrag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mrag extract <path>` | Print the extracted text of a document |
//! | `mrag index <id> <path>` | Extract, chunk and index a document |
//! | `mrag search "<query>"` | Ranked chunks for a query |
//! | `mrag context "<topic>"` | Context string for content generation |
//! | `mrag delete <id>` | Remove a document's chunks |
//! | `mrag list` | Show stored entries |
//! | `mrag stats` | Entry count, backend and embedding model |
//! | `mrag reset` | Drop the whole collection |
//!
//! Results go to stdout; logs go to stderr (`RUST_LOG` overrides the
//! default `manual_rag=info` filter).

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use manual_rag::config::{self, Config};
use manual_rag::embedding::create_provider;
use manual_rag::extract::Extractor;
use manual_rag::ingest::Ingestor;
use manual_rag::models::{DocumentId, IndexStatus, SourceDocument};
use manual_rag::rag::RetrievalCoordinator;
use manual_rag::store::open_index;

/// Manual RAG: document ingestion and topic retrieval.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means built-in defaults.
#[derive(Parser)]
#[command(
    name = "mrag",
    about = "Manual RAG: document ingestion and topic retrieval",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/mrag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the text extracted from a document.
    ///
    /// Uses the configured extraction mode, including OCR fallback for
    /// scanned PDFs. `--from`/`--to` print a zero-based page range of the
    /// text layer instead.
    Extract {
        path: PathBuf,

        #[arg(long)]
        from: Option<u32>,

        #[arg(long)]
        to: Option<u32>,
    },

    /// Extract, chunk and index a document.
    Index {
        /// Document identifier (integer or string).
        document_id: String,

        path: PathBuf,

        /// Delete the document's existing chunks first.
        #[arg(long)]
        reindex: bool,
    },

    /// Search indexed chunks.
    Search {
        query: String,

        /// Restrict results to one document.
        #[arg(long)]
        document: Option<String>,

        /// Number of results (defaults to `retrieval.top_k`).
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Print the context string for a topic.
    Context {
        topic: String,

        #[arg(long)]
        document: Option<String>,

        /// Number of chunks (defaults to `retrieval.max_context_chunks`).
        #[arg(long)]
        max_chunks: Option<usize>,
    },

    /// Remove every chunk of a document.
    Delete { document_id: String },

    /// List stored entries.
    List {
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Show index statistics.
    Stats,

    /// Drop every entry in the index.
    Reset,
}

async fn open_coordinator(cfg: &Config) -> Result<RetrievalCoordinator> {
    let provider = create_provider(&cfg.embedding)?;
    let index = open_index(&cfg.store, provider).await?;
    Ok(RetrievalCoordinator::new(index))
}

fn run_extract(cfg: &Config, path: &Path, from: Option<u32>, to: Option<u32>) -> Result<()> {
    let extractor = Extractor::new(&cfg.extraction);
    if from.is_some() || to.is_some() {
        let text = extractor.extract_page_range(path, from.unwrap_or(0), to.unwrap_or(u32::MAX))?;
        println!("{}", text);
        return Ok(());
    }

    let extraction = extractor.extract_detailed(path);
    eprintln!(
        "method: {}  pages: {}  chars: {}",
        extraction.method.as_str(),
        extraction
            .page_count
            .map_or_else(|| "?".to_string(), |n| n.to_string()),
        extraction.char_count()
    );
    println!("{}", extraction.text);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("manual_rag=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Extract { path, from, to } => {
            run_extract(&cfg, &path, from, to)?;
        }
        Commands::Index {
            document_id,
            path,
            reindex,
        } => {
            let coordinator = open_coordinator(&cfg).await?;
            let ingestor = Ingestor::new(
                Extractor::new(&cfg.extraction),
                cfg.chunking.clone(),
                coordinator,
            );
            let current = if reindex {
                IndexStatus::Indexed
            } else {
                IndexStatus::Unindexed
            };
            let doc = SourceDocument::new(document_id, path);
            let report = ingestor.ingest(&doc, &current).await?;

            println!("index {}", report.document_id);
            println!("  status: {}", report.status.name());
            println!("  method: {}", report.method.unwrap_or("-"));
            println!("  chars: {}", report.chars);
            println!("  chunks: {}", report.chunks);
            if let Some(err) = report.error {
                bail!("document could not be indexed: {}", err);
            }
            println!("ok");
        }
        Commands::Search {
            query,
            document,
            top_k,
        } => {
            let coordinator = open_coordinator(&cfg).await?;
            let results = coordinator
                .search(
                    &query,
                    document.map(DocumentId::from),
                    top_k.unwrap_or(cfg.retrieval.top_k),
                )
                .await;
            if results.is_empty() {
                println!("No results.");
            }
            for (i, r) in results.iter().enumerate() {
                println!(
                    "{}. [{:.4}] document={} chunk={}",
                    i + 1,
                    r.score,
                    r.document_id().unwrap_or("?"),
                    r.metadata
                        .get("chunk_id")
                        .map_or_else(|| "?".to_string(), |v| v.to_string())
                );
                let snippet: String = r.content.chars().take(240).collect();
                println!("    {}", snippet.replace('\n', " "));
            }
        }
        Commands::Context {
            topic,
            document,
            max_chunks,
        } => {
            let coordinator = open_coordinator(&cfg).await?;
            let context = coordinator
                .get_context_for_topic(
                    &topic,
                    document.map(DocumentId::from),
                    max_chunks.unwrap_or(cfg.retrieval.max_context_chunks),
                )
                .await;
            println!("{}", context);
        }
        Commands::Delete { document_id } => {
            let coordinator = open_coordinator(&cfg).await?;
            if !coordinator.delete_document(document_id.as_str()).await {
                bail!("failed to delete document {}", document_id);
            }
            println!("deleted {}", document_id);
        }
        Commands::List { limit } => {
            let coordinator = open_coordinator(&cfg).await?;
            for entry in coordinator.list_entries(limit).await {
                let preview: String = entry.text.chars().take(80).collect();
                println!("{}\t{}", entry.id, preview.replace('\n', " "));
            }
        }
        Commands::Stats => {
            let coordinator = open_coordinator(&cfg).await?;
            let stats = coordinator.stats().await;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::Reset => {
            let coordinator = open_coordinator(&cfg).await?;
            if !coordinator.reset().await {
                bail!("failed to reset index");
            }
            println!("Vector index reset.");
        }
    }

    Ok(())
}
