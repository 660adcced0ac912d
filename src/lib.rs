//! # Manual RAG
//!
//! Ingestion and retrieval core for manual-style documents: digital or
//! scanned PDFs in, topic-scoped context strings out.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────┐   ┌──────────────────────┐
//! │ Extraction  │──▶│ Chunker  │──▶│ Retrieval Coordinator│
//! │ text + OCR  │   │ para+ovl │   │  index / search /    │
//! └─────────────┘   └──────────┘   │  context / delete    │
//!                                  └──────────┬───────────┘
//!                                             ▼
//!                                  ┌──────────────────────┐
//!                                  │ VectorIndex          │
//!                                  │ sqlite  │  memory    │
//!                                  └──────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! mrag index 7 ./uploads/pump-manual.pdf
//! mrag context "priming the pump" --document 7
//! mrag delete 7
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types and the indexing state machine |
//! | [`error`] | Typed errors per layer |
//! | [`extract`] | Text layer extraction with OCR fallback |
//! | [`chunk`] | Paragraph chunking with overlap |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Vector index contract and backends |
//! | [`rag`] | Retrieval coordinator |
//! | [`ingest`] | Extract → chunk → index pipeline |
//! | [`db`] | SQLite connection |
//! | [`migrate`] | Schema setup |

pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod rag;
pub mod store;
