//! Error types for extraction, embedding, storage, and ingestion.
//!
//! Each layer has its own enum so the retrieval coordinator can decide
//! which failures become `false`/empty results and which reach the caller.

use thiserror::Error;

/// Text extraction failures.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("OCR unavailable: {0}")]
    OcrUnavailable(String),

    /// Every extraction method yielded less text than the threshold.
    #[error("insufficient content: extracted {chars} characters, need at least {threshold}")]
    InsufficientContent { chars: usize, threshold: usize },
}

/// Embedding provider failures.
#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("embedding provider is disabled")]
    Disabled,

    #[error("embedding config error: {0}")]
    Config(String),

    #[error("embedding request failed: {0}")]
    Request(String),

    #[error("embedding inference failed: {0}")]
    Inference(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Vector index failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("texts, metadatas and ids must have equal length (got {texts}, {metadatas}, {ids})")]
    LengthMismatch {
        texts: usize,
        metadatas: usize,
        ids: usize,
    },

    #[error("unsupported filter value for key '{0}'")]
    UnsupportedFilter(String),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbedError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt index snapshot: {0}")]
    Corrupt(String),
}

/// Failures of the extract → chunk → index pipeline.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    #[error("document has insufficient content ({chars} characters, need {threshold})")]
    InsufficientContent { chars: usize, threshold: usize },

    #[error("document {0} could not be indexed")]
    Indexing(String),

    #[error("extraction timed out after {0}s")]
    Timeout(u64),

    #[error("extraction task failed: {0}")]
    Join(String),

    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}
