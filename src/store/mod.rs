//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait is the one contract the retrieval coordinator
//! talks to. Two backends implement it:
//!
//! | Backend | Module | Persistence |
//! |---------|--------|-------------|
//! | SQLite  | [`sqlite`] | rows in `vector_index.sqlite`, upserted per entry |
//! | In-process | [`memory`] | whole collection rewritten to `vector_index.json` on every mutation |
//!
//! Both compute embeddings through an injected
//! [`EmbeddingProvider`](crate::embedding::EmbeddingProvider), rank by cosine
//! distance (lower = more similar), and upsert on id collision.

pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use anyhow::Result as AnyResult;
use async_trait::async_trait;

use crate::config::{StoreBackend, StoreConfig};
use crate::embedding::EmbeddingProvider;
use crate::error::StoreError;
use crate::models::{IndexEntry, Metadata, MetadataFilter, SearchResult};

pub use memory::InMemoryIndex;
pub use sqlite::SqliteIndex;

/// Abstract similarity-search store.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`add`](VectorIndex::add) | Embed and store (text, metadata, id) tuples |
/// | [`query`](VectorIndex::query) | Nearest neighbours, optionally filtered |
/// | [`delete_by`](VectorIndex::delete_by) | Remove every entry matching a filter |
/// | [`size`](VectorIndex::size) | Number of stored entries |
/// | [`list`](VectorIndex::list) | Inspect stored entries |
/// | [`reset`](VectorIndex::reset) | Drop the whole collection |
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Short backend name for logs and stats.
    fn backend_name(&self) -> &str;

    /// Model used to embed stored text.
    fn embedding_model(&self) -> &str;

    /// Store entries. The three slices must have equal length; an existing id
    /// is overwritten.
    async fn add(
        &self,
        texts: &[String],
        metadatas: &[Metadata],
        ids: &[String],
    ) -> Result<(), StoreError>;

    /// Up to `top_k` entries by ascending distance. Empty (not an error) when
    /// the collection or the filtered subset is empty.
    async fn query(
        &self,
        text: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>, StoreError>;

    /// Remove all entries matching `filter`. Returns the number removed;
    /// matching nothing is not an error.
    async fn delete_by(&self, filter: &MetadataFilter) -> Result<usize, StoreError>;

    async fn size(&self) -> Result<usize, StoreError>;

    /// Up to `limit` stored entries ordered by id.
    async fn list(&self, limit: usize) -> Result<Vec<IndexEntry>, StoreError>;

    async fn reset(&self) -> Result<(), StoreError>;
}

/// Build the configured backend rooted at `config.path`.
pub async fn open_index(
    config: &StoreConfig,
    provider: Arc<dyn EmbeddingProvider>,
) -> AnyResult<Arc<dyn VectorIndex>> {
    let index: Arc<dyn VectorIndex> = match config.backend {
        StoreBackend::Sqlite => Arc::new(SqliteIndex::open(&config.path, provider).await?),
        StoreBackend::Memory => Arc::new(InMemoryIndex::open(&config.path, provider).await?),
    };
    tracing::info!(
        backend = index.backend_name(),
        path = %config.path.display(),
        "Vector index opened"
    );
    Ok(index)
}

/// Decode bytes as UTF-8, replacing invalid sequences with U+FFFD.
pub fn decode_lossy(bytes: &[u8]) -> String {
    sanitize_text(&String::from_utf8_lossy(bytes))
}

/// Normalise text before storage: drop NUL and other control characters
/// except newline, carriage return and tab.
pub fn sanitize_text(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
        .collect()
}

/// Check the `add` precondition shared by every backend.
pub(crate) fn check_lengths(
    texts: &[String],
    metadatas: &[Metadata],
    ids: &[String],
) -> Result<(), StoreError> {
    if texts.len() != metadatas.len() || texts.len() != ids.len() {
        return Err(StoreError::LengthMismatch {
            texts: texts.len(),
            metadatas: metadatas.len(),
            ids: ids.len(),
        });
    }
    Ok(())
}

/// Cosine distance in `[0, 2]`: `1 - cos(a, b)`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - crate::embedding::cosine_similarity(a, b)
}

/// Sort by ascending score and keep the first `top_k`.
pub(crate) fn rank(mut results: Vec<SearchResult>, top_k: usize) -> Vec<SearchResult> {
    results.sort_by(|a, b| {
        a.score
            .partial_cmp(&b.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results.truncate(top_k);
    results
}
