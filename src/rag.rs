//! Retrieval coordinator.
//!
//! The only component callers talk to for indexing and retrieval. It turns a
//! document's chunks into index entries with deterministic global ids and
//! document-scoped metadata, and it owns the error boundary: backend
//! failures are logged here and surface as `false` or an empty result,
//! never as an error the request path has to handle.
//!
//! ```rust,no_run
//! # async fn demo(index: std::sync::Arc<dyn manual_rag::store::VectorIndex>) {
//! use manual_rag::rag::RetrievalCoordinator;
//!
//! let rag = RetrievalCoordinator::new(index);
//! let context = rag.get_context_for_topic("pump priming", Some(7i64.into()), 3).await;
//! if context.is_empty() {
//!     // no relevant content for this topic
//! }
//! # }
//! ```

use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

use crate::models::{
    global_chunk_id, Chunk, DocumentId, EntryMetadata, IndexEntry, MetadataFilter, SearchResult,
};
use crate::store::VectorIndex;

/// Separator between chunks in a topic context string.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub total_entries: usize,
    pub backend: String,
    pub embedding_model: String,
}

#[derive(Clone)]
pub struct RetrievalCoordinator {
    index: Arc<dyn VectorIndex>,
}

impl RetrievalCoordinator {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Store every chunk of a document. Returns `false` when there is nothing
    /// to index or the backend fails.
    pub async fn index_document(
        &self,
        document_id: impl Into<DocumentId>,
        chunks: &[Chunk],
    ) -> bool {
        let document_id = document_id.into();
        if chunks.is_empty() {
            error!(document_id = %document_id, "Refusing to index document with no chunks");
            return false;
        }

        let mut texts = Vec::with_capacity(chunks.len());
        let mut metadatas = Vec::with_capacity(chunks.len());
        let mut ids = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            texts.push(chunk.text.clone());
            ids.push(global_chunk_id(&document_id, chunk.local_id));
            metadatas.push(
                EntryMetadata {
                    document_id: document_id.to_string(),
                    chunk_id: chunk.local_id,
                    char_count: chunk.char_count,
                }
                .to_metadata(),
            );
        }

        match self.index.add(&texts, &metadatas, &ids).await {
            Ok(()) => {
                info!(document_id = %document_id, chunks = chunks.len(), "Indexed document");
                true
            }
            Err(e) => {
                error!(document_id = %document_id, error = %e, "Error indexing document");
                false
            }
        }
    }

    /// Nearest chunks to `query`, optionally restricted to one document.
    /// Backend failures yield an empty list.
    pub async fn search(
        &self,
        query: &str,
        document_id: Option<DocumentId>,
        top_k: usize,
    ) -> Vec<SearchResult> {
        let filter = document_id.as_ref().map(MetadataFilter::document);
        match self.index.query(query, top_k, filter.as_ref()).await {
            Ok(results) => {
                info!(
                    results = results.len(),
                    query = %truncate(query, 50),
                    "Search finished"
                );
                results
            }
            Err(e) => {
                error!(error = %e, "Error searching");
                Vec::new()
            }
        }
    }

    /// Contents of the best `max_chunks` hits joined by blank lines, in rank
    /// order. Empty means "no relevant content".
    pub async fn get_context_for_topic(
        &self,
        topic: &str,
        document_id: Option<DocumentId>,
        max_chunks: usize,
    ) -> String {
        self.search(topic, document_id, max_chunks)
            .await
            .into_iter()
            .map(|r| r.content)
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR)
    }

    /// Remove every entry of a document. Deleting an unknown document
    /// succeeds.
    pub async fn delete_document(&self, document_id: impl Into<DocumentId>) -> bool {
        let document_id = document_id.into();
        match self.index.delete_by(&MetadataFilter::document(&document_id)).await {
            Ok(removed) => {
                info!(document_id = %document_id, removed, "Deleted chunks for document");
                true
            }
            Err(e) => {
                error!(document_id = %document_id, error = %e, "Error deleting document");
                false
            }
        }
    }

    /// Delete then index, so chunks that no longer exist do not linger.
    pub async fn reindex_document(
        &self,
        document_id: impl Into<DocumentId>,
        chunks: &[Chunk],
    ) -> bool {
        let document_id = document_id.into();
        if !self.delete_document(&document_id).await {
            return false;
        }
        self.index_document(document_id, chunks).await
    }

    pub async fn list_entries(&self, limit: usize) -> Vec<IndexEntry> {
        match self.index.list(limit).await {
            Ok(entries) => entries,
            Err(e) => {
                error!(error = %e, "Error listing index entries");
                Vec::new()
            }
        }
    }

    /// Drop the whole collection.
    pub async fn reset(&self) -> bool {
        match self.index.reset().await {
            Ok(()) => {
                info!("Vector index reset");
                true
            }
            Err(e) => {
                error!(error = %e, "Error resetting index");
                false
            }
        }
    }

    pub async fn stats(&self) -> IndexStats {
        let total_entries = self.index.size().await.unwrap_or_else(|e| {
            error!(error = %e, "Error reading index size");
            0
        });
        IndexStats {
            total_entries,
            backend: self.index.backend_name().to_string(),
            embedding_model: self.index.embedding_model().to_string(),
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}
