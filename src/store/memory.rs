//! In-process vector index with a flat JSON snapshot.
//!
//! All entries and their embeddings live in memory behind a
//! [`tokio::sync::RwLock`]. Every mutation rewrites the whole collection to
//! `<dir>/vector_index.json`:
//!
//! ```json
//! {
//!   "documents":  [ { "id": "...", "text": "...", "metadata": { ... } }, ... ],
//!   "embeddings": [ [0.12, -0.03, ...], ... ]
//! }
//! ```
//!
//! The two arrays are parallel. The file is written to a temporary sibling
//! and renamed into place, so a crash leaves either the old or the new
//! snapshot. A mutation is applied to a copy of the collection and only
//! becomes visible once that copy is on disk, so a failed write changes
//! nothing. Writes are serialised by the lock; only one process may own the
//! directory at a time.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::{check_lengths, cosine_distance, rank, sanitize_text, VectorIndex};
use crate::embedding::{check_dims, embed_batched, EmbeddingProvider};
use crate::error::StoreError;
use crate::models::{IndexEntry, Metadata, MetadataFilter, SearchResult};

/// Snapshot file name inside the persistence directory.
pub const SNAPSHOT_FILE: &str = "vector_index.json";

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Snapshot {
    documents: Vec<IndexEntry>,
    embeddings: Vec<Vec<f32>>,
}

impl Snapshot {
    fn position(&self, id: &str) -> Option<usize> {
        self.documents.iter().position(|d| d.id == id)
    }

    fn upsert(&mut self, entry: IndexEntry, embedding: Vec<f32>) {
        match self.position(&entry.id) {
            Some(i) => {
                self.documents[i] = entry;
                self.embeddings[i] = embedding;
            }
            None => {
                self.documents.push(entry);
                self.embeddings.push(embedding);
            }
        }
    }
}

pub struct InMemoryIndex {
    path: PathBuf,
    provider: Arc<dyn EmbeddingProvider>,
    state: RwLock<Snapshot>,
}

impl InMemoryIndex {
    /// Open the index rooted at `dir`, loading an existing snapshot if present.
    pub async fn open(dir: &Path, provider: Arc<dyn EmbeddingProvider>) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(SNAPSHOT_FILE);

        let snapshot = if path.exists() {
            let bytes = tokio::fs::read(&path).await?;
            let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
            if snapshot.documents.len() != snapshot.embeddings.len() {
                return Err(StoreError::Corrupt(format!(
                    "{} has {} documents but {} embeddings",
                    path.display(),
                    snapshot.documents.len(),
                    snapshot.embeddings.len()
                )));
            }
            debug!(entries = snapshot.documents.len(), "Loaded index snapshot");
            snapshot
        } else {
            Snapshot::default()
        };

        Ok(Self {
            path,
            provider,
            state: RwLock::new(snapshot),
        })
    }

    /// Location of the snapshot file.
    pub fn snapshot_path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| StoreError::Corrupt("snapshot path has no parent".to_string()))?;
        let bytes = serde_json::to_vec(snapshot)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn backend_name(&self) -> &str {
        "memory"
    }

    fn embedding_model(&self) -> &str {
        self.provider.model_name()
    }

    async fn add(
        &self,
        texts: &[String],
        metadatas: &[Metadata],
        ids: &[String],
    ) -> Result<(), StoreError> {
        check_lengths(texts, metadatas, ids)?;
        if texts.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = texts.iter().map(|t| sanitize_text(t)).collect();
        let embeddings = embed_batched(self.provider.as_ref(), &texts).await?;

        let mut state = self.state.write().await;
        let mut next = state.clone();
        for (((text, metadata), id), embedding) in texts
            .into_iter()
            .zip(metadatas)
            .zip(ids)
            .zip(embeddings)
        {
            next.upsert(
                IndexEntry {
                    id: id.clone(),
                    text,
                    metadata: metadata.clone(),
                },
                embedding,
            );
        }
        self.persist(&next)?;
        *state = next;
        debug!(added = ids.len(), total = state.documents.len(), "Snapshot updated");
        Ok(())
    }

    async fn query(
        &self,
        text: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>, StoreError> {
        if top_k == 0 || self.state.read().await.documents.is_empty() {
            return Ok(Vec::new());
        }

        // No lock is held while embedding.
        let query_vec = self.provider.embed_query(text).await?;
        check_dims(&query_vec, self.provider.dims())?;

        let state = self.state.read().await;
        let mut results = Vec::new();
        for (doc, embedding) in state.documents.iter().zip(&state.embeddings) {
            if !filter.map_or(true, |f| f.matches(&doc.metadata)) {
                continue;
            }
            check_dims(embedding, query_vec.len())?;
            results.push(SearchResult {
                content: doc.text.clone(),
                metadata: doc.metadata.clone(),
                score: cosine_distance(&query_vec, embedding),
            });
        }

        Ok(rank(results, top_k))
    }

    async fn delete_by(&self, filter: &MetadataFilter) -> Result<usize, StoreError> {
        let mut state = self.state.write().await;
        let (documents, embeddings): (Vec<_>, Vec<_>) = state
            .documents
            .iter()
            .zip(&state.embeddings)
            .filter(|(doc, _)| !filter.matches(&doc.metadata))
            .map(|(doc, embedding)| (doc.clone(), embedding.clone()))
            .unzip();

        let removed = state.documents.len() - documents.len();
        if removed > 0 {
            let next = Snapshot {
                documents,
                embeddings,
            };
            self.persist(&next)?;
            *state = next;
        }
        Ok(removed)
    }

    async fn size(&self) -> Result<usize, StoreError> {
        Ok(self.state.read().await.documents.len())
    }

    async fn list(&self, limit: usize) -> Result<Vec<IndexEntry>, StoreError> {
        let state = self.state.read().await;
        let mut entries = state.documents.clone();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn reset(&self) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let next = Snapshot::default();
        self.persist(&next)?;
        *state = next;
        Ok(())
    }
}
