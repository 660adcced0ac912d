//! Core data models used throughout the ingestion and retrieval pipeline.
//!
//! These types represent the source documents, chunks, index entries, and
//! search results that flow from extraction to the context string handed to
//! content generation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Arbitrary JSON metadata attached to an index entry.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Externally-assigned document identifier (integer or string).
///
/// Stored in index metadata as a string, so `7` and `"7"` name the same
/// document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for DocumentId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<u32> for DocumentId {
    fn from(id: u32) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&DocumentId> for DocumentId {
    fn from(id: &DocumentId) -> Self {
        id.clone()
    }
}

/// A source file submitted for ingestion. Owned by the external
/// persistence layer; this crate only reads it.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub id: DocumentId,
    pub path: PathBuf,
    pub page_count: Option<u32>,
}

impl SourceDocument {
    pub fn new(id: impl Into<DocumentId>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            page_count: None,
        }
    }
}

/// A bounded slice of a document's extracted text.
///
/// `local_id` is sequential within one document starting at 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub local_id: usize,
    pub text: String,
    pub char_count: usize,
}

/// Metadata the coordinator attaches to every indexed chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub document_id: String,
    pub chunk_id: usize,
    pub char_count: usize,
}

impl EntryMetadata {
    pub fn to_metadata(&self) -> Metadata {
        let mut map = Metadata::new();
        map.insert(
            "document_id".to_string(),
            serde_json::Value::String(self.document_id.clone()),
        );
        map.insert("chunk_id".to_string(), self.chunk_id.into());
        map.insert("char_count".to_string(), self.char_count.into());
        map
    }
}

/// Deterministic global id for a chunk: `doc_<document_id>_chunk_<local_id>`.
pub fn global_chunk_id(document_id: &DocumentId, local_id: usize) -> String {
    format!("doc_{}_chunk_{}", document_id, local_id)
}

/// A stored (text, metadata, id) tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
}

/// A ranked query hit. `score` is a cosine distance: lower is more similar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub content: String,
    pub metadata: Metadata,
    pub score: f32,
}

impl SearchResult {
    pub fn document_id(&self) -> Option<&str> {
        self.metadata.get("document_id").and_then(|v| v.as_str())
    }
}

/// Key/value constraints an entry's metadata must satisfy, all of them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFilter {
    constraints: Metadata,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter restricting results to one document.
    pub fn document(id: &DocumentId) -> Self {
        Self::new().with("document_id", id.as_str())
    }

    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.constraints.insert(key.to_string(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.constraints.iter()
    }

    /// An empty filter matches everything.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.constraints
            .iter()
            .all(|(key, value)| metadata.get(key) == Some(value))
    }
}

/// Why a document ended in [`IndexStatus::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    InsufficientContent,
    ExtractionFailed,
    ExtractionTimedOut,
    IndexingFailed,
}

/// Indexing lifecycle of a document, kept by the caller.
///
/// ```text
/// Unindexed ──▶ Indexing ──▶ Indexed
///                  │
///                  └──────▶ Failed ──(re-submit)──▶ Indexing
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum IndexStatus {
    Unindexed,
    Indexing,
    Indexed,
    Failed(FailureReason),
}

impl IndexStatus {
    pub fn name(&self) -> &'static str {
        match self {
            IndexStatus::Unindexed => "unindexed",
            IndexStatus::Indexing => "indexing",
            IndexStatus::Indexed => "indexed",
            IndexStatus::Failed(_) => "failed",
        }
    }

    /// Enter `Indexing`. Allowed from `Unindexed`, from `Failed` (explicit
    /// re-submit), and from `Indexed` (reindex).
    pub fn start(&self) -> Result<IndexStatus, crate::error::IngestError> {
        match self {
            IndexStatus::Unindexed | IndexStatus::Failed(_) | IndexStatus::Indexed => {
                Ok(IndexStatus::Indexing)
            }
            IndexStatus::Indexing => Err(self.invalid("indexing")),
        }
    }

    pub fn succeed(&self) -> Result<IndexStatus, crate::error::IngestError> {
        match self {
            IndexStatus::Indexing => Ok(IndexStatus::Indexed),
            _ => Err(self.invalid("indexed")),
        }
    }

    pub fn fail(&self, reason: FailureReason) -> Result<IndexStatus, crate::error::IngestError> {
        match self {
            IndexStatus::Indexing => Ok(IndexStatus::Failed(reason)),
            _ => Err(self.invalid("failed")),
        }
    }

    /// Value for the persisted `indexed` flag.
    pub fn is_indexed(&self) -> bool {
        matches!(self, IndexStatus::Indexed)
    }

    fn invalid(&self, to: &str) -> crate::error::IngestError {
        crate::error::IngestError::InvalidTransition {
            from: self.name().to_string(),
            to: to.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn global_id_format() {
        assert_eq!(global_chunk_id(&DocumentId::from(7i64), 0), "doc_7_chunk_0");
        assert_eq!(
            global_chunk_id(&DocumentId::from("abc"), 12),
            "doc_abc_chunk_12"
        );
    }

    #[test]
    fn entry_metadata_shape() {
        let meta = EntryMetadata {
            document_id: "7".to_string(),
            chunk_id: 2,
            char_count: 120,
        }
        .to_metadata();
        assert_eq!(meta.get("document_id"), Some(&json!("7")));
        assert_eq!(meta.get("chunk_id"), Some(&json!(2)));
        assert_eq!(meta.get("char_count"), Some(&json!(120)));
    }

    #[test]
    fn filter_requires_every_constraint() {
        let meta = EntryMetadata {
            document_id: "7".to_string(),
            chunk_id: 1,
            char_count: 10,
        }
        .to_metadata();

        assert!(MetadataFilter::new().matches(&meta));
        assert!(MetadataFilter::document(&DocumentId::from(7i64)).matches(&meta));
        assert!(!MetadataFilter::document(&DocumentId::from(8i64)).matches(&meta));
        assert!(!MetadataFilter::document(&DocumentId::from(7i64))
            .with("chunk_id", 2)
            .matches(&meta));
    }

    #[test]
    fn status_happy_path() {
        let status = IndexStatus::Unindexed.start().unwrap();
        assert_eq!(status, IndexStatus::Indexing);
        let status = status.succeed().unwrap();
        assert!(status.is_indexed());
    }

    #[test]
    fn status_failure_and_resubmit() {
        let failed = IndexStatus::Unindexed
            .start()
            .unwrap()
            .fail(FailureReason::IndexingFailed)
            .unwrap();
        assert!(!failed.is_indexed());
        assert_eq!(failed.start().unwrap(), IndexStatus::Indexing);
    }

    #[test]
    fn status_rejects_skipping_indexing() {
        assert!(IndexStatus::Unindexed.succeed().is_err());
        assert!(IndexStatus::Unindexed
            .fail(FailureReason::ExtractionFailed)
            .is_err());
        assert!(IndexStatus::Indexing.start().is_err());
    }
}
