//! Disk-backed vector index on SQLite.
//!
//! Entries live in the `index_entries` table of `<dir>/vector_index.sqlite`,
//! one row per id with the embedding stored as a little-endian `f32` BLOB.
//! Metadata filters are pushed into SQL: `document_id` through its indexed
//! column, every other key via `json_extract`. Similarity is computed in
//! Rust over the filtered rows.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqlitePool;
use sqlx::{QueryBuilder, Row, Sqlite};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use super::{check_lengths, cosine_distance, rank, sanitize_text, VectorIndex};
use crate::embedding::{blob_to_vec, check_dims, embed_batched, vec_to_blob, EmbeddingProvider};
use crate::error::{EmbedError, StoreError};
use crate::models::{IndexEntry, Metadata, MetadataFilter, SearchResult};
use crate::{db, migrate};

/// Database file name inside the persistence directory.
pub const DATABASE_FILE: &str = "vector_index.sqlite";

pub struct SqliteIndex {
    pool: SqlitePool,
    provider: Arc<dyn EmbeddingProvider>,
}

impl SqliteIndex {
    /// Open (or create) the index rooted at `dir` and apply the schema.
    pub async fn open(dir: &Path, provider: Arc<dyn EmbeddingProvider>) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir)?;
        let pool = db::connect(&dir.join(DATABASE_FILE)).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self { pool, provider })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// `document_id` column value, denormalised from the metadata map.
fn document_id_of(metadata: &Metadata) -> Option<String> {
    match metadata.get("document_id")? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Append `WHERE json_extract(...) = ? AND ...` for every constraint.
///
/// A string `document_id` is matched on the `document_id` column. Only
/// scalar values can be matched; arrays and objects are rejected before
/// anything is executed.
fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &MetadataFilter) -> Result<(), StoreError> {
    for (i, (key, value)) in filter.iter().enumerate() {
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        if let ("document_id", Value::String(id)) = (key.as_str(), value) {
            qb.push("document_id = ").push_bind(id.clone());
            continue;
        }
        qb.push("json_extract(metadata_json, ")
            .push_bind(format!("$.\"{}\"", key.replace('"', "\\\"")))
            .push(")");
        match value {
            Value::Null => {
                qb.push(" IS NULL");
            }
            Value::String(s) => {
                qb.push(" = ").push_bind(s.clone());
            }
            Value::Bool(b) => {
                qb.push(" = ").push_bind(i64::from(*b));
            }
            Value::Number(n) => {
                if let Some(int) = n.as_i64() {
                    qb.push(" = ").push_bind(int);
                } else if let Some(float) = n.as_f64() {
                    qb.push(" = ").push_bind(float);
                } else {
                    return Err(StoreError::UnsupportedFilter(key.clone()));
                }
            }
            Value::Array(_) | Value::Object(_) => {
                return Err(StoreError::UnsupportedFilter(key.clone()));
            }
        }
    }
    Ok(())
}

fn parse_metadata(raw: &str) -> Result<Metadata, StoreError> {
    Ok(serde_json::from_str(raw)?)
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    fn backend_name(&self) -> &str {
        "sqlite"
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

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;
        for (((text, metadata), id), embedding) in
            texts.iter().zip(metadatas).zip(ids).zip(&embeddings)
        {
            sqlx::query(
                r#"
                INSERT INTO index_entries (id, document_id, text, metadata_json, embedding, dims, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    document_id = excluded.document_id,
                    text = excluded.text,
                    metadata_json = excluded.metadata_json,
                    embedding = excluded.embedding,
                    dims = excluded.dims
                "#,
            )
            .bind(id)
            .bind(document_id_of(metadata))
            .bind(text)
            .bind(serde_json::to_string(metadata)?)
            .bind(vec_to_blob(embedding))
            .bind(embedding.len() as i64)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        debug!(added = ids.len(), "Upserted index entries");
        Ok(())
    }

    async fn query(
        &self,
        text: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>, StoreError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT text, metadata_json, embedding, dims FROM index_entries",
        );
        if let Some(filter) = filter {
            push_filter(&mut qb, filter)?;
        }
        let rows = qb.build().fetch_all(&self.pool).await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let query_vec = self.provider.embed_query(text).await?;
        check_dims(&query_vec, self.provider.dims())?;

        // Fetch all candidate vectors and compute cosine distance in Rust
        let mut results = Vec::with_capacity(rows.len());
        for row in &rows {
            let dims: i64 = row.try_get("dims")?;
            if dims as usize != query_vec.len() {
                return Err(EmbedError::DimensionMismatch {
                    expected: query_vec.len(),
                    actual: dims as usize,
                }
                .into());
            }
            let blob: Vec<u8> = row.try_get("embedding")?;
            let metadata_json: String = row.try_get("metadata_json")?;
            results.push(SearchResult {
                content: row.try_get("text")?,
                metadata: parse_metadata(&metadata_json)?,
                score: cosine_distance(&query_vec, &blob_to_vec(&blob)),
            });
        }

        Ok(rank(results, top_k))
    }

    async fn delete_by(&self, filter: &MetadataFilter) -> Result<usize, StoreError> {
        let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM index_entries");
        push_filter(&mut qb, filter)?;
        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected() as usize)
    }

    async fn size(&self) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM index_entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn list(&self, limit: usize) -> Result<Vec<IndexEntry>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, text, metadata_json FROM index_entries ORDER BY id LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let metadata_json: String = row.try_get("metadata_json")?;
                Ok(IndexEntry {
                    id: row.try_get("id")?,
                    text: row.try_get("text")?,
                    metadata: parse_metadata(&metadata_json)?,
                })
            })
            .collect()
    }

    async fn reset(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM index_entries")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingProvider;
    use crate::models::DocumentId;
    use async_trait::async_trait;
    use serde_json::json;
    use tempfile::TempDir;

    async fn open(tmp: &TempDir) -> SqliteIndex {
        SqliteIndex::open(tmp.path(), Arc::new(HashingProvider::new(128)))
            .await
            .unwrap()
    }

    fn meta(doc: &str, chunk: usize) -> Metadata {
        let mut m = Metadata::new();
        m.insert("document_id".to_string(), json!(doc));
        m.insert("chunk_id".to_string(), json!(chunk));
        m
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn add_and_query_ranks_by_distance() {
        let tmp = TempDir::new().unwrap();
        let index = open(&tmp).await;
        index
            .add(
                &strings(&[
                    "glaciers carve valleys over millennia",
                    "markets react to interest rates",
                ]),
                &[meta("1", 0), meta("2", 0)],
                &strings(&["doc_1_chunk_0", "doc_2_chunk_0"]),
            )
            .await
            .unwrap();

        let hits = index.query("glaciers valleys", 2, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].document_id(), Some("1"));
        assert!(hits[0].score <= hits[1].score);
    }

    #[tokio::test]
    async fn filter_by_string_and_integer() {
        let tmp = TempDir::new().unwrap();
        let index = open(&tmp).await;
        index
            .add(
                &strings(&["a0", "a1", "b0"]),
                &[meta("1", 0), meta("1", 1), meta("2", 0)],
                &strings(&["x", "y", "z"]),
            )
            .await
            .unwrap();

        let only_doc_1 = MetadataFilter::new().with("document_id", "1");
        let hits = index.query("a0", 10, Some(&only_doc_1)).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.document_id() == Some("1")));

        let chunk_1 = MetadataFilter::new().with("chunk_id", 1);
        let hits = index.query("a1", 10, Some(&chunk_1)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "a1");
    }

    #[tokio::test]
    async fn upsert_replaces_existing_row() {
        let tmp = TempDir::new().unwrap();
        let index = open(&tmp).await;
        for text in ["old text", "new text"] {
            index
                .add(&strings(&[text]), &[meta("1", 0)], &strings(&["same"]))
                .await
                .unwrap();
        }
        assert_eq!(index.size().await.unwrap(), 1);
        assert_eq!(index.list(5).await.unwrap()[0].text, "new text");
    }

    #[tokio::test]
    async fn delete_by_counts_removed_rows() {
        let tmp = TempDir::new().unwrap();
        let index = open(&tmp).await;
        index
            .add(
                &strings(&["a", "b", "c"]),
                &[meta("1", 0), meta("1", 1), meta("2", 0)],
                &strings(&["a", "b", "c"]),
            )
            .await
            .unwrap();

        let filter = MetadataFilter::new().with("document_id", "1");
        assert_eq!(index.delete_by(&filter).await.unwrap(), 2);
        assert_eq!(index.delete_by(&filter).await.unwrap(), 0);
        assert_eq!(index.size().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn array_filter_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let index = open(&tmp).await;
        let filter = MetadataFilter::new().with("tags", json!(["a", "b"]));
        let err = index.query("x", 3, Some(&filter)).await.unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedFilter(key) if key == "tags"));
    }

    #[tokio::test]
    async fn document_filter_uses_column_index() {
        let tmp = TempDir::new().unwrap();
        let index = open(&tmp).await;

        let mut qb = QueryBuilder::<Sqlite>::new("EXPLAIN QUERY PLAN SELECT id FROM index_entries");
        push_filter(&mut qb, &MetadataFilter::document(&DocumentId::from("7"))).unwrap();
        let rows = qb.build().fetch_all(&index.pool).await.unwrap();
        let plan: Vec<String> = rows.iter().map(|r| r.get::<String, _>("detail")).collect();
        assert!(
            plan.iter().any(|d| d.contains("idx_index_entries_document_id")),
            "{:?}",
            plan
        );
    }

    /// Hashing embeddings in batches of three, recording each batch size.
    struct SmallBatches {
        inner: HashingProvider,
        calls: Arc<std::sync::Mutex<Vec<usize>>>,
    }

    #[async_trait]
    impl EmbeddingProvider for SmallBatches {
        fn model_name(&self) -> &str {
            "hash"
        }
        fn dims(&self) -> usize {
            self.inner.dims()
        }
        fn batch_size(&self) -> usize {
            3
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            self.calls.lock().unwrap().push(texts.len());
            self.inner.embed(texts).await
        }
    }

    #[tokio::test]
    async fn add_embeds_in_provider_batches() {
        let tmp = TempDir::new().unwrap();
        let calls = Arc::new(std::sync::Mutex::new(Vec::new()));
        let provider = SmallBatches {
            inner: HashingProvider::new(128),
            calls: calls.clone(),
        };
        let index = SqliteIndex::open(tmp.path(), Arc::new(provider)).await.unwrap();

        let texts: Vec<String> = (0..7).map(|i| format!("chunk {}", i)).collect();
        let metas: Vec<Metadata> = (0..7).map(|i| meta("1", i)).collect();
        let ids: Vec<String> = (0..7).map(|i| format!("doc_1_chunk_{}", i)).collect();
        index.add(&texts, &metas, &ids).await.unwrap();

        assert_eq!(*calls.lock().unwrap(), vec![3, 3, 1]);
        assert_eq!(index.size().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn query_rejects_vectors_of_another_size() {
        let tmp = TempDir::new().unwrap();
        {
            let index = open(&tmp).await;
            index
                .add(&strings(&["stored at 128"]), &[meta("1", 0)], &strings(&["a"]))
                .await
                .unwrap();
            index.close().await;
        }

        let index = SqliteIndex::open(tmp.path(), Arc::new(HashingProvider::new(32)))
            .await
            .unwrap();
        let err = index.query("stored", 3, None).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Embedding(EmbedError::DimensionMismatch {
                expected: 32,
                actual: 128
            })
        ));
    }

    #[tokio::test]
    async fn persists_across_reopen_and_reset_clears() {
        let tmp = TempDir::new().unwrap();
        {
            let index = open(&tmp).await;
            index
                .add(&strings(&["kept"]), &[meta("9", 0)], &strings(&["k"]))
                .await
                .unwrap();
            index.close().await;
        }
        let index = open(&tmp).await;
        assert_eq!(index.size().await.unwrap(), 1);
        assert_eq!(
            index.list(1).await.unwrap()[0].metadata.get("document_id"),
            Some(&json!("9"))
        );

        index.reset().await.unwrap();
        assert_eq!(index.size().await.unwrap(), 0);
        assert!(index.query("kept", 5, None).await.unwrap().is_empty());
    }
}
