//! Coordinator behaviour against both vector index backends.

use std::sync::Arc;
use tempfile::TempDir;

use manual_rag::chunk::chunk_text;
use manual_rag::config::{StoreBackend, StoreConfig};
use manual_rag::embedding::HashingProvider;
use manual_rag::models::{Chunk, DocumentId};
use manual_rag::rag::RetrievalCoordinator;
use manual_rag::store::open_index;

const BACKENDS: [StoreBackend; 2] = [StoreBackend::Sqlite, StoreBackend::Memory];

async fn coordinator(tmp: &TempDir, backend: StoreBackend) -> RetrievalCoordinator {
    let config = StoreConfig {
        backend,
        path: tmp.path().join("vector_index"),
    };
    let index = open_index(&config, Arc::new(HashingProvider::new(256)))
        .await
        .unwrap();
    RetrievalCoordinator::new(index)
}

fn manual(topic: &str, sections: usize) -> Vec<Chunk> {
    let text = (0..sections)
        .map(|i| {
            format!(
                "Section {i}: the {topic} procedure step {i} covers inspection, cleaning \
                 and reassembly of the {topic} assembly in the field."
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    chunk_text(&text, 300, 60)
}

#[tokio::test]
async fn search_scoped_to_document_returns_only_its_chunks() {
    for backend in BACKENDS {
        let tmp = TempDir::new().unwrap();
        let rag = coordinator(&tmp, backend).await;
        assert!(rag.index_document(7i64, &manual("hydraulic pump", 12)).await);
        assert!(rag.index_document(8i64, &manual("hydraulic pump", 12)).await);

        let results = rag.search("topic", Some(DocumentId::from(7i64)), 3).await;
        assert!(results.len() <= 3, "{:?}", backend);
        assert!(!results.is_empty(), "{:?}", backend);
        assert!(results.iter().all(|r| r.document_id() == Some("7")));
    }
}

#[tokio::test]
async fn delete_then_search_is_empty() {
    for backend in BACKENDS {
        let tmp = TempDir::new().unwrap();
        let rag = coordinator(&tmp, backend).await;
        rag.index_document(7i64, &manual("valve", 6)).await;

        assert!(rag.delete_document(7i64).await);
        assert!(rag
            .search("topic", Some(DocumentId::from(7i64)), 5)
            .await
            .is_empty());
        // Deleting again matches nothing and still succeeds.
        assert!(rag.delete_document(7i64).await);
    }
}

#[tokio::test]
async fn indexing_twice_keeps_size_and_reindex_restores_it() {
    for backend in BACKENDS {
        let tmp = TempDir::new().unwrap();
        let rag = coordinator(&tmp, backend).await;
        let chunks = manual("compressor", 10);

        rag.index_document(3i64, &chunks).await;
        let after_first = rag.stats().await.total_entries;
        assert_eq!(after_first, chunks.len());

        rag.index_document(3i64, &chunks).await;
        assert!(rag.stats().await.total_entries >= after_first);

        rag.delete_document(3i64).await;
        rag.index_document(3i64, &chunks).await;
        assert_eq!(rag.stats().await.total_entries, after_first);
    }
}

#[tokio::test]
async fn empty_collection_searches_are_empty() {
    for backend in BACKENDS {
        let tmp = TempDir::new().unwrap();
        let rag = coordinator(&tmp, backend).await;
        assert!(rag.search("anything", None, 5).await.is_empty());
        assert_eq!(rag.get_context_for_topic("anything", None, 3).await, "");

        rag.index_document(1i64, &manual("gearbox", 3)).await;
        assert!(rag.reset().await);
        assert!(rag.search("gearbox", None, 5).await.is_empty());
    }
}

#[tokio::test]
async fn most_similar_chunk_ranks_first() {
    for backend in BACKENDS {
        let tmp = TempDir::new().unwrap();
        let rag = coordinator(&tmp, backend).await;
        let chunks = vec![
            Chunk {
                local_id: 0,
                text: "Bleed the brake lines before driving.".to_string(),
                char_count: 37,
            },
            Chunk {
                local_id: 1,
                text: "The cafeteria opens at noon on weekdays.".to_string(),
                char_count: 40,
            },
        ];
        rag.index_document("handbook", &chunks).await;

        let results = rag.search("bleed brake lines", None, 2).await;
        assert_eq!(results.len(), 2);
        assert!(results[0].content.contains("brake"));
        assert!(results[0].score < results[1].score);
    }
}

#[tokio::test]
async fn index_survives_reopen() {
    for backend in BACKENDS {
        let tmp = TempDir::new().unwrap();
        {
            let rag = coordinator(&tmp, backend).await;
            rag.index_document(4i64, &manual("turbine", 5)).await;
        }
        let rag = coordinator(&tmp, backend).await;
        let stats = rag.stats().await;
        assert_eq!(stats.backend, backend.as_str());
        assert_eq!(stats.embedding_model, "hash");
        assert!(stats.total_entries > 0);
        assert!(!rag
            .get_context_for_topic("turbine", Some(DocumentId::from(4i64)), 2)
            .await
            .is_empty());
    }
}

#[tokio::test]
async fn memory_backend_writes_flat_snapshot() {
    let tmp = TempDir::new().unwrap();
    let rag = coordinator(&tmp, StoreBackend::Memory).await;
    rag.index_document(2i64, &manual("boiler", 2)).await;

    let snapshot = tmp.path().join("vector_index").join("vector_index.json");
    let raw: serde_json::Value =
        serde_json::from_slice(&std::fs::read(snapshot).unwrap()).unwrap();
    let docs = raw["documents"].as_array().unwrap();
    let vecs = raw["embeddings"].as_array().unwrap();
    assert_eq!(docs.len(), vecs.len());
    assert_eq!(docs[0]["id"], "doc_2_chunk_0");
    assert_eq!(docs[0]["metadata"]["document_id"], "2");
}
