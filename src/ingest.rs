//! Ingestion pipeline orchestration.
//!
//! Runs one document through extraction → sufficiency check → chunking →
//! indexing and reports the resulting [`IndexStatus`]. Extraction (and any
//! OCR) is CPU-bound and runs on tokio's blocking pool, optionally under
//! `extraction.timeout_secs`. [`spawn_ingest`] moves the whole pipeline onto
//! a task so request handlers can return immediately and record the
//! outcome later.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::chunk::chunk_text;
use crate::config::ChunkingConfig;
use crate::error::IngestError;
use crate::extract::{Extraction, Extractor};
use crate::models::{DocumentId, FailureReason, IndexStatus, SourceDocument};
use crate::rag::RetrievalCoordinator;

/// Outcome of one ingestion attempt.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub document_id: DocumentId,
    pub status: IndexStatus,
    pub method: Option<&'static str>,
    pub page_count: Option<u32>,
    pub chars: usize,
    pub chunks: usize,
    pub error: Option<String>,
}

impl IngestReport {
    pub fn indexed(&self) -> bool {
        self.status.is_indexed()
    }
}

pub struct Ingestor {
    extractor: Arc<Extractor>,
    chunking: ChunkingConfig,
    coordinator: RetrievalCoordinator,
}

/// Successful pipeline run, before it is folded into a report.
struct Indexed {
    extraction: Extraction,
    chunks: usize,
}

impl Ingestor {
    pub fn new(
        extractor: Extractor,
        chunking: ChunkingConfig,
        coordinator: RetrievalCoordinator,
    ) -> Self {
        Self {
            extractor: Arc::new(extractor),
            chunking,
            coordinator,
        }
    }

    pub fn coordinator(&self) -> &RetrievalCoordinator {
        &self.coordinator
    }

    /// Ingest `doc`, whose status is currently `current`.
    ///
    /// A document that was indexed before (or failed part-way) is deleted
    /// from the index first. Pipeline failures do not error: they end in
    /// [`IndexStatus::Failed`] with the reason recorded. Only an illegal
    /// transition (the document is already `Indexing`) is an error.
    pub async fn ingest(
        &self,
        doc: &SourceDocument,
        current: &IndexStatus,
    ) -> Result<IngestReport, IngestError> {
        let indexing = current.start()?;
        let reindex = !matches!(current, IndexStatus::Unindexed);
        info!(document_id = %doc.id, path = %doc.path.display(), reindex, "Ingesting document");

        let report = match self.run(doc, reindex).await {
            Ok(done) => IngestReport {
                document_id: doc.id.clone(),
                status: indexing.succeed()?,
                method: Some(done.extraction.method.as_str()),
                page_count: done.extraction.page_count.or(doc.page_count),
                chars: done.extraction.char_count(),
                chunks: done.chunks,
                error: None,
            },
            Err((err, extraction)) => {
                warn!(document_id = %doc.id, error = %err, "Ingestion failed");
                IngestReport {
                    document_id: doc.id.clone(),
                    status: indexing.fail(failure_reason(&err))?,
                    method: extraction.as_ref().map(|e| e.method.as_str()),
                    page_count: extraction
                        .as_ref()
                        .and_then(|e| e.page_count)
                        .or(doc.page_count),
                    chars: extraction.as_ref().map_or(0, |e| e.char_count()),
                    chunks: 0,
                    error: Some(err.to_string()),
                }
            }
        };
        Ok(report)
    }

    async fn run(
        &self,
        doc: &SourceDocument,
        reindex: bool,
    ) -> Result<Indexed, (IngestError, Option<Extraction>)> {
        let extraction = self.extract(doc).await.map_err(|e| (e, None))?;

        let threshold = self.extractor.config().min_text_length;
        let chars = extraction.char_count();
        if chars < threshold {
            return Err((
                IngestError::InsufficientContent { chars, threshold },
                Some(extraction),
            ));
        }

        let chunks = chunk_text(
            &extraction.text,
            self.chunking.chunk_size,
            self.chunking.overlap,
        );
        let ok = if reindex {
            self.coordinator.reindex_document(&doc.id, &chunks).await
        } else {
            self.coordinator.index_document(&doc.id, &chunks).await
        };
        if !ok {
            return Err((IngestError::Indexing(doc.id.to_string()), Some(extraction)));
        }

        Ok(Indexed {
            chunks: chunks.len(),
            extraction,
        })
    }

    async fn extract(&self, doc: &SourceDocument) -> Result<Extraction, IngestError> {
        let extractor = self.extractor.clone();
        let path = doc.path.clone();
        let handle = tokio::task::spawn_blocking(move || extractor.extract_detailed(&path));

        let timeout_secs = self.extractor.config().timeout_secs;
        let joined = if timeout_secs > 0 {
            tokio::time::timeout(Duration::from_secs(timeout_secs), handle)
                .await
                .map_err(|_| IngestError::Timeout(timeout_secs))?
        } else {
            handle.await
        };
        joined.map_err(|e| IngestError::Join(e.to_string()))
    }
}

fn failure_reason(err: &IngestError) -> FailureReason {
    match err {
        IngestError::InsufficientContent { .. } => FailureReason::InsufficientContent,
        IngestError::Timeout(_) => FailureReason::ExtractionTimedOut,
        IngestError::Indexing(_) => FailureReason::IndexingFailed,
        IngestError::Extraction(_) | IngestError::Join(_) | IngestError::InvalidTransition { .. } => {
            FailureReason::ExtractionFailed
        }
    }
}

/// Run [`Ingestor::ingest`] on a background task.
pub fn spawn_ingest(
    ingestor: Arc<Ingestor>,
    doc: SourceDocument,
    current: IndexStatus,
) -> JoinHandle<Result<IngestReport, IngestError>> {
    tokio::spawn(async move { ingestor.ingest(&doc, &current).await })
}
