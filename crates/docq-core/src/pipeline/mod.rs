//! Document lifecycle manager
//!
//! Drives a document from upload through extraction, metadata, chunking,
//! and indexing, persisting every status transition. Stages run as a
//! background task per document; stage failure records the error and
//! moves the document to `failed`, never leaving it stuck mid-state.

use crate::config::Config;
use crate::error::{DocqError, Result};
use crate::index::{chunk, VectorIndexer};
use crate::metadata::extract_metadata;
use crate::ocr::ExtractionEngine;
use crate::store::{BlobStore, Database, Document, DocumentStatus};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Orchestrates document processing and owns the state machine
pub struct DocumentPipeline {
    inner: Arc<PipelineInner>,
}

struct PipelineInner {
    db: Arc<Database>,
    blobs: Arc<BlobStore>,
    extraction: Arc<ExtractionEngine>,
    indexer: Arc<VectorIndexer>,
    config: Config,
    /// Documents with an active processing task
    in_flight: Mutex<HashSet<String>>,
    /// Cancellation requests, honored at the next stage boundary
    cancel_requested: Mutex<HashSet<String>>,
}

impl DocumentPipeline {
    pub fn new(
        db: Arc<Database>,
        blobs: Arc<BlobStore>,
        extraction: Arc<ExtractionEngine>,
        indexer: Arc<VectorIndexer>,
        config: Config,
    ) -> Self {
        Self {
            inner: Arc::new(PipelineInner {
                db,
                blobs,
                extraction,
                indexer,
                config,
                in_flight: Mutex::new(HashSet::new()),
                cancel_requested: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Accept an upload and start processing in the background
    ///
    /// Returns the new document id immediately; the caller observes
    /// progress through `get_status`.
    pub async fn submit(&self, bytes: Vec<u8>, filename: &str) -> Result<String> {
        BlobStore::validate_upload(filename, bytes.len() as u64)?;

        let blob_ref = self.inner.blobs.save(&bytes)?;
        let doc = Document::new(filename, blob_ref, bytes.len() as u64);
        self.inner.db.put_document(&doc)?;
        info!("Document {} submitted ({filename})", doc.id);

        self.spawn_processing(doc.id.clone())?;
        Ok(doc.id)
    }

    /// Start a fresh processing attempt for an existing document
    ///
    /// Rejected while a processing task is already active for the id.
    pub async fn reprocess(&self, document_id: &str) -> Result<()> {
        let mut doc = self.inner.db.get_document(document_id)?;

        // Reserve the id before touching the record; a racing active run
        // must never have its persisted status clobbered by the reset.
        self.reserve(document_id)?;

        doc.status = DocumentStatus::Uploaded;
        doc.error = None;
        doc.updated_at = Utc::now();
        if let Err(e) = self.inner.db.put_document(&doc) {
            self.inner
                .in_flight
                .lock()
                .expect("pipeline lock poisoned")
                .remove(document_id);
            return Err(e);
        }

        self.spawn_reserved(document_id.to_string());
        Ok(())
    }

    /// Current document snapshot
    pub fn get_status(&self, document_id: &str) -> Result<Document> {
        self.inner.db.get_document(document_id)
    }

    /// List documents, optionally filtered by status
    pub fn list(
        &self,
        status: Option<DocumentStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Document>> {
        self.inner.db.list_documents(status, limit, offset)
    }

    /// Request cancellation of an in-flight document
    ///
    /// Cooperative: honored at the next stage boundary, not mid-stage.
    pub fn cancel(&self, document_id: &str) -> Result<()> {
        let in_flight = self.inner.in_flight.lock().expect("pipeline lock poisoned");
        if !in_flight.contains(document_id) {
            return Err(DocqError::State(format!(
                "document {document_id} is not being processed"
            )));
        }
        self.inner
            .cancel_requested
            .lock()
            .expect("pipeline lock poisoned")
            .insert(document_id.to_string());
        Ok(())
    }

    /// Remove a document, its chunks, its blob, and its vectors
    ///
    /// If vector deletion fails after the record is gone, the orphaned
    /// chunk set is reported for reconciliation rather than swallowed.
    pub async fn delete(&self, document_id: &str) -> Result<()> {
        {
            let in_flight = self.inner.in_flight.lock().expect("pipeline lock poisoned");
            if in_flight.contains(document_id) {
                return Err(DocqError::State(format!(
                    "document {document_id} is being processed; cancel it first"
                )));
            }
        }

        let doc = self.inner.db.get_document(document_id)?;
        let chunk_count = self.inner.db.count_chunks(document_id)?;

        self.inner.db.delete_document(document_id)?;
        // Identical uploads share one content-addressed blob; remove it
        // only once the last referencing document is gone
        if self.inner.db.count_blob_references(&doc.blob_ref)? == 0 {
            self.inner.blobs.delete(&doc.blob_ref)?;
        }

        if let Err(e) = self.inner.indexer.delete(document_id).await {
            error!("Vector deletion failed for removed document {document_id}: {e}");
            return Err(DocqError::PartialDelete {
                document_id: document_id.to_string(),
                orphaned_chunks: chunk_count,
                detail: e.to_string(),
            });
        }

        info!("Document {document_id} deleted ({chunk_count} chunks)");
        Ok(())
    }

    /// Poll until the document reaches a terminal state
    pub async fn wait_for_terminal(&self, document_id: &str, timeout: Duration) -> Result<Document> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let doc = self.get_status(document_id)?;
            if doc.status.is_terminal() {
                return Ok(doc);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(DocqError::State(format!(
                    "document {document_id} still {} after {timeout:?}",
                    doc.status
                )));
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Claim exclusive processing rights for the id
    fn reserve(&self, document_id: &str) -> Result<()> {
        let mut in_flight = self.inner.in_flight.lock().expect("pipeline lock poisoned");
        if !in_flight.insert(document_id.to_string()) {
            return Err(DocqError::State(format!(
                "document {document_id} is already being processed"
            )));
        }
        Ok(())
    }

    /// Register the id as in-flight and spawn its processing task
    fn spawn_processing(&self, document_id: String) -> Result<()> {
        self.reserve(&document_id)?;
        self.spawn_reserved(document_id);
        Ok(())
    }

    /// Spawn the processing task for an id already reserved in-flight
    fn spawn_reserved(&self, document_id: String) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            if let Err(e) = run_stages(&inner, &document_id).await {
                // Failure already recorded on the document; nothing to retry
                warn!("Processing of document {document_id} ended: {e}");
            }
            inner
                .in_flight
                .lock()
                .expect("pipeline lock poisoned")
                .remove(&document_id);
            inner
                .cancel_requested
                .lock()
                .expect("pipeline lock poisoned")
                .remove(&document_id);
        });
    }
}

/// Validate and persist one status transition
fn advance(inner: &PipelineInner, document_id: &str, next: DocumentStatus) -> Result<Document> {
    let mut doc = inner.db.get_document(document_id)?;
    if !doc.status.can_transition_to(next) {
        return Err(DocqError::State(format!(
            "document {document_id}: illegal transition {} -> {next}",
            doc.status
        )));
    }
    doc.status = next;
    doc.updated_at = Utc::now();
    inner.db.put_document(&doc)?;
    info!("Document {document_id} -> {next}");
    Ok(doc)
}

/// Record a stage failure and move the document to `failed`
fn fail(inner: &PipelineInner, document_id: &str, detail: &str) {
    match inner.db.get_document(document_id) {
        Ok(mut doc) if doc.status.can_transition_to(DocumentStatus::Failed) => {
            doc.status = DocumentStatus::Failed;
            doc.error = Some(detail.to_string());
            doc.updated_at = Utc::now();
            if let Err(e) = inner.db.put_document(&doc) {
                error!("Failed to persist failure of document {document_id}: {e}");
            }
        }
        Ok(_) => {}
        Err(e) => error!("Failed to load document {document_id} for failure record: {e}"),
    }
    error!("Document {document_id} failed: {detail}");
}

fn cancelled(inner: &PipelineInner, document_id: &str) -> bool {
    inner
        .cancel_requested
        .lock()
        .expect("pipeline lock poisoned")
        .contains(document_id)
}

/// Run the stage sequence for one document
///
/// Stages are strictly sequential; each commits its transition before
/// the next starts. Capability calls are bounded by the stage timeout.
async fn run_stages(inner: &Arc<PipelineInner>, document_id: &str) -> Result<()> {
    let stage_timeout = Duration::from_secs(inner.config.stage_timeout_secs);

    // Extraction
    let mut doc = advance(inner, document_id, DocumentStatus::Extracting)?;
    let bytes = match inner.blobs.load(&doc.blob_ref) {
        Ok(bytes) => bytes,
        Err(e) => {
            fail(inner, document_id, &format!("blob load failed: {e}"));
            return Err(e);
        }
    };
    let outcome = match tokio::time::timeout(stage_timeout, inner.extraction.extract(&bytes)).await
    {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            fail(inner, document_id, &e.to_string());
            return Err(e);
        }
        Err(_) => {
            let e = DocqError::Extraction(format!("extraction timed out after {stage_timeout:?}"));
            fail(inner, document_id, &e.to_string());
            return Err(e);
        }
    };

    debug!(
        "Document {document_id} extracted: {} chars, {} words, {} lines",
        outcome.text.chars().count(),
        outcome.text.split_whitespace().count(),
        outcome.text.lines().count()
    );
    doc.extracted_text = Some(outcome.text.clone());
    doc.ocr_confidence = Some(outcome.confidence);
    doc.flagged_regions = Some(outcome.flagged_regions());
    doc.metadata = Some(extract_metadata(&outcome.text));
    doc.updated_at = Utc::now();
    inner.db.put_document(&doc)?;
    advance(inner, document_id, DocumentStatus::Extracted)?;

    if cancelled(inner, document_id) {
        fail(inner, document_id, "processing cancelled by caller");
        return Ok(());
    }

    // Chunking + indexing
    let chunks = match chunk(
        &outcome.text,
        inner.config.chunking.chunk_size,
        inner.config.chunking.overlap,
    ) {
        Ok(chunks) => chunks,
        Err(e) => {
            fail(inner, document_id, &e.to_string());
            return Err(e);
        }
    };
    inner.db.replace_chunks(document_id, &chunks)?;
    advance(inner, document_id, DocumentStatus::Indexing)?;

    if cancelled(inner, document_id) {
        fail(inner, document_id, "processing cancelled by caller");
        return Ok(());
    }

    match tokio::time::timeout(stage_timeout, inner.indexer.index(document_id, &chunks)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            fail(inner, document_id, &e.to_string());
            return Err(e);
        }
        Err(_) => {
            let e =
                DocqError::IndexUnavailable(format!("indexing timed out after {stage_timeout:?}"));
            fail(inner, document_id, &e.to_string());
            return Err(e);
        }
    }

    advance(inner, document_id, DocumentStatus::Indexed)?;
    Ok(())
}
