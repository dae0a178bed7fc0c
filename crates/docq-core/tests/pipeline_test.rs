//! End-to-end pipeline tests with mock capabilities

use async_trait::async_trait;
use docq_core::error::{DocqError, Result};
use docq_core::{
    Config, Database, BlobStore, DocumentPipeline, DocumentStatus, Embedder, ExtractionEngine,
    Generator, MemoryVectorStore, OcrBackend, OcrRegion, QaConfig, RagEngine, VectorIndexer,
};
use image::{GrayImage, ImageFormat, Luma};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

/// Backend that always reads the same receipt line
struct ReceiptBackend {
    delay: Duration,
}

#[async_trait]
impl OcrBackend for ReceiptBackend {
    async fn recognize(&self, _image_bytes: &[u8]) -> Result<Vec<OcrRegion>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(vec![OcrRegion::new("TOTAL: R$ 1.250,00", 0.95)])
    }

    fn name(&self) -> &str {
        "receipt"
    }
}

struct StubEmbedder;

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let lower = text.to_lowercase();
        Ok(vec![
            lower.matches("valor").count() as f32,
            lower.matches("total").count() as f32,
            1.0,
        ])
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::new();
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize {
        3
    }

    fn model_name(&self) -> &str {
        "stub"
    }
}

struct CannedGenerator;

#[async_trait]
impl Generator for CannedGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Ok("O valor total do documento é R$ 1.250,00.".to_string())
    }

    fn model_name(&self) -> &str {
        "canned"
    }
}

struct Harness {
    pipeline: DocumentPipeline,
    qa: RagEngine,
    db: Arc<Database>,
    blob_dir: tempfile::TempDir,
}

fn harness_with(delay: Duration, stage_timeout_secs: u64) -> Harness {
    let db = Arc::new(Database::open_in_memory().unwrap());
    db.initialize().unwrap();
    let blob_dir = tempfile::tempdir().unwrap();
    let blobs = Arc::new(BlobStore::open(blob_dir.path()).unwrap());

    let mut config = Config::default();
    config.stage_timeout_secs = stage_timeout_secs;
    let extraction = Arc::new(ExtractionEngine::new(
        Arc::new(ReceiptBackend { delay }),
        None,
        config.ocr.clone(),
    ));
    let indexer = Arc::new(VectorIndexer::new(
        Arc::new(StubEmbedder),
        Arc::new(MemoryVectorStore::new()),
    ));
    let pipeline = DocumentPipeline::new(
        db.clone(),
        blobs,
        extraction,
        indexer.clone(),
        config,
    );
    let qa = RagEngine::new(indexer, Arc::new(CannedGenerator), QaConfig::default());

    Harness {
        pipeline,
        qa,
        db,
        blob_dir,
    }
}

fn harness_with_delay(delay: Duration) -> Harness {
    harness_with(delay, 300)
}

fn harness() -> Harness {
    harness_with_delay(Duration::ZERO)
}

fn png_page() -> Vec<u8> {
    let img = GrayImage::from_pixel(16, 16, Luma([220]));
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageLuma8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

#[tokio::test]
async fn test_upload_to_indexed_with_metadata() {
    let h = harness();
    let id = h.pipeline.submit(png_page(), "nota.png").await.unwrap();

    let doc = h
        .pipeline
        .wait_for_terminal(&id, Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(doc.status, DocumentStatus::Indexed);
    assert_eq!(doc.extracted_text.as_deref(), Some("TOTAL: R$ 1.250,00"));
    assert!(doc.error.is_none());
    assert!(doc.ocr_confidence.unwrap() > 0.9);

    let metadata = doc.metadata.unwrap();
    assert_eq!(metadata.get("valor").unwrap(), &vec!["1.250,00".to_string()]);

    // Short text, default 300/50 windows: exactly one chunk
    let chunks = h.db.get_chunks(&id).unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, "TOTAL: R$ 1.250,00");
}

#[tokio::test]
async fn test_corrupt_upload_fails_without_chunks() {
    let h = harness();
    let id = h
        .pipeline
        .submit(b"definitely not an image".to_vec(), "broken.png")
        .await
        .unwrap();

    let doc = h
        .pipeline
        .wait_for_terminal(&id, Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(doc.status, DocumentStatus::Failed);
    assert!(doc.error.unwrap().contains("undecodable image"));
    assert!(h.db.get_chunks(&id).unwrap().is_empty());
}

#[tokio::test]
async fn test_unsupported_extension_rejected_before_record() {
    let h = harness();
    let err = h
        .pipeline
        .submit(png_page(), "script.exe")
        .await
        .unwrap_err();
    assert!(matches!(err, DocqError::Config(_)));
    assert!(h.pipeline.list(None, 10, 0).unwrap().is_empty());
}

#[tokio::test]
async fn test_ask_cites_the_indexed_chunk() {
    let h = harness();
    let id = h.pipeline.submit(png_page(), "nota.png").await.unwrap();
    h.pipeline
        .wait_for_terminal(&id, Duration::from_secs(5))
        .await
        .unwrap();

    let answer = h.qa.ask("Qual o valor total?", 3, None).await.unwrap();
    assert_eq!(answer.answer, "O valor total do documento é R$ 1.250,00.");
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0].document_id, id);
    assert!(answer.confidence > QaConfig::default().relevance_floor);
}

#[tokio::test]
async fn test_concurrent_reprocess_rejected() {
    let h = harness_with_delay(Duration::from_millis(300));
    let id = h.pipeline.submit(png_page(), "nota.png").await.unwrap();

    // Still extracting: a second attempt for the same id must not start
    let err = h.pipeline.reprocess(&id).await.unwrap_err();
    assert!(matches!(err, DocqError::State(_)));

    let doc = h
        .pipeline
        .wait_for_terminal(&id, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(doc.status, DocumentStatus::Indexed);

    // Terminal now: reprocessing starts a fresh attempt
    h.pipeline.reprocess(&id).await.unwrap();
    let doc = h
        .pipeline
        .wait_for_terminal(&id, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(doc.status, DocumentStatus::Indexed);
}

#[tokio::test]
async fn test_duplicate_reprocess_yields_single_run() {
    let h = harness();
    let id = h.pipeline.submit(png_page(), "nota.png").await.unwrap();
    h.pipeline
        .wait_for_terminal(&id, Duration::from_secs(5))
        .await
        .unwrap();

    // Exactly one of two simultaneous attempts may claim the id; the
    // loser must not touch the record
    let (a, b) = tokio::join!(h.pipeline.reprocess(&id), h.pipeline.reprocess(&id));
    assert!(a.is_ok() ^ b.is_ok());

    let doc = h
        .pipeline
        .wait_for_terminal(&id, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(doc.status, DocumentStatus::Indexed);
}

#[tokio::test]
async fn test_cancel_honored_at_stage_boundary() {
    let h = harness_with_delay(Duration::from_millis(300));
    let id = h.pipeline.submit(png_page(), "nota.png").await.unwrap();
    h.pipeline.cancel(&id).unwrap();

    let doc = h
        .pipeline
        .wait_for_terminal(&id, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(doc.status, DocumentStatus::Failed);
    assert!(doc.error.unwrap().contains("cancelled"));

    // Cooperative, not preemptive: the extraction stage ran to completion
    // before the request took effect, and chunking never started
    assert_eq!(doc.extracted_text.as_deref(), Some("TOTAL: R$ 1.250,00"));
    assert!(h.db.get_chunks(&id).unwrap().is_empty());

    // Nothing left to cancel once the document is terminal
    assert!(matches!(
        h.pipeline.cancel(&id),
        Err(DocqError::State(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_extraction_timeout_fails_document() {
    let h = harness_with(Duration::from_secs(30), 1);
    let id = h.pipeline.submit(png_page(), "nota.png").await.unwrap();

    let doc = h
        .pipeline
        .wait_for_terminal(&id, Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(doc.status, DocumentStatus::Failed);
    assert!(doc.error.unwrap().contains("timed out"));
    assert!(h.db.get_chunks(&id).unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_removes_record_and_chunks() {
    let h = harness();
    let id = h.pipeline.submit(png_page(), "nota.png").await.unwrap();
    h.pipeline
        .wait_for_terminal(&id, Duration::from_secs(5))
        .await
        .unwrap();

    h.pipeline.delete(&id).await.unwrap();
    assert!(matches!(
        h.pipeline.get_status(&id),
        Err(DocqError::NotFound(_))
    ));

    // The deleted document is gone from retrieval too
    let answer = h.qa.ask("Qual o valor total?", 3, None).await.unwrap();
    assert!(answer.sources.is_empty());
    assert_eq!(answer.confidence, 0.0);
}

#[tokio::test]
async fn test_identical_upload_survives_sibling_delete() {
    let h = harness();
    let page = png_page();

    // Same bytes twice: content addressing gives both records one blob
    let id_a = h.pipeline.submit(page.clone(), "nota_a.png").await.unwrap();
    let id_b = h.pipeline.submit(page, "nota_b.png").await.unwrap();
    for id in [&id_a, &id_b] {
        h.pipeline
            .wait_for_terminal(id, Duration::from_secs(5))
            .await
            .unwrap();
    }
    assert_eq!(
        h.pipeline.get_status(&id_a).unwrap().blob_ref,
        h.pipeline.get_status(&id_b).unwrap().blob_ref
    );

    h.pipeline.delete(&id_a).await.unwrap();

    // The survivor's original bytes are intact and reprocessing works
    h.pipeline.reprocess(&id_b).await.unwrap();
    let doc = h
        .pipeline
        .wait_for_terminal(&id_b, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(doc.status, DocumentStatus::Indexed);

    // Last reference gone: the blob itself is removed
    h.pipeline.delete(&id_b).await.unwrap();
    assert_eq!(std::fs::read_dir(h.blob_dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_status_snapshot_for_unknown_id() {
    let h = harness();
    assert!(matches!(
        h.pipeline.get_status("no-such-id"),
        Err(DocqError::NotFound(_))
    ));
}
