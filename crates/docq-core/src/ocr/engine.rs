//! Two-pass extraction engine with confidence-based fallback

use super::{pdf, preprocess, ExtractionOutcome, OcrBackend, OcrRegion};
use crate::config::OcrConfig;
use crate::error::{DocqError, Result};
use image::ImageFormat;
use std::io::Cursor;
use std::sync::Arc;
use tracing::{debug, info, warn};

const PDF_MAGIC: &[u8] = b"%PDF";

/// Extraction engine over pluggable recognition backends
pub struct ExtractionEngine {
    primary: Arc<dyn OcrBackend>,
    fallback: Option<Arc<dyn OcrBackend>>,
    config: OcrConfig,
}

impl ExtractionEngine {
    pub fn new(
        primary: Arc<dyn OcrBackend>,
        fallback: Option<Arc<dyn OcrBackend>>,
        config: OcrConfig,
    ) -> Self {
        Self {
            primary,
            fallback,
            config,
        }
    }

    /// Extract text and confidences from an uploaded page
    ///
    /// PDF uploads with an embedded text layer bypass recognition.
    /// Undecodable input is fatal for the document.
    pub async fn extract(&self, bytes: &[u8]) -> Result<ExtractionOutcome> {
        if bytes.starts_with(PDF_MAGIC) {
            let text = pdf::extract_pdf_text(bytes)?;
            info!("PDF text layer extracted ({} chars)", text.len());
            return Ok(ExtractionOutcome {
                confidence: 1.0,
                regions: vec![OcrRegion::new(text.clone(), 1.0)],
                text,
                fallback_used: false,
            });
        }

        let image = image::load_from_memory(bytes)
            .map_err(|e| DocqError::Extraction(format!("undecodable image: {e}")))?;

        let page_bytes = if self.config.preprocessing {
            let normalized = preprocess::normalize(&image);
            let mut buf = Cursor::new(Vec::new());
            normalized
                .write_to(&mut buf, ImageFormat::Png)
                .map_err(|e| DocqError::Extraction(format!("failed to encode page: {e}")))?;
            buf.into_inner()
        } else {
            bytes.to_vec()
        };

        let mut regions = self.primary.recognize(&page_bytes).await?;
        debug!(
            "Primary pass ({}) recognized {} regions",
            self.primary.name(),
            regions.len()
        );

        let mut fallback_used = false;
        if self.needs_fallback(&regions) {
            if let Some(ref fallback) = self.fallback {
                info!(
                    "Low-confidence fraction exceeds {:.2}, running fallback pass ({})",
                    self.config.fallback_trigger,
                    fallback.name()
                );
                let secondary = fallback.recognize(&page_bytes).await?;
                regions = merge_passes(regions, secondary);
                fallback_used = true;
            } else {
                warn!("Fallback pass wanted but no fallback backend configured");
            }
        }

        Ok(self.finish(regions, fallback_used))
    }

    /// Whether the low-confidence fraction exceeds the fallback trigger
    fn needs_fallback(&self, regions: &[OcrRegion]) -> bool {
        if regions.is_empty() {
            return false;
        }
        let low = regions
            .iter()
            .filter(|r| r.confidence < self.config.confidence_threshold)
            .count();
        low as f32 / regions.len() as f32 > self.config.fallback_trigger
    }

    /// Flag sub-threshold regions and compute the aggregate confidence
    fn finish(&self, mut regions: Vec<OcrRegion>, fallback_used: bool) -> ExtractionOutcome {
        for region in &mut regions {
            region.low_confidence = region.confidence < self.config.confidence_threshold;
        }

        // Length-weighted mean over accepted regions only; flagged text is
        // still part of the output so downstream stages see it complete.
        let mut weighted = 0.0f64;
        let mut weight = 0.0f64;
        for region in regions.iter().filter(|r| !r.low_confidence) {
            let len = region.text.chars().count() as f64;
            weighted += region.confidence as f64 * len;
            weight += len;
        }
        let confidence = if weight > 0.0 {
            (weighted / weight) as f32
        } else {
            0.0
        };

        let text = regions
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let flagged = regions.iter().filter(|r| r.low_confidence).count();
        if flagged > 0 {
            warn!("{flagged} regions remain below threshold after all passes");
        }

        ExtractionOutcome {
            text,
            confidence,
            regions,
            fallback_used,
        }
    }
}

/// Merge primary and fallback passes
///
/// Regions are matched positionally; per matched pair the higher-confidence
/// reading wins. Regions only one pass produced are kept as-is.
fn merge_passes(primary: Vec<OcrRegion>, fallback: Vec<OcrRegion>) -> Vec<OcrRegion> {
    let mut merged = Vec::with_capacity(primary.len().max(fallback.len()));
    let mut fallback = fallback.into_iter();
    for region in primary {
        match fallback.next() {
            Some(candidate) if candidate.confidence > region.confidence => merged.push(candidate),
            Some(_) | None => merged.push(region),
        }
    }
    merged.extend(fallback);
    merged
}
