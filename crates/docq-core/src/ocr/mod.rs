//! OCR extraction engine
//!
//! Converts document pages into text plus per-region confidences, with a
//! primary recognition pass and a more expensive fallback pass invoked
//! only when the primary output is deemed insufficient.

mod engine;
mod pdf;
mod preprocess;
mod vision;

pub use engine::ExtractionEngine;
pub use pdf::extract_pdf_text;
pub use vision::VisionOcrBackend;

use crate::error::Result;
use async_trait::async_trait;

/// A recognized region of text with its confidence
#[derive(Debug, Clone)]
pub struct OcrRegion {
    pub text: String,
    /// Recognition certainty in [0,1]
    pub confidence: f32,
    /// Set when the region stayed below threshold after all passes
    pub low_confidence: bool,
}

impl OcrRegion {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
            low_confidence: false,
        }
    }
}

/// Result of extracting one document
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    /// Full text, low-confidence regions included
    pub text: String,
    /// Length-weighted mean confidence over accepted regions
    pub confidence: f32,
    pub regions: Vec<OcrRegion>,
    /// Whether the fallback pass ran
    pub fallback_used: bool,
}

impl ExtractionOutcome {
    /// Count of regions still flagged after all passes
    pub fn flagged_regions(&self) -> u32 {
        self.regions.iter().filter(|r| r.low_confidence).count() as u32
    }
}

/// Recognition backend: one model/algorithm over an encoded page image
#[async_trait]
pub trait OcrBackend: Send + Sync {
    /// Recognize text regions in an encoded image
    async fn recognize(&self, image_bytes: &[u8]) -> Result<Vec<OcrRegion>>;

    /// Backend name for logging
    fn name(&self) -> &str;
}
