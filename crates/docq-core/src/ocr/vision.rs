//! Vision-model recognition backend
//!
//! Bridges an OpenAI-compatible vision endpoint into the `OcrBackend`
//! contract: the page goes up as a base64 data URL, the model replies
//! with a JSON list of text regions and confidences.

use super::{OcrBackend, OcrRegion};
use crate::error::{DocqError, Result};
use crate::llm::{ChatMessage, LlmClient};
use async_trait::async_trait;
use base64::Engine as _;
use serde::Deserialize;
use std::sync::Arc;

const SYSTEM_PROMPT: &str = "Voce e um motor de OCR. Leia todo o texto visivel na imagem \
e responda APENAS com um array JSON de objetos {\"text\": string, \"confidence\": number \
entre 0 e 1}, um objeto por linha ou bloco de texto, na ordem de leitura.";

/// OCR backend backed by a vision-capable chat model
pub struct VisionOcrBackend {
    client: Arc<LlmClient>,
    model: String,
}

impl VisionOcrBackend {
    pub fn new(client: Arc<LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[derive(Deserialize)]
struct RegionReply {
    text: String,
    confidence: f32,
}

#[async_trait]
impl OcrBackend for VisionOcrBackend {
    async fn recognize(&self, image_bytes: &[u8]) -> Result<Vec<OcrRegion>> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image_bytes);
        let parts = serde_json::json!([
            {
                "type": "image_url",
                "image_url": { "url": format!("data:image/png;base64,{encoded}") }
            },
            { "type": "text", "text": "Extraia o texto desta imagem." }
        ]);

        let reply = self
            .client
            .chat_completion_with_model(
                &self.model,
                vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user_parts(parts)],
            )
            .await?;

        let regions: Vec<RegionReply> = serde_json::from_str(extract_json_array(&reply))
            .map_err(|e| {
                DocqError::Extraction(format!("vision backend returned malformed regions: {e}"))
            })?;

        Ok(regions
            .into_iter()
            .map(|r| OcrRegion::new(r.text, r.confidence.clamp(0.0, 1.0)))
            .collect())
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Tolerate prose or code fences around the JSON array
fn extract_json_array(reply: &str) -> &str {
    match (reply.find('['), reply.rfind(']')) {
        (Some(start), Some(end)) if end > start => &reply[start..=end],
        _ => reply,
    }
}
