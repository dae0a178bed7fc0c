//! Retrieval-augmented question answering
//!
//! Retrieves candidate chunks, composes a grounded prompt, invokes the
//! generative capability once, and scores the result from the evidence.
//! Below the relevance floor the engine declines to answer instead of
//! fabricating; that is a result, not an error.

use crate::config::QaConfig;
use crate::error::{DocqError, Result};
use crate::index::VectorIndexer;
use crate::llm::Generator;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Answer returned when no candidate clears the relevance floor
const INSUFFICIENT_EVIDENCE: &str =
    "Desculpe, não encontrei informações relevantes nos documentos para responder sua pergunta.";

const SOURCE_PREVIEW_CHARS: usize = 200;

/// A cited evidence chunk
#[derive(Debug, Clone, Serialize)]
pub struct SourceCitation {
    pub document_id: String,
    pub chunk_text: String,
    pub relevance_score: f32,
}

/// Result of one question, produced fresh per query
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub question: String,
    pub answer: String,
    pub sources: Vec<SourceCitation>,
    /// Evidence-derived confidence in [0,1]
    pub confidence: f32,
    pub timestamp: DateTime<Utc>,
}

/// Retrieval-augmented QA engine
pub struct RagEngine {
    indexer: Arc<VectorIndexer>,
    generator: Arc<dyn Generator>,
    config: QaConfig,
}

impl RagEngine {
    pub fn new(indexer: Arc<VectorIndexer>, generator: Arc<dyn Generator>, config: QaConfig) -> Self {
        Self {
            indexer,
            generator,
            config,
        }
    }

    /// Answer a question against the indexed corpus
    pub async fn ask(
        &self,
        question: &str,
        max_chunks: usize,
        document_id: Option<&str>,
    ) -> Result<Answer> {
        if max_chunks == 0 {
            return Err(DocqError::Config("max_chunks must be at least 1".to_string()));
        }

        info!("Answering question: {question}");
        let candidates = self.indexer.search(question, max_chunks, document_id).await?;

        let evidence: Vec<_> = candidates
            .into_iter()
            .filter(|c| c.score >= self.config.relevance_floor)
            .collect();

        if evidence.is_empty() {
            debug!("No candidate cleared the relevance floor {}", self.config.relevance_floor);
            return Ok(Answer {
                question: question.to_string(),
                answer: INSUFFICIENT_EVIDENCE.to_string(),
                sources: Vec::new(),
                confidence: 0.0,
                timestamp: Utc::now(),
            });
        }

        let prompt = compose_prompt(question, &evidence);
        let generated = self.generator.generate(&prompt).await?;

        let confidence = (evidence.iter().map(|c| c.score as f64).sum::<f64>()
            / evidence.len() as f64)
            .clamp(0.0, 1.0) as f32;

        let sources = evidence
            .into_iter()
            .map(|c| SourceCitation {
                document_id: c.document_id,
                chunk_text: preview(&c.text),
                relevance_score: c.score,
            })
            .collect();

        Ok(Answer {
            question: question.to_string(),
            answer: generated.trim().to_string(),
            sources,
            confidence,
            timestamp: Utc::now(),
        })
    }
}

/// Grounded prompt: retrieved evidence plus the question
fn compose_prompt(question: &str, evidence: &[crate::index::ScoredChunk]) -> String {
    let context = evidence
        .iter()
        .map(|c| {
            let short_id: String = c.document_id.chars().take(8).collect();
            format!("Documento {short_id}: {}", c.text)
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Você é um assistente especializado em responder perguntas sobre documentos.\n\
         \n\
         Contexto dos documentos:\n\
         {context}\n\
         \n\
         Pergunta: {question}\n\
         \n\
         Instruções:\n\
         - Seja preciso e objetivo\n\
         - Cite trechos relevantes quando possível\n\
         - Responda em português\n\
         \n\
         Resposta:"
    )
}

fn preview(text: &str) -> String {
    if text.chars().count() <= SOURCE_PREVIEW_CHARS {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(SOURCE_PREVIEW_CHARS).collect();
        out.push_str("...");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{Chunk, MemoryVectorStore};
    use crate::llm::Embedder;
    use async_trait::async_trait;

    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let lower = text.to_lowercase();
            Ok(vec![
                lower.matches("valor").count() as f32,
                lower.matches("outro").count() as f32,
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

    struct EchoGenerator;

    #[async_trait]
    impl Generator for EchoGenerator {
        async fn generate(&self, prompt: &str) -> Result<String> {
            assert!(prompt.contains("Contexto dos documentos"));
            Ok("O valor total é R$ 1.250,00.".to_string())
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl Generator for FailingGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Err(DocqError::Generation("service unreachable".to_string()))
        }

        fn model_name(&self) -> &str {
            "failing"
        }
    }

    async fn engine_with_corpus(generator: Arc<dyn Generator>) -> RagEngine {
        let indexer = Arc::new(VectorIndexer::new(
            Arc::new(StubEmbedder),
            Arc::new(MemoryVectorStore::new()),
        ));
        indexer
            .index(
                "11111111-aaaa",
                &[Chunk {
                    index: 0,
                    text: "TOTAL: R$ 1.250,00 valor valor".to_string(),
                    start_char: 0,
                    end_char: 30,
                }],
            )
            .await
            .unwrap();
        RagEngine::new(indexer, generator, QaConfig::default())
    }

    #[tokio::test]
    async fn test_ask_cites_evidence_with_confidence() {
        let engine = engine_with_corpus(Arc::new(EchoGenerator)).await;
        let answer = engine.ask("Qual o valor total?", 3, None).await.unwrap();
        assert_eq!(answer.answer, "O valor total é R$ 1.250,00.");
        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.sources[0].document_id, "11111111-aaaa");
        assert!(answer.confidence > QaConfig::default().relevance_floor);
        assert_eq!(answer.question, "Qual o valor total?");
    }

    #[tokio::test]
    async fn test_insufficient_evidence_declines() {
        // Query shares no markers with the corpus, scores fall below floor
        let engine = engine_with_corpus(Arc::new(EchoGenerator)).await;
        let answer = engine.ask("outro outro outro outro outro assunto", 3, None).await.unwrap();
        assert_eq!(answer.answer, INSUFFICIENT_EVIDENCE);
        assert!(answer.sources.is_empty());
        assert_eq!(answer.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_zero_max_chunks_rejected() {
        let engine = engine_with_corpus(Arc::new(EchoGenerator)).await;
        assert!(matches!(
            engine.ask("pergunta", 0, None).await,
            Err(DocqError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_generator_failure_surfaced() {
        let engine = engine_with_corpus(Arc::new(FailingGenerator)).await;
        assert!(matches!(
            engine.ask("Qual o valor total?", 3, None).await,
            Err(DocqError::Generation(_))
        ));
    }

    #[test]
    fn test_preview_truncates_long_chunks() {
        let long: String = "a".repeat(300);
        let cut = preview(&long);
        assert_eq!(cut.chars().count(), SOURCE_PREVIEW_CHARS + 3);
        assert!(cut.ends_with("..."));
        assert_eq!(preview("curto"), "curto");
    }
}
