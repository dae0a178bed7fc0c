//! Configuration management

use crate::error::{DocqError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
///
/// Built once at startup and passed to each component at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// OCR extraction settings
    #[serde(default)]
    pub ocr: OcrConfig,

    /// Chunking settings
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Question-answering settings
    #[serde(default)]
    pub qa: QaConfig,

    /// LLM service configuration
    #[serde(default)]
    pub llm_service: LlmServiceConfig,

    /// Directory for uploaded document content
    #[serde(default)]
    pub blob_dir: Option<PathBuf>,

    /// Upper bound for a single pipeline stage, in seconds
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout_secs: u64,
}

fn default_stage_timeout() -> u64 {
    300
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ocr: OcrConfig::default(),
            chunking: ChunkingConfig::default(),
            qa: QaConfig::default(),
            llm_service: LlmServiceConfig::default(),
            blob_dir: None,
            stage_timeout_secs: default_stage_timeout(),
        }
    }
}

/// OCR extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Regions below this confidence are flagged as low-confidence
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,

    /// Fraction of low-confidence regions that triggers the fallback pass
    #[serde(default = "default_fallback_trigger")]
    pub fallback_trigger: f32,

    /// Apply image normalization before recognition
    #[serde(default = "default_preprocessing")]
    pub preprocessing: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: std::env::var("DOCQ_OCR_CONFIDENCE_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_confidence_threshold),
            fallback_trigger: default_fallback_trigger(),
            preprocessing: std::env::var("DOCQ_OCR_USE_PREPROCESSING")
                .map(|s| s.to_lowercase() != "false")
                .unwrap_or_else(|_| default_preprocessing()),
        }
    }
}

fn default_confidence_threshold() -> f32 {
    0.3
}

fn default_fallback_trigger() -> f32 {
    0.5
}

fn default_preprocessing() -> bool {
    true
}

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Window size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between consecutive windows in characters
    #[serde(default = "default_chunk_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: std::env::var("DOCQ_CHUNK_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_chunk_size),
            overlap: std::env::var("DOCQ_CHUNK_OVERLAP")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_chunk_overlap),
        }
    }
}

fn default_chunk_size() -> usize {
    300
}

fn default_chunk_overlap() -> usize {
    50
}

/// Question-answering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaConfig {
    /// Candidates below this relevance score are not used as evidence
    #[serde(default = "default_relevance_floor")]
    pub relevance_floor: f32,

    /// Default number of context chunks per question
    #[serde(default = "default_max_chunks")]
    pub max_chunks: usize,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            relevance_floor: std::env::var("DOCQ_RELEVANCE_FLOOR")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_relevance_floor),
            max_chunks: default_max_chunks(),
        }
    }
}

fn default_relevance_floor() -> f32 {
    0.3
}

fn default_max_chunks() -> usize {
    3
}

/// LLM service configuration for external inference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmServiceConfig {
    /// Base URL of the LLM service for chat/completions
    pub url: String,

    /// Model name for chat completions (answer generation, vision OCR)
    #[serde(default = "default_chat_model")]
    pub model: String,

    /// Model name for the vision OCR passes (primary)
    #[serde(default)]
    pub ocr_model: Option<String>,

    /// Model name for the fallback OCR pass
    #[serde(default)]
    pub ocr_fallback_model: Option<String>,

    /// Base URL for embeddings service (can be different from LLM URL)
    #[serde(default)]
    pub embedding_url: Option<String>,

    /// Model name for embeddings
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// API key (optional, for authenticated services)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl LlmServiceConfig {
    /// Get the embeddings URL (falls back to main URL if not specified)
    pub fn embeddings_url(&self) -> &str {
        self.embedding_url.as_deref().unwrap_or(&self.url)
    }
}

impl Default for LlmServiceConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("DOCQ_LLM_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            model: default_chat_model(),
            ocr_model: std::env::var("DOCQ_OCR_MODEL").ok(),
            ocr_fallback_model: std::env::var("DOCQ_OCR_FALLBACK_MODEL").ok(),
            embedding_url: std::env::var("DOCQ_EMBEDDING_URL").ok(),
            embedding_model: default_embedding_model(),
            api_key: std::env::var("DOCQ_LLM_API_KEY").ok(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_chat_model() -> String {
    std::env::var("DOCQ_LLM_MODEL").unwrap_or_else(|_| "meta-llama/Llama-3.1-8B-Instruct".to_string())
}

fn default_embedding_model() -> String {
    std::env::var("DOCQ_EMBEDDING_MODEL")
        .unwrap_or_else(|_| "sentence-transformers/all-MiniLM-L6-v2".to_string())
}

fn default_timeout() -> u64 {
    30
}

impl Config {
    /// Load config from default path
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        let config = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_yaml::from_str(&content)?
        } else {
            Config::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Save config to default path
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::CONFIG_DIR_NAME)
            .join("config.yaml")
    }

    /// Check parameter sanity before any component is built
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(DocqError::Config("chunk_size must be positive".to_string()));
        }
        if self.chunking.overlap >= self.chunking.chunk_size {
            return Err(DocqError::Config(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.overlap, self.chunking.chunk_size
            )));
        }
        if !(0.0..=1.0).contains(&self.ocr.confidence_threshold) {
            return Err(DocqError::Config(format!(
                "confidence_threshold must be in [0,1], got {}",
                self.ocr.confidence_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.ocr.fallback_trigger) {
            return Err(DocqError::Config(format!(
                "fallback_trigger must be in [0,1], got {}",
                self.ocr.fallback_trigger
            )));
        }
        Ok(())
    }
}
