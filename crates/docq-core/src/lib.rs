//! DocQ Core Library
//!
//! Document ingestion and retrieval-augmented question answering:
//!
//! # Features
//! - OCR extraction with a confidence-gated fallback pass
//! - Pattern-based metadata extraction (CNPJ, CPF, dates, amounts)
//! - Character-window chunking and vector indexing
//! - Grounded question answering over the indexed corpus
//! - SQLite record store plus content-addressed blob storage

pub mod config;
pub mod error;
pub mod index;
pub mod llm;
pub mod metadata;
pub mod ocr;
pub mod pipeline;
pub mod qa;
pub mod store;

pub use config::{ChunkingConfig, Config, LlmServiceConfig, OcrConfig, QaConfig};
pub use error::{DocqError, Error, Result};
pub use index::{
    chunk, Chunk, MemoryVectorStore, ScoredChunk, SqliteVectorStore, VectorIndexer, VectorStore,
};
pub use llm::{ChatMessage, Embedder, Generator, LlmClient};
pub use metadata::extract_metadata;
pub use ocr::{ExtractionEngine, ExtractionOutcome, OcrBackend, OcrRegion, VisionOcrBackend};
pub use pipeline::DocumentPipeline;
pub use qa::{Answer, RagEngine, SourceCitation};
pub use store::{BlobStore, Database, Document, DocumentStatus};

/// Default data directory name
pub const DATA_DIR_NAME: &str = "docq";

/// Default config directory name
pub const CONFIG_DIR_NAME: &str = "docq";
