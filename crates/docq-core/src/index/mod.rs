//! Chunking and vector indexing
//!
//! Splits extracted text into character windows, embeds them, and keeps
//! the similarity store in sync with the owning document.

pub mod chunker;
mod store;

pub use chunker::{chunk, Chunk};
pub use store::{
    bytes_to_embedding, cosine_similarity, embedding_to_bytes, MemoryVectorStore, ScoredChunk,
    SqliteVectorStore, VectorEntry, VectorStore,
};

use crate::error::Result;
use crate::llm::Embedder;
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info};

const BATCH_SIZE: usize = 32;

/// Embeds chunks and keeps them searchable, keyed to the owning document
pub struct VectorIndexer {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl VectorIndexer {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Embed and upsert a document's chunks
    ///
    /// Upsert is idempotent per `(document_id, chunk_index)`, so
    /// reprocessing replaces prior vectors.
    pub async fn index(&self, document_id: &str, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            debug!("No chunks to index for document {document_id}");
            return Ok(());
        }

        // Batches embed concurrently; try_join_all keeps them in order
        let batch_embeddings = try_join_all(chunks.chunks(BATCH_SIZE).map(|batch| {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            async move { self.embedder.embed_batch(&texts).await }
        }))
        .await?;

        let mut entries = Vec::with_capacity(chunks.len());
        for (batch, embeddings) in chunks.chunks(BATCH_SIZE).zip(batch_embeddings) {
            for (chunk, embedding) in batch.iter().zip(embeddings) {
                entries.push(VectorEntry {
                    chunk_index: chunk.index,
                    text: chunk.text.clone(),
                    embedding,
                });
            }
        }

        self.store.upsert(document_id, entries).await?;
        info!("Indexed {} chunks for document {document_id}", chunks.len());
        Ok(())
    }

    /// Rank indexed chunks against a query
    pub async fn search(
        &self,
        query_text: &str,
        top_k: usize,
        document_id: Option<&str>,
    ) -> Result<Vec<ScoredChunk>> {
        let query_embedding = self.embedder.embed(query_text).await?;
        self.store.search(&query_embedding, top_k, document_id).await
    }

    /// Remove all vectors for a document (no-op when none are indexed)
    pub async fn delete(&self, document_id: &str) -> Result<()> {
        self.store.delete(document_id).await
    }
}
