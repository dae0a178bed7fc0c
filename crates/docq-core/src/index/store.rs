//! Similarity-searchable vector storage
//!
//! Stores embeddings keyed by `(document_id, chunk_index)` so that
//! reprocessing a document replaces its prior vectors. Two
//! implementations: an in-memory store and one persisted alongside the
//! record database as f32-LE BLOBs.

use crate::error::{DocqError, Result};
use crate::store::Database;
use async_trait::async_trait;
use rusqlite::params;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

/// A vector ready for upsert
#[derive(Debug, Clone)]
pub struct VectorEntry {
    pub chunk_index: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// A search candidate with its similarity score
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub document_id: String,
    pub chunk_index: usize,
    pub text: String,
    pub score: f32,
}

/// Similarity store contract
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace vectors for a document; idempotent per
    /// `(document_id, chunk_index)`
    async fn upsert(&self, document_id: &str, entries: Vec<VectorEntry>) -> Result<()>;

    /// Rank stored vectors against a query embedding, highest first,
    /// ties broken by ascending chunk index
    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        document_id: Option<&str>,
    ) -> Result<Vec<ScoredChunk>>;

    /// Remove all vectors for a document; no-op when none are indexed
    async fn delete(&self, document_id: &str) -> Result<()>;
}

/// Rank candidates: descending score, ascending chunk index on ties
fn rank(mut candidates: Vec<ScoredChunk>, top_k: usize) -> Vec<ScoredChunk> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.chunk_index.cmp(&b.chunk_index))
    });
    candidates.truncate(top_k);
    candidates
}

/// Convert f32 embedding to little-endian bytes
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert bytes to f32 embedding
pub fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embeddings
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// In-memory vector store
#[derive(Default)]
pub struct MemoryVectorStore {
    inner: RwLock<HashMap<String, BTreeMap<usize, (Vec<f32>, String)>>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, document_id: &str, entries: Vec<VectorEntry>) -> Result<()> {
        let mut inner = self.inner.write().expect("vector store lock poisoned");
        let doc = inner.entry(document_id.to_string()).or_default();
        for entry in entries {
            doc.insert(entry.chunk_index, (entry.embedding, entry.text));
        }
        Ok(())
    }

    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        document_id: Option<&str>,
    ) -> Result<Vec<ScoredChunk>> {
        let inner = self.inner.read().expect("vector store lock poisoned");
        let mut candidates = Vec::new();
        for (doc_id, chunks) in inner.iter() {
            if let Some(filter) = document_id {
                if doc_id != filter {
                    continue;
                }
            }
            for (chunk_index, (embedding, text)) in chunks {
                candidates.push(ScoredChunk {
                    document_id: doc_id.clone(),
                    chunk_index: *chunk_index,
                    text: text.clone(),
                    score: cosine_similarity(query, embedding),
                });
            }
        }
        Ok(rank(candidates, top_k))
    }

    async fn delete(&self, document_id: &str) -> Result<()> {
        let mut inner = self.inner.write().expect("vector store lock poisoned");
        inner.remove(document_id);
        Ok(())
    }
}

/// Vector store persisted in the record database
pub struct SqliteVectorStore {
    db: Arc<Database>,
}

impl SqliteVectorStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn upsert(&self, document_id: &str, entries: Vec<VectorEntry>) -> Result<()> {
        self.db
            .upsert_embeddings(document_id, &entries)
            .map_err(|e| DocqError::IndexUnavailable(e.to_string()))
    }

    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        document_id: Option<&str>,
    ) -> Result<Vec<ScoredChunk>> {
        let stored = self
            .db
            .all_embeddings(document_id)
            .map_err(|e| DocqError::IndexUnavailable(e.to_string()))?;
        let candidates = stored
            .into_iter()
            .map(|(doc_id, chunk_index, text, embedding)| ScoredChunk {
                document_id: doc_id,
                chunk_index,
                text,
                score: cosine_similarity(query, &embedding),
            })
            .collect();
        Ok(rank(candidates, top_k))
    }

    async fn delete(&self, document_id: &str) -> Result<()> {
        self.db
            .delete_embeddings(document_id)
            .map_err(|e| DocqError::IndexUnavailable(e.to_string()))
    }
}

impl Database {
    fn upsert_embeddings(&self, document_id: &str, entries: &[VectorEntry]) -> Result<()> {
        let mut conn = self.conn.lock().expect("database mutex poisoned");
        let tx = conn.transaction()?;
        for entry in entries {
            tx.execute(
                "INSERT OR REPLACE INTO embeddings (document_id, chunk_index, body, embedding)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    document_id,
                    entry.chunk_index as i64,
                    entry.text,
                    embedding_to_bytes(&entry.embedding),
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    #[allow(clippy::type_complexity)]
    fn all_embeddings(
        &self,
        document_id: Option<&str>,
    ) -> Result<Vec<(String, usize, String, Vec<f32>)>> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let mut rows = Vec::new();
        let map = |row: &rusqlite::Row<'_>| -> rusqlite::Result<(String, usize, String, Vec<f32>)> {
            let bytes: Vec<u8> = row.get(3)?;
            Ok((
                row.get(0)?,
                row.get::<_, i64>(1)? as usize,
                row.get(2)?,
                bytes_to_embedding(&bytes),
            ))
        };
        match document_id {
            Some(id) => {
                let mut stmt = conn.prepare(
                    "SELECT document_id, chunk_index, body, embedding
                     FROM embeddings WHERE document_id = ?1",
                )?;
                for row in stmt.query_map(params![id], map)? {
                    rows.push(row?);
                }
            }
            None => {
                let mut stmt = conn
                    .prepare("SELECT document_id, chunk_index, body, embedding FROM embeddings")?;
                for row in stmt.query_map([], map)? {
                    rows.push(row?);
                }
            }
        }
        Ok(rows)
    }

    fn delete_embeddings(&self, document_id: &str) -> Result<()> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        conn.execute(
            "DELETE FROM embeddings WHERE document_id = ?1",
            params![document_id],
        )?;
        Ok(())
    }

    /// Count embedding rows for a document
    pub fn count_embeddings(&self, document_id: &str) -> Result<usize> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM embeddings WHERE document_id = ?1",
            params![document_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
