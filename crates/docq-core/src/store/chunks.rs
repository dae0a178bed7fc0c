//! Chunk row storage
//!
//! Chunks are derived artifacts: reprocessing a document replaces its
//! chunk set wholesale, never patches it.

use super::Database;
use crate::error::Result;
use crate::index::Chunk;
use chrono::Utc;
use rusqlite::params;

impl Database {
    /// Replace all chunk rows for a document
    pub fn replace_chunks(&self, document_id: &str, chunks: &[Chunk]) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let mut conn = self.conn.lock().expect("database mutex poisoned");
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM chunks WHERE document_id = ?1",
            params![document_id],
        )?;
        for chunk in chunks {
            tx.execute(
                "INSERT INTO chunks (document_id, chunk_index, body, start_char, end_char, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    document_id,
                    chunk.index as i64,
                    chunk.text,
                    chunk.start_char as i64,
                    chunk.end_char as i64,
                    now,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Fetch chunk rows for a document in index order
    pub fn get_chunks(&self, document_id: &str) -> Result<Vec<Chunk>> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT chunk_index, body, start_char, end_char
             FROM chunks WHERE document_id = ?1 ORDER BY chunk_index",
        )?;
        let rows = stmt.query_map(params![document_id], |row| {
            Ok(Chunk {
                index: row.get::<_, i64>(0)? as usize,
                text: row.get(1)?,
                start_char: row.get::<_, i64>(2)? as usize,
                end_char: row.get::<_, i64>(3)? as usize,
            })
        })?;
        let mut chunks = Vec::new();
        for row in rows {
            chunks.push(row?);
        }
        Ok(chunks)
    }

    /// Count chunk rows for a document
    pub fn count_chunks(&self, document_id: &str) -> Result<usize> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM chunks WHERE document_id = ?1",
            params![document_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
