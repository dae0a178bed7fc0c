//! Document records and lifecycle status

use super::Database;
use crate::error::{DocqError, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Processing stage of a document
///
/// Transitions are monotonic: `Uploaded → Extracting → Extracted →
/// Indexing → Indexed`. `Failed` is terminal and reachable from any
/// non-terminal state. A reprocess starts a fresh attempt at `Uploaded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Uploaded,
    Extracting,
    Extracted,
    Indexing,
    Indexed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Extracting => "extracting",
            Self::Extracted => "extracted",
            Self::Indexing => "indexing",
            Self::Indexed => "indexed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "uploaded" => Ok(Self::Uploaded),
            "extracting" => Ok(Self::Extracting),
            "extracted" => Ok(Self::Extracted),
            "indexing" => Ok(Self::Indexing),
            "indexed" => Ok(Self::Indexed),
            "failed" => Ok(Self::Failed),
            other => Err(DocqError::Config(format!("unknown status '{other}'"))),
        }
    }

    /// Whether this state accepts no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Indexed | Self::Failed)
    }

    /// Validate a transition along the state machine
    pub fn can_transition_to(&self, next: DocumentStatus) -> bool {
        use DocumentStatus::*;
        match (self, next) {
            (Uploaded, Extracting) => true,
            (Extracting, Extracted) => true,
            (Extracted, Indexing) => true,
            (Indexing, Indexed) => true,
            // Failure is reachable from any in-progress state
            (s, Failed) if !s.is_terminal() => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored document record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub filename: String,
    /// Reference into the blob store for the original bytes
    pub blob_ref: String,
    pub file_size: u64,
    pub status: DocumentStatus,
    /// Error detail, present only when status is `Failed`
    pub error: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub extracted_text: Option<String>,
    /// Extracted field matches, e.g. `cnpj -> [..]`
    pub metadata: Option<BTreeMap<String, Vec<String>>>,
    /// Aggregate OCR confidence in [0,1]
    pub ocr_confidence: Option<f32>,
    /// Count of regions still below threshold after all passes
    pub flagged_regions: Option<u32>,
}

impl Document {
    /// Create a fresh record in the `Uploaded` state
    pub fn new(filename: impl Into<String>, blob_ref: impl Into<String>, file_size: u64) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            filename: filename.into(),
            blob_ref: blob_ref.into(),
            file_size,
            status: DocumentStatus::Uploaded,
            error: None,
            uploaded_at: now,
            updated_at: now,
            extracted_text: None,
            metadata: None,
            ocr_confidence: None,
            flagged_regions: None,
        }
    }
}

/// Surface a corrupt column as a conversion error instead of masking it
fn corrupt_column(
    index: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err))
}

fn row_to_document(row: &Row<'_>) -> rusqlite::Result<Document> {
    let status_str: String = row.get(4)?;
    let uploaded_at: String = row.get(6)?;
    let updated_at: String = row.get(7)?;
    let metadata_json: Option<String> = row.get(9)?;
    Ok(Document {
        id: row.get(0)?,
        filename: row.get(1)?,
        blob_ref: row.get(2)?,
        file_size: row.get::<_, i64>(3)? as u64,
        status: DocumentStatus::parse(&status_str).map_err(|e| corrupt_column(4, e))?,
        error: row.get(5)?,
        uploaded_at: uploaded_at
            .parse::<DateTime<Utc>>()
            .map_err(|e| corrupt_column(6, e))?,
        updated_at: updated_at
            .parse::<DateTime<Utc>>()
            .map_err(|e| corrupt_column(7, e))?,
        extracted_text: row.get(8)?,
        metadata: metadata_json.and_then(|json| serde_json::from_str(&json).ok()),
        ocr_confidence: row.get(10)?,
        flagged_regions: row.get::<_, Option<i64>>(11)?.map(|n| n as u32),
    })
}

const DOCUMENT_COLUMNS: &str = "id, filename, blob_ref, file_size, status, error, \
     uploaded_at, updated_at, extracted_text, metadata, ocr_confidence, flagged_regions";

impl Database {
    /// Insert or replace a document record
    pub fn put_document(&self, doc: &Document) -> Result<()> {
        let metadata_json = doc
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let conn = self.conn.lock().expect("database mutex poisoned");
        conn.execute(
            "INSERT OR REPLACE INTO documents
                (id, filename, blob_ref, file_size, status, error,
                 uploaded_at, updated_at, extracted_text, metadata,
                 ocr_confidence, flagged_regions)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                doc.id,
                doc.filename,
                doc.blob_ref,
                doc.file_size as i64,
                doc.status.as_str(),
                doc.error,
                doc.uploaded_at.to_rfc3339(),
                doc.updated_at.to_rfc3339(),
                doc.extracted_text,
                metadata_json,
                doc.ocr_confidence,
                doc.flagged_regions.map(|n| n as i64),
            ],
        )?;
        Ok(())
    }

    /// Fetch a document by id
    pub fn get_document(&self, id: &str) -> Result<Document> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        conn.query_row(
            &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"),
            params![id],
            row_to_document,
        )
        .optional()?
        .ok_or_else(|| DocqError::NotFound(id.to_string()))
    }

    /// List documents, optionally filtered by status
    pub fn list_documents(
        &self,
        status: Option<DocumentStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Document>> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let mut docs = Vec::new();
        match status {
            Some(s) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE status = ?1
                     ORDER BY uploaded_at DESC LIMIT ?2 OFFSET ?3"
                ))?;
                let rows =
                    stmt.query_map(params![s.as_str(), limit as i64, offset as i64], row_to_document)?;
                for row in rows {
                    docs.push(row?);
                }
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {DOCUMENT_COLUMNS} FROM documents
                     ORDER BY uploaded_at DESC LIMIT ?1 OFFSET ?2"
                ))?;
                let rows = stmt.query_map(params![limit as i64, offset as i64], row_to_document)?;
                for row in rows {
                    docs.push(row?);
                }
            }
        }
        Ok(docs)
    }

    /// Count documents whose original bytes live at the given blob
    ///
    /// Content addressing dedupes identical uploads, so a blob may be
    /// shared by several documents and must outlive all of them.
    pub fn count_blob_references(&self, blob_ref: &str) -> Result<usize> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE blob_ref = ?1",
            params![blob_ref],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Remove a document and its chunks
    pub fn delete_document(&self, id: &str) -> Result<()> {
        let mut conn = self.conn.lock().expect("database mutex poisoned");
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM chunks WHERE document_id = ?1", params![id])?;
        let removed = tx.execute("DELETE FROM documents WHERE id = ?1", params![id])?;
        tx.commit()?;
        if removed == 0 {
            return Err(DocqError::NotFound(id.to_string()));
        }
        Ok(())
    }
}
