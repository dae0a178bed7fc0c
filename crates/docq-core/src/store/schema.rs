//! Database schema and initialization

use crate::error::Result;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;

/// Main database handle
///
/// The connection is behind a mutex because pipeline stages run on
/// spawned tasks and commit transitions concurrently.
pub struct Database {
    pub(crate) conn: Mutex<Connection>,
}

const SCHEMA_VERSION: i32 = 1;

const CREATE_TABLES: &str = r#"
-- Uploaded documents and their lifecycle state
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    filename TEXT NOT NULL,
    blob_ref TEXT NOT NULL,
    file_size INTEGER NOT NULL,
    status TEXT NOT NULL,
    error TEXT,
    uploaded_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    extracted_text TEXT,
    metadata TEXT,
    ocr_confidence REAL,
    flagged_regions INTEGER
);

-- Chunks derived from a document's extracted text
CREATE TABLE IF NOT EXISTS chunks (
    document_id TEXT NOT NULL REFERENCES documents(id),
    chunk_index INTEGER NOT NULL,
    body TEXT NOT NULL,
    start_char INTEGER NOT NULL,
    end_char INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (document_id, chunk_index)
);

-- Embedding vectors keyed like chunks (used by the SQLite vector store)
CREATE TABLE IF NOT EXISTS embeddings (
    document_id TEXT NOT NULL,
    chunk_index INTEGER NOT NULL,
    body TEXT NOT NULL,
    embedding BLOB NOT NULL,
    PRIMARY KEY (document_id, chunk_index)
);

CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(status);
"#;

impl Database {
    /// Open database at the given path, creating parent directories
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (tests)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create tables and set pragmas
    pub fn initialize(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(CREATE_TABLES)?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        Ok(())
    }
}
