//! Persistence layer for docq
//!
//! Provides:
//! - SQLite record store for documents and their chunks
//! - Content-addressed blob store for uploaded bytes

mod blob;
mod chunks;
mod documents;
mod schema;

pub use blob::BlobStore;
pub use documents::{Document, DocumentStatus};
pub use schema::Database;

use std::path::PathBuf;

impl Database {
    /// Get the default database path
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::DATA_DIR_NAME)
            .join("docq.sqlite")
    }
}
