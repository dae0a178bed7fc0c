//! Content-addressed blob store for uploaded bytes

use crate::error::{DocqError, Result};
use std::path::{Path, PathBuf};

/// Maximum accepted upload size: 50 MB
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Accepted upload extensions
const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "png", "jpg", "jpeg", "tiff", "tif"];

/// Stores original uploads as files keyed by their blake3 hash
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Open (and create) a blob store rooted at the given directory
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Get the default blob directory
    pub fn default_root() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::DATA_DIR_NAME)
            .join("blobs")
    }

    /// Validate filename extension and size before accepting an upload
    pub fn validate_upload(filename: &str, size: u64) -> Result<()> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(DocqError::Config(format!(
                "unsupported file type '.{extension}' for {filename}"
            )));
        }
        if size > MAX_UPLOAD_BYTES {
            return Err(DocqError::Config(format!(
                "file too large: {size} bytes (max {MAX_UPLOAD_BYTES})"
            )));
        }
        Ok(())
    }

    /// Save bytes, returning a content-addressed reference
    pub fn save(&self, bytes: &[u8]) -> Result<String> {
        let reference = blake3::hash(bytes).to_hex().to_string();
        let path = self.root.join(&reference);
        if !path.exists() {
            std::fs::write(&path, bytes)?;
        }
        Ok(reference)
    }

    /// Load bytes by reference
    pub fn load(&self, reference: &str) -> Result<Vec<u8>> {
        let path = self.root.join(reference);
        if !path.exists() {
            return Err(DocqError::NotFound(format!("blob {reference}")));
        }
        Ok(std::fs::read(path)?)
    }

    /// Delete a blob; missing blobs are a no-op
    pub fn delete(&self, reference: &str) -> Result<()> {
        let path = self.root.join(reference);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();

        let reference = store.save(b"conteudo do documento").unwrap();
        assert_eq!(store.load(&reference).unwrap(), b"conteudo do documento");

        // Same bytes, same reference
        let again = store.save(b"conteudo do documento").unwrap();
        assert_eq!(reference, again);
    }

    #[test]
    fn test_delete_missing_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();
        assert!(store.delete("does-not-exist").is_ok());
    }

    #[test]
    fn test_upload_validation() {
        assert!(BlobStore::validate_upload("nota.png", 1024).is_ok());
        assert!(BlobStore::validate_upload("nota.PDF", 1024).is_ok());
        assert!(BlobStore::validate_upload("script.exe", 1024).is_err());
        assert!(BlobStore::validate_upload("nota.png", MAX_UPLOAD_BYTES + 1).is_err());
    }
}
