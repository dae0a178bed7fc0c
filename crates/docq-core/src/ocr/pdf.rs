//! PDF text-layer extraction
//!
//! PDFs with embedded text skip recognition entirely; image-only PDFs
//! are reported as extraction failures rather than silently empty.

use crate::error::{DocqError, Result};

/// Extract the embedded text layer from PDF bytes
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| DocqError::Extraction(format!("failed to extract text from PDF: {e}")))?;

    if text.trim().is_empty() {
        return Err(DocqError::Extraction(
            "PDF contains no extractable text (may be image-based)".to_string(),
        ));
    }

    Ok(text)
}
