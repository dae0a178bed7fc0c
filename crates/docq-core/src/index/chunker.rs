//! Fixed-stride character chunking
//!
//! Boundaries are character-offset based, not token- or sentence-aware:
//! identical `(text, chunk_size, overlap)` always yields identical chunks.

use crate::error::{DocqError, Result};

/// A contiguous character window of a document's extracted text
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// 0-based, contiguous position within the document
    pub index: usize,
    pub text: String,
    /// Character offset of the first character, inclusive
    pub start_char: usize,
    /// Character offset past the last character, exclusive
    pub end_char: usize,
}

/// Split text into overlapping windows of `chunk_size` characters
///
/// The walk advances `chunk_size - overlap` characters per step; every
/// window is exactly `chunk_size` characters except the final one, which
/// may be shorter and is never padded.
pub fn chunk(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    if chunk_size == 0 {
        return Err(DocqError::Config("chunk_size must be positive".to_string()));
    }
    if overlap >= chunk_size {
        return Err(DocqError::Config(format!(
            "overlap ({overlap}) must be smaller than chunk_size ({chunk_size})"
        )));
    }
    if text.is_empty() {
        return Ok(Vec::new());
    }

    // Byte offset of every character boundary, so windows can slice
    // multi-byte text by character count.
    let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    boundaries.push(text.len());
    let total_chars = boundaries.len() - 1;

    let stride = chunk_size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        let end = (start + chunk_size).min(total_chars);
        chunks.push(Chunk {
            index: chunks.len(),
            text: text[boundaries[start]..boundaries[end]].to_string(),
            start_char: start,
            end_char: end,
        });
        // The window that reaches the end of the text is the last one;
        // stepping further would only re-emit already-covered tail text.
        if start + chunk_size >= total_chars {
            break;
        }
        start += stride;
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_short_text_yields_single_chunk() {
        let chunks = chunk("TOTAL: R$ 1.250,00", 300, 50).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "TOTAL: R$ 1.250,00");
        assert_eq!(chunks[0].start_char, 0);
        assert_eq!(chunks[0].end_char, 18);
    }

    #[test]
    fn test_overlapping_windows() {
        let text = "abcdefghij"; // 10 chars
        let chunks = chunk(text, 6, 2).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "abcdef");
        assert_eq!(chunks[1].text, "efghij");
        assert_eq!(chunks[1].start_char, 4);
        assert_eq!(chunks[1].end_char, 10);
    }

    #[test]
    fn test_final_window_may_be_shorter() {
        // Strides of 3: [0,4) [3,7) [6,10); the third window reaches
        // the end of the text and is the last
        let chunks = chunk("abcdefghij", 4, 1).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].text, "ghij");

        let chunks = chunk("abcdefgh", 5, 2).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "abcde");
        assert_eq!(chunks[1].text, "defgh");

        let chunks = chunk("abcdefg", 5, 2).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].text, "defg");
        assert_eq!(chunks[1].text.chars().count(), 4);
    }

    #[test]
    fn test_degenerate_overlap_rejected() {
        assert!(matches!(chunk("text", 5, 5), Err(DocqError::Config(_))));
        assert!(matches!(chunk("text", 5, 6), Err(DocqError::Config(_))));
        assert!(matches!(chunk("text", 0, 0), Err(DocqError::Config(_))));
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(chunk("", 300, 50).unwrap().is_empty());
    }

    #[test]
    fn test_multibyte_offsets_are_character_counts() {
        let text = "ação é boa"; // 10 chars, more bytes
        let chunks = chunk(text, 6, 2).unwrap();
        assert_eq!(chunks[0].text.chars().count(), 6);
        assert_eq!(chunks[0].end_char, 6);
        let rebuilt: String = reconstruct(&chunks);
        assert_eq!(rebuilt, text);
    }

    fn reconstruct(chunks: &[Chunk]) -> String {
        let mut out = String::new();
        let mut covered = 0usize;
        for c in chunks {
            out.extend(c.text.chars().skip(covered.saturating_sub(c.start_char)));
            covered = covered.max(c.end_char);
        }
        out
    }

    proptest! {
        #[test]
        fn prop_chunking_is_idempotent(
            text in ".{0,400}",
            chunk_size in 1usize..64,
            overlap in 0usize..64,
        ) {
            prop_assume!(overlap < chunk_size);
            let first = chunk(&text, chunk_size, overlap).unwrap();
            let second = chunk(&text, chunk_size, overlap).unwrap();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_chunks_roundtrip_to_original(
            text in ".{0,400}",
            chunk_size in 1usize..64,
            overlap in 0usize..64,
        ) {
            prop_assume!(overlap < chunk_size);
            let chunks = chunk(&text, chunk_size, overlap).unwrap();
            prop_assert_eq!(reconstruct(&chunks), text);
        }

        #[test]
        fn prop_indices_contiguous_and_windows_sized(
            text in ".{1,400}",
            chunk_size in 1usize..64,
            overlap in 0usize..64,
        ) {
            prop_assume!(overlap < chunk_size);
            let chunks = chunk(&text, chunk_size, overlap).unwrap();
            for (i, c) in chunks.iter().enumerate() {
                prop_assert_eq!(c.index, i);
                if i + 1 < chunks.len() {
                    prop_assert_eq!(c.text.chars().count(), chunk_size);
                }
            }
        }
    }
}
