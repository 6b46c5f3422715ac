//! Document chunking for corpus ingestion.
//!
//! Splits raw document text into overlapping passages. Granularity is
//! characters, consistent across the whole corpus; consecutive chunks share
//! exactly `chunk_overlap` characters so no boundary content is lost.

use anyhow::{bail, Result};

use crate::rag::models::{Chunk, ChunkMetadata, DocumentSource};

#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    /// Fails when `chunk_overlap >= chunk_size` or `chunk_size == 0`.
    /// Checked again here even though `Config::validate` rejects the same
    /// values, so a chunker constructed outside the config path cannot loop
    /// forever on a non-advancing window.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            bail!("Invalid config: chunk_size must be positive");
        }
        if chunk_overlap >= chunk_size {
            bail!(
                "Invalid config: chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
            );
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    /// Splits `text` into chunks, propagating the source metadata unchanged
    /// onto every chunk with `sequence_index` incrementing from 0.
    /// Pure transformation; empty text yields no chunks.
    pub fn chunk_document(&self, source: &DocumentSource, text: &str) -> Vec<Chunk> {
        // Work in characters, not bytes, so multibyte text never splits
        // inside a code point.
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }

        let step = self.chunk_size - self.chunk_overlap;
        let mut chunks = Vec::new();
        let mut start = 0;
        let mut sequence_index = 0u32;

        loop {
            let end = (start + self.chunk_size).min(chars.len());
            let chunk_text: String = chars[start..end].iter().collect();

            chunks.push(Chunk {
                id: format!("{}:{}", source.source_id, sequence_index),
                text: chunk_text,
                metadata: ChunkMetadata {
                    source_kind: source.source_kind,
                    source_id: source.source_id.clone(),
                    title: source.title.clone(),
                    company: source.company.clone(),
                    sequence_index,
                },
            });

            if end == chars.len() {
                break;
            }
            start += step;
            sequence_index += 1;
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::models::SourceKind;

    fn job_source(id: &str) -> DocumentSource {
        DocumentSource {
            source_kind: SourceKind::Job,
            source_id: id.to_string(),
            title: Some("Senior Python Developer".to_string()),
            company: Some("TechCorp".to_string()),
        }
    }

    /// Rebuilds the original text from chunks by dropping each chunk's
    /// leading overlap, then compares with the input.
    fn reconstruct(chunks: &[Chunk], overlap: usize) -> String {
        let mut out = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(&chunk.text);
            } else {
                out.extend(chunk.text.chars().skip(overlap));
            }
        }
        out
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        assert!(Chunker::new(100, 100).is_err());
        assert!(Chunker::new(100, 150).is_err());
        assert!(Chunker::new(0, 0).is_err());
        assert!(Chunker::new(100, 99).is_ok());
    }

    #[test]
    fn test_short_text_yields_single_chunk() {
        let chunker = Chunker::new(500, 50).unwrap();
        let chunks = chunker.chunk_document(&job_source("j1"), "Short text");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Short text");
        assert_eq!(chunks[0].metadata.sequence_index, 0);
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        let chunker = Chunker::new(500, 50).unwrap();
        assert!(chunker.chunk_document(&job_source("j1"), "").is_empty());
    }

    #[test]
    fn test_consecutive_chunks_share_exactly_overlap_chars() {
        let chunker = Chunker::new(20, 5).unwrap();
        let text = "abcdefghij".repeat(10);
        let chunks = chunker.chunk_document(&job_source("j1"), &text);
        assert!(chunks.len() > 1);

        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].text.chars().collect();
            let next: Vec<char> = pair[1].text.chars().collect();
            let tail: String = prev[prev.len() - 5..].iter().collect();
            let head: String = next[..5].iter().collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn test_reconstruction_across_configs() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(30);
        for (size, overlap) in [(50, 10), (64, 0), (100, 99), (37, 13)] {
            let chunker = Chunker::new(size, overlap).unwrap();
            let chunks = chunker.chunk_document(&job_source("j1"), &text);
            assert_eq!(
                reconstruct(&chunks, overlap),
                text,
                "reconstruction failed for size={size} overlap={overlap}"
            );
        }
    }

    #[test]
    fn test_metadata_propagated_and_sequence_increments() {
        let chunker = Chunker::new(20, 5).unwrap();
        let text = "x".repeat(100);
        let chunks = chunker.chunk_document(&job_source("j7"), &text);

        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.metadata.sequence_index, i as u32);
            assert_eq!(chunk.metadata.source_id, "j7");
            assert_eq!(chunk.metadata.source_kind, SourceKind::Job);
            assert_eq!(chunk.metadata.company.as_deref(), Some("TechCorp"));
            assert_eq!(chunk.id, format!("j7:{i}"));
        }
    }

    #[test]
    fn test_multibyte_text_never_splits_code_points() {
        let chunker = Chunker::new(10, 3).unwrap();
        let text = "héllo wörld ünïcode ".repeat(10);
        let chunks = chunker.chunk_document(&job_source("j1"), &text);
        assert_eq!(reconstruct(&chunks, 3), text);
    }
}
