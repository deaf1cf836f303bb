//! Deterministic document splitting with stable chunk identities
//!
//! Splitting is a pure function of (text, configuration): identical inputs
//! always produce the same ordered chunks with the same ids, which is what
//! makes re-indexing idempotent and diffable against a previous run.

use serde_json::{Map, Value};
use unicode_segmentation::UnicodeSegmentation;

use crate::config::{ChunkingConfig, SplitUnit};
use crate::error::Result;
use crate::types::document::Chunk;

/// Splits a document into overlapping chunks of at most `split_length` units
#[derive(Debug, Clone)]
pub struct DocumentSplitter {
    unit: SplitUnit,
    length: usize,
    overlap: usize,
}

impl DocumentSplitter {
    /// Create a splitter, rejecting invalid length/overlap combinations
    pub fn new(unit: SplitUnit, length: usize, overlap: usize) -> Result<Self> {
        let config = ChunkingConfig {
            split_unit: unit,
            split_length: length,
            split_overlap: overlap,
        };
        config.validate()?;
        Ok(Self {
            unit,
            length,
            overlap,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.split_unit, config.split_length, config.split_overlap)
    }

    /// Split `text` into ordered chunks for `file_path`.
    ///
    /// Ordinals are contiguous from 0; each chunk after the first starts
    /// `split_length - split_overlap` units after its predecessor. A document
    /// shorter than `split_length` yields exactly one chunk.
    pub fn split(
        &self,
        file_path: &str,
        text: &str,
        metadata: &Map<String, Value>,
    ) -> Vec<Chunk> {
        let units = self.unit_ranges(text);
        if units.is_empty() {
            return vec![Chunk::new(file_path, 0, 0, text, metadata.clone())];
        }

        let stride = self.length - self.overlap;
        let mut chunks = Vec::new();
        let mut start = 0usize;
        let mut ordinal = 0u32;

        loop {
            let end = (start + self.length).min(units.len());
            let byte_start = units[start].0;
            let byte_end = units[end - 1].1;

            chunks.push(Chunk::new(
                file_path,
                ordinal,
                start,
                &text[byte_start..byte_end],
                metadata.clone(),
            ));

            if end == units.len() {
                break;
            }
            start += stride;
            ordinal += 1;
        }

        chunks
    }

    /// Byte ranges of the split units in `text`
    fn unit_ranges(&self, text: &str) -> Vec<(usize, usize)> {
        match self.unit {
            // whitespace-separated tokens
            SplitUnit::Word => {
                let mut units = Vec::new();
                let mut start = None;
                for (i, c) in text.char_indices() {
                    if c.is_whitespace() {
                        if let Some(s) = start.take() {
                            units.push((s, i));
                        }
                    } else if start.is_none() {
                        start = Some(i);
                    }
                }
                if let Some(s) = start {
                    units.push((s, text.len()));
                }
                units
            }
            // user-perceived characters, not bytes
            SplitUnit::Character => text
                .grapheme_indices(true)
                .map(|(i, g)| (i, i + g.len()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::document::ChunkId;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn rejects_overlap_not_less_than_length() {
        assert!(matches!(
            DocumentSplitter::new(SplitUnit::Word, 10, 10),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            DocumentSplitter::new(SplitUnit::Word, 0, 0),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(DocumentSplitter::new(SplitUnit::Word, 10, 9).is_ok());
    }

    #[test]
    fn six_hundred_words_at_250_30() {
        let splitter = DocumentSplitter::new(SplitUnit::Word, 250, 30).unwrap();
        let text = words(600);
        let chunks = splitter.split("uploads/doc1.txt", &text, &Map::new());

        let ordinals: Vec<u32> = chunks.iter().map(|c| c.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 2]);

        // chunk 1 starts at word 220 (250 - 30), chunk 2 at word 440
        assert_eq!(chunks[0].split_start, 0);
        assert_eq!(chunks[1].split_start, 220);
        assert_eq!(chunks[2].split_start, 440);
        assert!(chunks[1].content.starts_with("w220 "));
        assert!(chunks[2].content.starts_with("w440 "));
        assert!(chunks[2].content.ends_with("w599"));
    }

    #[test]
    fn split_is_deterministic() {
        let splitter = DocumentSplitter::new(SplitUnit::Word, 50, 10).unwrap();
        let text = words(137);

        let a = splitter.split("uploads/doc1.txt", &text, &Map::new());
        let b = splitter.split("uploads/doc1.txt", &text, &Map::new());

        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.id, y.id);
            assert_eq!(x.content, y.content);
            assert_eq!(x.split_start, y.split_start);
        }
    }

    #[test]
    fn short_document_yields_one_chunk() {
        let splitter = DocumentSplitter::new(SplitUnit::Word, 250, 30).unwrap();
        let chunks = splitter.split("uploads/short.txt", "just a few words here", &Map::new());

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].ordinal, 0);
        assert_eq!(chunks[0].content, "just a few words here");
    }

    #[test]
    fn ordinals_are_contiguous() {
        let splitter = DocumentSplitter::new(SplitUnit::Word, 25, 5).unwrap();
        let chunks = splitter.split("uploads/doc1.txt", &words(313), &Map::new());

        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.ordinal, i as u32);
        }
    }

    #[test]
    fn chunk_ids_follow_the_identity_rule() {
        let splitter = DocumentSplitter::new(SplitUnit::Word, 25, 5).unwrap();
        let chunks = splitter.split("uploads/doc1.txt", &words(100), &Map::new());

        for chunk in &chunks {
            assert_eq!(chunk.id, ChunkId::derive("uploads/doc1.txt", chunk.ordinal));
        }
    }

    #[test]
    fn character_unit_counts_graphemes() {
        let splitter = DocumentSplitter::new(SplitUnit::Character, 10, 0).unwrap();
        let chunks = splitter.split("uploads/doc1.txt", "abcdefghijklmno", &Map::new());

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "abcdefghij");
        assert_eq!(chunks[1].content, "klmno");
    }

    #[test]
    fn whitespace_only_text_still_yields_a_chunk() {
        let splitter = DocumentSplitter::new(SplitUnit::Word, 10, 0).unwrap();
        let chunks = splitter.split("uploads/blank.txt", "   \n\t  ", &Map::new());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].ordinal, 0);
    }
}
