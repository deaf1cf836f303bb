//! Query-time context assembler
//!
//! Maps the (id, score) pairs returned by the vector store back to chunk
//! metadata, drops overlapping duplicates, and orders the survivors for the
//! generation prompt. Ids with no relational row are skipped and reported,
//! never fatal: a degraded answer beats a failed query.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::providers::VectorHit;
use crate::storage::MetadataStore;
use crate::types::document::ChunkId;

/// How assembled blocks are ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextOrdering {
    /// Descending retrieval score (default)
    ScoreDescending,
    /// Document order, for locally coherent passages
    DocumentOrder,
}

/// A text block with provenance, ready for the prompt
#[derive(Debug, Clone)]
pub struct ContextBlock {
    pub id: ChunkId,
    pub file_path: String,
    pub ordinal: u32,
    pub page_number: Option<u32>,
    pub score: f32,
    pub content: String,
    pub metadata: Map<String, Value>,
}

/// Assembled context plus the ids that had to be skipped
#[derive(Debug, Clone, Default)]
pub struct AssembledContext {
    pub blocks: Vec<ContextBlock>,
    pub skipped: Vec<ChunkId>,
}

/// Builds generation context from retrieval hits
pub struct ContextAssembler {
    metadata: Arc<MetadataStore>,
    split_length: usize,
    split_overlap: usize,
}

impl ContextAssembler {
    pub fn new(metadata: Arc<MetadataStore>, chunking: &ChunkingConfig) -> Self {
        Self {
            metadata,
            split_length: chunking.split_length,
            split_overlap: chunking.split_overlap,
        }
    }

    /// Assemble at most `max_context_chunks` deduplicated blocks from hits
    /// ranked best-first.
    pub fn assemble(
        &self,
        hits: &[VectorHit],
        max_context_chunks: usize,
        ordering: ContextOrdering,
    ) -> Result<AssembledContext> {
        let ids: Vec<ChunkId> = hits.iter().map(|h| h.id).collect();
        let rows = self.metadata.get_chunks_by_ids(&ids)?;
        let by_id: HashMap<ChunkId, _> = rows.into_iter().map(|c| (c.id, c)).collect();

        let mut blocks = Vec::new();
        let mut skipped = Vec::new();
        for hit in hits {
            match by_id.get(&hit.id) {
                Some(chunk) => blocks.push(ContextBlock {
                    id: chunk.id,
                    file_path: chunk.file_path.clone(),
                    ordinal: chunk.ordinal,
                    page_number: chunk.page_number,
                    score: hit.score,
                    content: chunk.content.clone(),
                    metadata: chunk.metadata.clone(),
                }),
                None => {
                    tracing::warn!("{}", Error::PartialRetrievalInconsistency(hit.id.to_string()));
                    skipped.push(hit.id);
                }
            }
        }

        let mut blocks = self.dedup_overlapping(blocks);

        // score-descending, ties broken by document position for stable output
        blocks.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.file_path.cmp(&b.file_path))
                .then_with(|| a.ordinal.cmp(&b.ordinal))
        });
        blocks.truncate(max_context_chunks);

        if ordering == ContextOrdering::DocumentOrder {
            // best score per document decides document order, ordinals within
            let mut best: HashMap<String, f32> = HashMap::new();
            for block in &blocks {
                let entry = best.entry(block.file_path.clone()).or_insert(block.score);
                if block.score > *entry {
                    *entry = block.score;
                }
            }
            blocks.sort_by(|a, b| {
                let score_a = best.get(&a.file_path).copied().unwrap_or(0.0);
                let score_b = best.get(&b.file_path).copied().unwrap_or(0.0);
                score_b
                    .partial_cmp(&score_a)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.file_path.cmp(&b.file_path))
                    .then_with(|| a.ordinal.cmp(&b.ordinal))
            });
        }

        Ok(AssembledContext { blocks, skipped })
    }

    /// Keep only the highest-scored chunk of each overlapping group.
    ///
    /// Chunks `n` and `m` of one document share text when
    /// `|m - n| * (split_length - split_overlap) < split_length`; with zero
    /// overlap nothing ever overlaps.
    fn dedup_overlapping(&self, blocks: Vec<ContextBlock>) -> Vec<ContextBlock> {
        if self.split_overlap == 0 || blocks.len() < 2 {
            return blocks;
        }
        let stride = self.split_length - self.split_overlap;

        let mut by_doc: HashMap<String, Vec<ContextBlock>> = HashMap::new();
        for block in blocks {
            by_doc.entry(block.file_path.clone()).or_default().push(block);
        }

        let mut kept = Vec::new();
        for (_, mut doc_blocks) in by_doc {
            doc_blocks.sort_by_key(|b| b.ordinal);

            let mut group: Vec<ContextBlock> = Vec::new();
            for block in doc_blocks {
                let overlaps = group.last().map(|last| {
                    let gap = (block.ordinal - last.ordinal) as usize;
                    gap * stride < self.split_length
                });
                match overlaps {
                    Some(true) => group.push(block),
                    _ => {
                        if let Some(best) = take_best(std::mem::take(&mut group)) {
                            kept.push(best);
                        }
                        group.push(block);
                    }
                }
            }
            if let Some(best) = take_best(group) {
                kept.push(best);
            }
        }
        kept
    }
}

fn take_best(group: Vec<ContextBlock>) -> Option<ContextBlock> {
    group.into_iter().reduce(|best, candidate| {
        if candidate.score > best.score {
            candidate
        } else {
            best
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;
    use serde_json::Map;

    use crate::config::SplitUnit;
    use crate::types::document::{Chunk, DocumentStatus, SourceDocument};

    fn chunking(overlap: usize) -> ChunkingConfig {
        ChunkingConfig {
            split_unit: SplitUnit::Word,
            split_length: 250,
            split_overlap: overlap,
        }
    }

    fn seed(metadata: &MetadataStore, path: &str, ordinals: &[u32]) -> Vec<ChunkId> {
        let now = Utc::now();
        metadata
            .upsert_source(&SourceDocument {
                file_path: path.to_string(),
                byte_len: 1,
                fingerprint: SourceDocument::fingerprint_of(path.as_bytes()),
                status: DocumentStatus::Clean,
                created_at: now,
                modified_at: now,
                metadata: Map::new(),
            })
            .unwrap();

        let chunks: Vec<Chunk> = ordinals
            .iter()
            .map(|&o| {
                Chunk::new(
                    path,
                    o,
                    (o as usize) * 220,
                    format!("{} chunk {}", path, o),
                    Map::new(),
                )
            })
            .collect();
        metadata.replace_chunks(path, &chunks).unwrap();
        chunks.iter().map(|c| c.id).collect()
    }

    fn hit(id: ChunkId, score: f32) -> VectorHit {
        VectorHit { id, score }
    }

    #[test]
    fn overlapping_hits_keep_the_highest_scored() {
        let metadata = Arc::new(MetadataStore::in_memory().unwrap());
        // c1, c2 are adjacent ordinals of doc1 (overlapping span); c3 is doc2
        let doc1 = seed(&metadata, "uploads/doc1.txt", &[0, 1]);
        let doc2 = seed(&metadata, "uploads/doc2.txt", &[0]);

        let assembler = ContextAssembler::new(metadata, &chunking(30));
        let hits = vec![hit(doc2[0], 0.9), hit(doc1[0], 0.8), hit(doc1[1], 0.7)];

        let result = assembler
            .assemble(&hits, 10, ContextOrdering::ScoreDescending)
            .unwrap();

        assert_eq!(result.blocks.len(), 2);
        assert_eq!(result.blocks[0].id, doc2[0]);
        assert_eq!(result.blocks[1].id, doc1[0]);
        assert!(result.skipped.is_empty());
    }

    #[test]
    fn zero_overlap_never_dedups() {
        let metadata = Arc::new(MetadataStore::in_memory().unwrap());
        let doc1 = seed(&metadata, "uploads/doc1.txt", &[0, 1]);

        let assembler = ContextAssembler::new(metadata, &chunking(0));
        let hits = vec![hit(doc1[0], 0.8), hit(doc1[1], 0.7)];

        let result = assembler
            .assemble(&hits, 10, ContextOrdering::ScoreDescending)
            .unwrap();
        assert_eq!(result.blocks.len(), 2);
    }

    #[test]
    fn non_adjacent_ordinals_do_not_overlap() {
        let metadata = Arc::new(MetadataStore::in_memory().unwrap());
        let doc1 = seed(&metadata, "uploads/doc1.txt", &[0, 2]);

        let assembler = ContextAssembler::new(metadata, &chunking(30));
        let hits = vec![hit(doc1[0], 0.8), hit(doc1[1], 0.7)];

        let result = assembler
            .assemble(&hits, 10, ContextOrdering::ScoreDescending)
            .unwrap();
        assert_eq!(result.blocks.len(), 2);
    }

    #[test]
    fn missing_metadata_is_skipped_not_fatal() {
        let metadata = Arc::new(MetadataStore::in_memory().unwrap());
        let doc1 = seed(&metadata, "uploads/doc1.txt", &[0]);
        let ghost = ChunkId::derive("uploads/gone.txt", 3);

        let assembler = ContextAssembler::new(metadata, &chunking(30));
        let hits = vec![hit(ghost, 0.95), hit(doc1[0], 0.5)];

        let result = assembler
            .assemble(&hits, 10, ContextOrdering::ScoreDescending)
            .unwrap();
        assert_eq!(result.blocks.len(), 1);
        assert_eq!(result.skipped, vec![ghost]);
    }

    #[test]
    fn truncates_to_max_context_chunks() {
        let metadata = Arc::new(MetadataStore::in_memory().unwrap());
        let doc1 = seed(&metadata, "uploads/doc1.txt", &[0, 2, 4, 6]);

        let assembler = ContextAssembler::new(metadata, &chunking(30));
        let hits: Vec<VectorHit> = doc1
            .iter()
            .enumerate()
            .map(|(i, &id)| hit(id, 0.9 - 0.1 * i as f32))
            .collect();

        let result = assembler
            .assemble(&hits, 2, ContextOrdering::ScoreDescending)
            .unwrap();
        assert_eq!(result.blocks.len(), 2);
        assert_eq!(result.blocks[0].id, doc1[0]);
    }

    #[test]
    fn document_order_reassembles_passages() {
        let metadata = Arc::new(MetadataStore::in_memory().unwrap());
        let doc1 = seed(&metadata, "uploads/doc1.txt", &[0, 2]);
        let doc2 = seed(&metadata, "uploads/doc2.txt", &[0]);

        let assembler = ContextAssembler::new(metadata, &chunking(30));
        // doc1's later chunk scores highest, doc2 in between
        let hits = vec![hit(doc1[1], 0.9), hit(doc2[0], 0.85), hit(doc1[0], 0.2)];

        let result = assembler
            .assemble(&hits, 10, ContextOrdering::DocumentOrder)
            .unwrap();

        let order: Vec<(String, u32)> = result
            .blocks
            .iter()
            .map(|b| (b.file_path.clone(), b.ordinal))
            .collect();
        assert_eq!(
            order,
            vec![
                ("uploads/doc1.txt".to_string(), 0),
                ("uploads/doc1.txt".to_string(), 2),
                ("uploads/doc2.txt".to_string(), 0),
            ]
        );
    }
}
