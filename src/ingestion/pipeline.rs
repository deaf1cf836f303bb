//! Staged index pipeline
//!
//! The processing steps between raw text and chunk drafts are an explicit
//! ordered list of named stages with one fixed interface, built once at
//! startup from validated configuration. The embedding and dual-store commit
//! steps are orchestrated by the reconciler, not by this pipeline.

use serde_json::{Map, Value};

use crate::config::ChunkingConfig;
use crate::error::Result;
use crate::types::document::Chunk;

use super::splitter::DocumentSplitter;

/// A named text-to-text processing stage
pub trait TextStage: Send + Sync {
    fn name(&self) -> &'static str;
    fn process(&self, input: String) -> Result<String>;
}

/// Whitespace normalization ahead of splitting
pub struct WhitespaceCleaner {
    spaces: regex::Regex,
    blank_lines: regex::Regex,
}

impl WhitespaceCleaner {
    pub fn new() -> Self {
        Self {
            spaces: regex::Regex::new(r"[ \t]+").expect("static regex"),
            blank_lines: regex::Regex::new(r"\n{3,}").expect("static regex"),
        }
    }
}

impl Default for WhitespaceCleaner {
    fn default() -> Self {
        Self::new()
    }
}

impl TextStage for WhitespaceCleaner {
    fn name(&self) -> &'static str {
        "whitespace_cleaner"
    }

    fn process(&self, input: String) -> Result<String> {
        let collapsed = self.spaces.replace_all(&input, " ");
        let trimmed = self.blank_lines.replace_all(&collapsed, "\n\n");
        Ok(trimmed.trim().to_string())
    }
}

/// Ordered stages followed by the splitter
pub struct IndexPipeline {
    stages: Vec<Box<dyn TextStage>>,
    splitter: DocumentSplitter,
}

impl IndexPipeline {
    /// Build the pipeline from validated chunking configuration
    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Ok(Self {
            stages: vec![Box::new(WhitespaceCleaner::new())],
            splitter: DocumentSplitter::from_config(config)?,
        })
    }

    /// Run all stages and split the result into chunk drafts
    pub fn run(
        &self,
        file_path: &str,
        raw_text: String,
        metadata: &Map<String, Value>,
    ) -> Result<Vec<Chunk>> {
        let mut text = raw_text;
        for stage in &self.stages {
            tracing::debug!("Running stage '{}' for '{}'", stage.name(), file_path);
            text = stage.process(text)?;
        }
        Ok(self.splitter.split(file_path, &text, metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SplitUnit;

    #[test]
    fn cleaner_collapses_whitespace() {
        let cleaner = WhitespaceCleaner::new();
        let out = cleaner
            .process("a   b\t\tc\n\n\n\n\nd  ".to_string())
            .unwrap();
        assert_eq!(out, "a b c\n\nd");
    }

    #[test]
    fn pipeline_runs_stages_then_splits() {
        let config = ChunkingConfig {
            split_unit: SplitUnit::Word,
            split_length: 3,
            split_overlap: 0,
        };
        let pipeline = IndexPipeline::from_config(&config).unwrap();

        let chunks = pipeline
            .run(
                "uploads/a.txt",
                "one   two\tthree four five".to_string(),
                &Map::new(),
            )
            .unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "one two three");
        assert_eq!(chunks[1].content, "four five");
    }

    #[test]
    fn pipeline_output_is_deterministic() {
        let config = ChunkingConfig::default();
        let pipeline = IndexPipeline::from_config(&config).unwrap();

        let a = pipeline
            .run("uploads/a.txt", "some sample text".to_string(), &Map::new())
            .unwrap();
        let b = pipeline
            .run("uploads/a.txt", "some sample text".to_string(), &Map::new())
            .unwrap();
        assert_eq!(a.len(), b.len());
        assert_eq!(a[0].id, b[0].id);
    }
}
