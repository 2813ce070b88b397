use chrono::Utc;
use chunk_model::{Chunk, ChunkId, ChunkMetadata, Page};

use crate::boundary::{chunk_sentences, split_sentences};
use crate::markup::{parse_sections, Section};
use crate::{Chunker, ChunkerConfig};

/// Chunks a page section by section, respecting the heading tree.
///
/// Each [`Section`] between `min_section_level` and `max_section_level` is
/// chunked independently; a section's ancestor headings (bounded by
/// `context_window`) are recorded in `ChunkMetadata::section` as a
/// "Parent > Child" path so the retriever can cite the precise subsection.
#[derive(Debug, Clone)]
pub struct SemanticChunker {
    config: ChunkerConfig,
    min_section_level: u8,
    max_section_level: u8,
}

impl SemanticChunker {
    pub fn new(config: ChunkerConfig, min_section_level: u8, max_section_level: u8) -> Self {
        Self {
            config,
            min_section_level,
            max_section_level,
        }
    }

    fn in_range(&self, section: &Section) -> bool {
        section.level == 0 || (section.level >= self.min_section_level && section.level <= self.max_section_level)
    }

    fn context_path(&self, section: &Section) -> String {
        let skip = section.ancestors.len().saturating_sub(self.config.context_window);
        let mut parts: Vec<String> = section.ancestors[skip..].to_vec();
        if !section.heading.is_empty() {
            parts.push(section.heading.clone());
        }
        parts.join(" > ")
    }
}

impl Default for SemanticChunker {
    fn default() -> Self {
        Self::new(ChunkerConfig::default(), 1, 6)
    }
}

impl Chunker for SemanticChunker {
    fn chunk_page(&self, page: &Page) -> Vec<Chunk> {
        let sections = parse_sections(&page.content);
        let now = Utc::now().max(page.updated_at);
        let mut chunks = Vec::new();
        let mut global_index = 0u32;

        for section in sections.iter().filter(|s| self.in_range(s)) {
            let body = section.body_text();
            if body.trim().is_empty() {
                continue;
            }

            let sentences = split_sentences(&body);
            let texts = chunk_sentences(
                &sentences,
                self.config.min_words,
                self.config.max_words,
                self.config.overlap_words,
            );
            let section_path = self.context_path(section);
            let anchor = if section.anchor.is_empty() {
                None
            } else {
                Some(section.anchor.clone())
            };

            for (local_index, text) in texts.into_iter().enumerate() {
                chunks.push(Chunk {
                    id: ChunkId::new(),
                    page_id: page.id.clone(),
                    space: page.space.clone(),
                    title: page.title.clone(),
                    section_anchor: anchor.clone(),
                    text,
                    version: page.version,
                    updated_at: page.updated_at,
                    labels: page.labels.clone(),
                    vector: Vec::new(),
                    url: page.url.clone(),
                    indexed_at: now,
                    metadata: ChunkMetadata {
                        section: Some(section_path.clone()),
                        level: Some(section.level),
                        has_code: section.has_code(),
                        has_tables: section.has_table(),
                        has_lists: section.has_list(),
                        chunk_index: global_index,
                        overlap_head_words: if local_index > 0 { self.config.overlap_words as u32 } else { 0 },
                        overlap_tail_words: 0,
                    },
                });
                global_index += 1;
            }
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn page(content: &str) -> Page {
        Page {
            id: "p1".into(),
            title: "Runbook".into(),
            space: "ENG".into(),
            version: 1,
            labels: BTreeSet::new(),
            updated_at: Utc::now(),
            url: None,
            content: content.to_string(),
        }
    }

    #[test]
    fn chunks_carry_section_path_and_anchor() {
        let markup = "# Runbook\n\n## Rollback\nStep one is to drain traffic from the service before anything else happens here.\n";
        let chunker = SemanticChunker::default();
        let chunks = chunker.chunk_page(&page(markup));
        assert!(!chunks.is_empty());
        let rollback = chunks.iter().find(|c| c.section_anchor.as_deref() == Some("rollback"));
        assert!(rollback.is_some());
        assert_eq!(rollback.unwrap().metadata.section.as_deref(), Some("Runbook > Rollback"));
    }

    #[test]
    fn respects_section_level_bounds() {
        let markup = "# Title\nintro\n\n###### Deep\nDeep detail text that is long enough to survive trimming rules here.\n";
        let chunker = SemanticChunker::new(ChunkerConfig::default(), 2, 4);
        let chunks = chunker.chunk_page(&page(markup));
        assert!(chunks.iter().all(|c| c.metadata.level != Some(6)));
    }

    #[test]
    fn flags_code_and_table_sections() {
        let markup = "# Notes\n```rust\nfn main() {}\n```\n\n| a | b |\n|---|---|\n";
        let chunker = SemanticChunker::new(ChunkerConfig { min_words: 1, ..ChunkerConfig::default() }, 0, 6);
        let chunks = chunker.chunk_page(&page(markup));
        assert!(chunks.iter().any(|c| c.metadata.has_code));
    }
}
