use chrono::Utc;
use chunk_model::{Chunk, ChunkId, ChunkMetadata, Page};

use crate::boundary::{chunk_sentences, split_sentences};
use crate::markup::parse_sections;
use crate::{Chunker, ChunkerConfig};

/// Splits each section into fixed-size, overlapping word windows,
/// ignoring heading levels beyond carrying the section's own anchor.
/// Cheap and predictable; a reasonable default for pages with little or
/// no markup.
#[derive(Debug, Clone)]
pub struct SimpleChunker {
    config: ChunkerConfig,
}

impl SimpleChunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }
}

impl Default for SimpleChunker {
    fn default() -> Self {
        Self::new(ChunkerConfig::default())
    }
}

impl Chunker for SimpleChunker {
    fn chunk_page(&self, page: &Page) -> Vec<Chunk> {
        let sections = parse_sections(&page.content);
        let now = Utc::now().max(page.updated_at);
        let mut chunks = Vec::new();

        for section in &sections {
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

            for (index, text) in texts.into_iter().enumerate() {
                chunks.push(Chunk {
                    id: ChunkId::new(),
                    page_id: page.id.clone(),
                    space: page.space.clone(),
                    title: page.title.clone(),
                    section_anchor: Some(section.anchor.clone()),
                    text,
                    version: page.version,
                    updated_at: page.updated_at,
                    labels: page.labels.clone(),
                    vector: Vec::new(),
                    url: page.url.clone(),
                    indexed_at: now,
                    metadata: ChunkMetadata {
                        section: None,
                        level: None,
                        has_code: false,
                        has_tables: false,
                        has_lists: false,
                        chunk_index: index as u32,
                        overlap_head_words: if index > 0 { self.config.overlap_words as u32 } else { 0 },
                        overlap_tail_words: 0,
                    },
                });
            }
        }

        for (index, chunk) in chunks.iter_mut().enumerate() {
            chunk.metadata.chunk_index = index as u32;
        }

        chunks
    }
}
