//! Shared data model for the wiki retrieval core.
//!
//! Every other crate in the workspace (`embedding-provider`, `wiki-chunker`,
//! `chunking-store`, `retriever`, `ingest-worker`, `rag-pipeline`) depends on
//! these types instead of redefining them, so a `Chunk` built by the chunker
//! is the same `Chunk` the vector store persists and the retriever ranks.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifies a source page. Opaque to the core beyond equality/ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageId(pub String);

impl PageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for PageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Identifies a single chunk. Stable across re-indexing of the same text,
/// but never reused across pages once a page is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkId(pub uuid::Uuid);

impl ChunkId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ChunkId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ChunkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A source document as observed from the wiki connector. Never mutated by
/// the core; `version` is expected to be monotonic per `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub title: String,
    pub space: String,
    pub version: u64,
    pub labels: BTreeSet<String>,
    pub updated_at: DateTime<Utc>,
    pub url: Option<String>,
    pub content: String,
}

/// Per-chunk structural hints used for boosting and diversity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub section: Option<String>,
    pub level: Option<u8>,
    pub has_code: bool,
    pub has_tables: bool,
    pub has_lists: bool,
    pub chunk_index: u32,
    /// Number of words duplicated from the end of the previous chunk.
    pub overlap_head_words: u32,
    /// Number of words duplicated into the start of the next chunk.
    pub overlap_tail_words: u32,
}

/// An indexable fragment of a page.
///
/// Invariants:
/// - `(page_id, section_anchor, metadata.chunk_index)` is unique within a store.
/// - `vector.len() == embedder.dimension` for every indexed chunk.
/// - `indexed_at >= updated_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub page_id: PageId,
    pub space: String,
    pub title: String,
    pub section_anchor: Option<String>,
    pub text: String,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
    pub labels: BTreeSet<String>,
    pub vector: Vec<f32>,
    pub url: Option<String>,
    pub indexed_at: DateTime<Utc>,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Deduplication key used by the retriever: page, section anchor, and
    /// the first 100 chars of text.
    pub fn dedup_key(&self) -> (PageId, Option<String>, String) {
        (
            self.page_id.clone(),
            self.section_anchor.clone(),
            self.text.chars().take(100).collect(),
        )
    }

    /// Age in whole days between `updated_at` and `now`, floored at zero.
    pub fn age_days(&self, now: DateTime<Utc>) -> f64 {
        (now - self.updated_at).num_seconds().max(0) as f64 / 86_400.0
    }
}

/// Ingest bookkeeping for a single page, persisted to `ingest-state.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageState {
    pub page_id: PageId,
    pub space: String,
    pub title: String,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
    pub content_hash: String,
    pub last_indexed_at: DateTime<Utc>,
    pub url: Option<String>,
}

impl PageState {
    /// True when re-indexing this page would be a no-op.
    pub fn is_up_to_date(&self, version: u64, content_hash: &str) -> bool {
        self.version == version && self.content_hash == content_hash
    }
}

/// Granularity a vector was computed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbeddingLevel {
    Chunk,
    Section,
    Document,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingMetadata {
    pub level: EmbeddingLevel,
    pub has_context: bool,
    pub token_count: usize,
    pub keywords: Vec<String>,
}

/// Optional richer representation produced by `Embedder::embed_enhanced`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedEmbedding {
    pub dense: Vec<f32>,
    /// Lowercase term -> weight, weight >= 0.
    pub sparse: BTreeMap<String, f32>,
    pub document: Option<Vec<f32>>,
    pub section: Option<Vec<f32>>,
    pub metadata: EmbeddingMetadata,
}

/// Query-time filter. All present fields AND together; `labels` is "any-of".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filters {
    pub space: Option<String>,
    pub labels: Option<BTreeSet<String>>,
    pub updated_after: Option<DateTime<Utc>>,
}

impl Filters {
    pub fn is_empty(&self) -> bool {
        self.space.is_none() && self.labels.is_none() && self.updated_after.is_none()
    }

    /// Applies the AND-composition rule to a candidate chunk.
    pub fn matches_chunk(&self, chunk: &Chunk) -> bool {
        if let Some(space) = &self.space {
            if &chunk.space != space {
                return false;
            }
        }
        if let Some(labels) = &self.labels {
            if !labels.is_empty() && chunk.labels.is_disjoint(labels) {
                return false;
            }
        }
        if let Some(after) = &self.updated_after {
            if chunk.updated_at < *after {
                return false;
            }
        }
        true
    }
}

/// A citation back to the source page for one returned chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub page_id: PageId,
    pub title: String,
    pub url: String,
    pub section_anchor: Option<String>,
    pub snippet: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(space: &str, labels: &[&str], updated_at: DateTime<Utc>) -> Chunk {
        Chunk {
            id: ChunkId::new(),
            page_id: PageId::new("p1"),
            space: space.into(),
            title: "T".into(),
            section_anchor: Some("intro".into()),
            text: "hello world".into(),
            version: 1,
            updated_at,
            labels: labels.iter().map(|s| s.to_string()).collect(),
            vector: vec![0.1, 0.2],
            url: None,
            indexed_at: updated_at,
            metadata: ChunkMetadata::default(),
        }
    }

    #[test]
    fn filters_and_together() {
        let now = Utc::now();
        let c = chunk("ENG", &["runbook"], now);
        let f = Filters {
            space: Some("ENG".into()),
            labels: Some(["runbook".into()].into()),
            updated_after: None,
        };
        assert!(f.matches_chunk(&c));

        let f_wrong_space = Filters {
            space: Some("OPS".into()),
            ..Default::default()
        };
        assert!(!f_wrong_space.matches_chunk(&c));
    }

    #[test]
    fn filters_labels_are_any_of() {
        let now = Utc::now();
        let c = chunk("ENG", &["runbook", "oncall"], now);
        let f = Filters {
            labels: Some(["oncall".into(), "postmortem".into()].into()),
            ..Default::default()
        };
        assert!(f.matches_chunk(&c));

        let f_none_match = Filters {
            labels: Some(["postmortem".into()].into()),
            ..Default::default()
        };
        assert!(!f_none_match.matches_chunk(&c));
    }

    #[test]
    fn page_state_detects_noop() {
        let now = Utc::now();
        let state = PageState {
            page_id: PageId::new("p1"),
            space: "ENG".into(),
            title: "T".into(),
            version: 3,
            updated_at: now,
            content_hash: "abc".into(),
            last_indexed_at: now,
            url: None,
        };
        assert!(state.is_up_to_date(3, "abc"));
        assert!(!state.is_up_to_date(4, "abc"));
        assert!(!state.is_up_to_date(3, "def"));
    }

    #[test]
    fn dedup_key_uses_first_100_chars() {
        let now = Utc::now();
        let mut c = chunk("ENG", &[], now);
        c.text = "a".repeat(150);
        let (_, _, key_text) = c.dedup_key();
        assert_eq!(key_text.len(), 100);
    }
}
