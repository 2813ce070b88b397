//! Turns a query into a ranked, diversified, cited set of chunks.
//!
//! [`strategies`] holds the four selectable retrieval strategies named in
//! the system overview (`basic`, `advanced`, `smart`, `stable`); the other
//! modules are the stages an `advanced` retrieval strings together:
//! [`dedup`], [`scoring`] (thresholding, temporal/metadata rerank, lexical
//! floor), [`mmr`], [`compression`], and [`citations`].

pub mod citations;
pub mod collaborators;
pub mod compression;
pub mod dedup;
pub mod mmr;
pub mod scoring;
pub mod strategies;

pub use collaborators::{ChatMessage, ChatOptions, DocumentAnalyzer, DocumentRelevance, IntentProcessor, LlmCollaborator};
pub use strategies::{AdvancedRetriever, BasicRetriever, SmartRetriever, StableRetriever};

use async_trait::async_trait;
use chunk_model::{Chunk, Citation, Filters};
use thiserror::Error;

/// The most permissive of the defaults seen in practice for general
/// queries: 0.2 rather than 0.05 or 0.5.
pub const DEFAULT_RELEVANCE_THRESHOLD: f32 = 0.2;

#[derive(Debug, Error)]
pub enum RetrieverError {
    #[error("embedder error: {0}")]
    Embed(#[from] embedding_provider::EmbedderError),
    #[error("vector store error: {0}")]
    Store(#[from] chunking_store::StoreError),
    #[error("collaborator call failed: {0}")]
    Collaborator(String),
    #[error("invalid request: {0}")]
    Validation(String),
}

/// Tuning knobs for every stage of an `advanced` retrieval; `basic` and
/// `stable` read only the subset their reduced control flow uses.
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    pub relevance_threshold: f32,
    pub adaptive_threshold: bool,
    pub mmr_pool_multiplier: usize,
    pub min_k: usize,
    pub max_candidates: usize,
    pub max_fallback_queries: usize,
    pub max_query_variants: usize,
    pub expansion_weight: f32,
    pub enable_query_expansion: bool,
    pub enable_hyde: bool,
    pub enable_mmr: bool,
    pub mmr_lambda: f32,
    pub enable_temporal_scoring: bool,
    pub temporal_weight: f32,
    pub metadata_boosts: MetadataBoosts,
    pub enable_contextual_compression: bool,
    pub compression_threshold: f32,
    pub min_keyword_score: f32,
    pub per_doc_cap_enabled: bool,
    pub base_url: String,
    pub chunk_ttl_days: i64,
}

/// Multiplicative boosts (`1 + boost`) applied per truthy chunk flag.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataBoosts {
    pub has_code: f32,
    pub has_tables: f32,
    pub has_lists: f32,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            relevance_threshold: DEFAULT_RELEVANCE_THRESHOLD,
            adaptive_threshold: true,
            mmr_pool_multiplier: 4,
            min_k: 10,
            max_candidates: 200,
            max_fallback_queries: 3,
            max_query_variants: 3,
            expansion_weight: 0.5,
            enable_query_expansion: false,
            enable_hyde: false,
            enable_mmr: true,
            mmr_lambda: 0.5,
            enable_temporal_scoring: false,
            temporal_weight: 0.1,
            metadata_boosts: MetadataBoosts::default(),
            enable_contextual_compression: false,
            compression_threshold: 0.3,
            min_keyword_score: 0.0,
            per_doc_cap_enabled: true,
            base_url: String::new(),
            chunk_ttl_days: 30,
        }
    }
}

/// `perDocCap = max(1, min(3, floor(topK/2)))`.
pub fn per_document_cap(top_k: usize) -> usize {
    (top_k / 2).clamp(1, 3)
}

/// A page whose chunks are due for a background refresh because their
/// `indexedAt` exceeds `chunkTtlDays`. `Retriever::retrieve` returns these
/// alongside the outcome; the caller decides how/when to actually reindex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StalePage {
    pub page_id: chunk_model::PageId,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalOutcome {
    pub chunks: Vec<Chunk>,
    pub citations: Vec<Citation>,
    pub display_citations: Option<Vec<Citation>>,
    pub citation_index_map: Option<Vec<usize>>,
    pub stale_pages: Vec<StalePage>,
}

impl RetrievalOutcome {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// A query plus the filters and size bound it's retrieved under.
#[derive(Debug, Clone)]
pub struct RetrievalRequest {
    pub primary_query: String,
    pub variants: Vec<String>,
    pub filters: Filters,
    pub top_k: usize,
}

impl RetrievalRequest {
    pub fn new(query: impl Into<String>, top_k: usize) -> Self {
        Self {
            primary_query: query.into(),
            variants: Vec::new(),
            filters: Filters::default(),
            top_k,
        }
    }
}

#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, request: &RetrievalRequest) -> Result<RetrievalOutcome, RetrieverError>;
}
