//! Single nested configuration struct plus named presets. Each subtree maps onto the concrete config type its
//! component already owns (`ChunkerConfig`, `RetrieverConfig`,
//! `VectorStoreConfig`); fields with no direct component counterpart
//! (`enableQualityMetrics`, `processingTimeout`, ...) are read directly by
//! [`crate::orchestrator::PipelineOrchestrator`].

use std::path::PathBuf;
use std::time::Duration;

use chunking_store::VectorStoreConfig;
use retriever::{MetadataBoosts, RetrieverConfig, DEFAULT_RELEVANCE_THRESHOLD};
use wiki_chunker::ChunkerConfig;

/// Which [`retriever::Retriever`] implementation the pipeline wires up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalStrategy {
    Basic,
    Advanced,
    Smart,
    Stable,
}

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub target_chunk_size: usize,
    pub overlap: usize,
    pub max_chunk_size: usize,
    pub semantic_threshold: f32,
    pub min_chunk_words: usize,
    pub max_chunk_words: usize,
    pub context_window: usize,
    pub preserve_structure: bool,
    pub enable_hierarchical: bool,
}

impl ChunkingConfig {
    pub fn to_chunker_config(&self) -> ChunkerConfig {
        ChunkerConfig {
            min_words: self.min_chunk_words,
            max_words: self.max_chunk_words,
            overlap_words: self.overlap,
            context_window: self.context_window,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub dense_weight: f32,
    pub sparse_weight: f32,
    pub enable_sparse_embeddings: bool,
    pub enable_query_expansion: bool,
    pub max_query_variants: usize,
    pub enable_title_weighting: bool,
    pub title_weight: usize,
    pub enable_metadata_embedding: bool,
    pub context_window_size: usize,
    pub include_hierarchical_context: bool,
}

#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub strategy: RetrievalStrategy,
    pub relevance_threshold: f32,
    pub adaptive_threshold: bool,
    pub enable_two_stage_retrieval: bool,
    pub initial_k: usize,
    pub final_k: usize,
    pub min_k: usize,
    pub max_candidates: usize,
    pub max_fallback_queries: usize,
    pub enable_hyde: bool,
    pub enable_contextual_compression: bool,
    pub compression_threshold: f32,
    pub enable_mmr: bool,
    pub mmr_lambda: f32,
    pub enable_temporal_scoring: bool,
    pub temporal_weight: f32,
    pub enable_metadata_filtering: bool,
    pub metadata_boosts: MetadataBoosts,
    pub enable_cross_encoder_rerank: bool,
    pub min_keyword_score: f32,
    pub per_doc_cap_enabled: bool,
}

impl RetrievalConfig {
    pub fn to_retriever_config(&self, base_url: String, chunk_ttl_days: i64) -> RetrieverConfig {
        RetrieverConfig {
            relevance_threshold: self.relevance_threshold,
            adaptive_threshold: self.adaptive_threshold,
            mmr_pool_multiplier: if self.enable_two_stage_retrieval { (self.initial_k / self.final_k.max(1)).max(1) } else { 4 },
            min_k: self.min_k,
            max_candidates: self.max_candidates,
            max_fallback_queries: self.max_fallback_queries,
            max_query_variants: self.max_fallback_queries,
            expansion_weight: 0.5,
            enable_query_expansion: matches!(self.strategy, RetrievalStrategy::Advanced),
            enable_hyde: self.enable_hyde,
            enable_mmr: self.enable_mmr,
            mmr_lambda: self.mmr_lambda,
            enable_temporal_scoring: self.enable_temporal_scoring,
            temporal_weight: self.temporal_weight,
            metadata_boosts: self.metadata_boosts,
            enable_contextual_compression: self.enable_contextual_compression,
            compression_threshold: self.compression_threshold,
            min_keyword_score: self.min_keyword_score,
            per_doc_cap_enabled: self.per_doc_cap_enabled,
            base_url,
            chunk_ttl_days,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VectorStoreSectionConfig {
    pub db_path: PathBuf,
    pub hnsw_dir: PathBuf,
    pub dimension: usize,
    pub enable_adaptive_k: bool,
    pub min_k: usize,
    pub max_k: usize,
    pub adaptive_threshold: bool,
    pub enable_hybrid_search: bool,
    pub dense_weight: f32,
    pub sparse_weight: f32,
    pub enable_batching: bool,
    pub batch_size: usize,
    pub enable_caching: bool,
    pub cache_size: usize,
    pub max_elements: usize,
    pub indexed_metadata_fields: Vec<String>,
    pub enable_multiple_spaces: bool,
    pub strict_schema: bool,
}

impl VectorStoreSectionConfig {
    pub fn to_vector_store_config(&self) -> VectorStoreConfig {
        let mut cfg = VectorStoreConfig::new(self.db_path.clone(), self.hnsw_dir.clone(), self.dimension);
        cfg.max_elements = self.max_elements;
        cfg.cache_size = if self.enable_caching { self.cache_size } else { 0 };
        cfg.strict_schema = self.strict_schema;
        cfg
    }
}

#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub enable_parallel_processing: bool,
    pub max_concurrent_embeddings: usize,
    pub processing_timeout: Duration,
    pub request_timeout: Duration,
    pub enable_quality_metrics: bool,
    pub min_chunk_quality_score: f32,
    pub enable_content_filtering: bool,
    pub chunk_ttl_days: i64,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub vector_store: VectorStoreSectionConfig,
    pub process: ProcessConfig,
}

impl PipelineConfig {
    /// `balanced` preset seeded with the install-specific paths/dimension.
    pub fn new(db_path: impl Into<PathBuf>, hnsw_dir: impl Into<PathBuf>, dimension: usize) -> Self {
        Self::balanced(db_path, hnsw_dir, dimension)
    }

    pub fn to_chunker_config(&self) -> ChunkerConfig {
        self.chunking.to_chunker_config()
    }

    pub fn to_retriever_config(&self) -> RetrieverConfig {
        self.retrieval.to_retriever_config(self.process.base_url.clone(), self.process.chunk_ttl_days)
    }

    pub fn to_vector_store_config(&self) -> VectorStoreConfig {
        self.vector_store.to_vector_store_config()
    }

    /// Favors throughput: larger batches, more concurrency, a smaller
    /// candidate pool, no optional LLM-backed stages.
    pub fn performance(db_path: impl Into<PathBuf>, hnsw_dir: impl Into<PathBuf>, dimension: usize) -> Self {
        let mut cfg = Self::balanced(db_path, hnsw_dir, dimension);
        cfg.process.enable_parallel_processing = true;
        cfg.process.max_concurrent_embeddings = 16;
        cfg.vector_store.enable_batching = true;
        cfg.vector_store.batch_size = 64;
        cfg.retrieval.initial_k = 30;
        cfg.retrieval.final_k = 5;
        cfg.retrieval.enable_contextual_compression = false;
        cfg.retrieval.enable_hyde = false;
        cfg
    }

    /// Favors answer quality over latency: wider candidate pool, query
    /// expansion, HyDE, compression, and cross-encoder rerank all on.
    pub fn quality(db_path: impl Into<PathBuf>, hnsw_dir: impl Into<PathBuf>, dimension: usize) -> Self {
        let mut cfg = Self::balanced(db_path, hnsw_dir, dimension);
        cfg.retrieval.strategy = RetrievalStrategy::Advanced;
        cfg.retrieval.enable_two_stage_retrieval = true;
        cfg.retrieval.initial_k = 80;
        cfg.retrieval.final_k = 8;
        cfg.retrieval.enable_hyde = true;
        cfg.retrieval.enable_contextual_compression = true;
        cfg.retrieval.enable_cross_encoder_rerank = true;
        cfg.retrieval.enable_temporal_scoring = true;
        cfg.embedding.enable_query_expansion = true;
        cfg.process.processing_timeout = Duration::from_secs(45);
        cfg
    }

    /// Favors lowest latency: the `basic` strategy, no expansion/MMR.
    pub fn speed(db_path: impl Into<PathBuf>, hnsw_dir: impl Into<PathBuf>, dimension: usize) -> Self {
        let mut cfg = Self::balanced(db_path, hnsw_dir, dimension);
        cfg.retrieval.strategy = RetrievalStrategy::Basic;
        cfg.retrieval.enable_mmr = false;
        cfg.retrieval.enable_contextual_compression = false;
        cfg.retrieval.enable_hyde = false;
        cfg.retrieval.initial_k = 10;
        cfg.retrieval.final_k = 5;
        cfg.process.processing_timeout = Duration::from_secs(10);
        cfg
    }

    /// The default: `advanced` strategy with moderate pool sizes and MMR on,
    /// optional stages off until a caller wires up their collaborators.
    pub fn balanced(db_path: impl Into<PathBuf>, hnsw_dir: impl Into<PathBuf>, dimension: usize) -> Self {
        Self {
            chunking: ChunkingConfig {
                target_chunk_size: 180,
                overlap: 20,
                max_chunk_size: 220,
                semantic_threshold: 0.5,
                min_chunk_words: 120,
                max_chunk_words: 220,
                context_window: 2,
                preserve_structure: true,
                enable_hierarchical: false,
            },
            embedding: EmbeddingConfig {
                dense_weight: 0.7,
                sparse_weight: 0.3,
                enable_sparse_embeddings: false,
                enable_query_expansion: false,
                max_query_variants: 3,
                enable_title_weighting: false,
                title_weight: 2,
                enable_metadata_embedding: false,
                context_window_size: 2,
                include_hierarchical_context: false,
            },
            retrieval: RetrievalConfig {
                strategy: RetrievalStrategy::Advanced,
                relevance_threshold: DEFAULT_RELEVANCE_THRESHOLD,
                adaptive_threshold: true,
                enable_two_stage_retrieval: false,
                initial_k: 40,
                final_k: 5,
                min_k: 10,
                max_candidates: 200,
                max_fallback_queries: 3,
                enable_hyde: false,
                enable_contextual_compression: false,
                compression_threshold: 0.3,
                enable_mmr: true,
                mmr_lambda: 0.5,
                enable_temporal_scoring: false,
                temporal_weight: 0.1,
                enable_metadata_filtering: true,
                metadata_boosts: MetadataBoosts::default(),
                enable_cross_encoder_rerank: false,
                min_keyword_score: 0.0,
                per_doc_cap_enabled: true,
            },
            vector_store: VectorStoreSectionConfig {
                db_path: db_path.into(),
                hnsw_dir: hnsw_dir.into(),
                dimension,
                enable_adaptive_k: true,
                min_k: 10,
                max_k: 200,
                adaptive_threshold: true,
                enable_hybrid_search: true,
                dense_weight: 0.7,
                sparse_weight: 0.3,
                enable_batching: true,
                batch_size: 16,
                enable_caching: true,
                cache_size: 128,
                max_elements: 200_000,
                indexed_metadata_fields: vec!["space".into(), "labels".into(), "updated_at".into()],
                enable_multiple_spaces: true,
                strict_schema: false,
            },
            process: ProcessConfig {
                enable_parallel_processing: true,
                max_concurrent_embeddings: 4,
                processing_timeout: Duration::from_secs(30),
                request_timeout: Duration::from_secs(15),
                enable_quality_metrics: false,
                min_chunk_quality_score: 0.0,
                enable_content_filtering: false,
                chunk_ttl_days: 30,
                base_url: String::new(),
            },
        }
    }

    /// Minimizes retrieval variance: the `stable` strategy, dense search
    /// only, no MMR or expansion.
    pub fn stable(db_path: impl Into<PathBuf>, hnsw_dir: impl Into<PathBuf>, dimension: usize) -> Self {
        let mut cfg = Self::balanced(db_path, hnsw_dir, dimension);
        cfg.retrieval.strategy = RetrievalStrategy::Stable;
        cfg.retrieval.enable_mmr = false;
        cfg.retrieval.enable_hyde = false;
        cfg.retrieval.enable_contextual_compression = false;
        cfg.retrieval.adaptive_threshold = false;
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_preset_uses_advanced_strategy() {
        let cfg = PipelineConfig::new("db", "hnsw", 32);
        assert_eq!(cfg.retrieval.strategy, RetrievalStrategy::Advanced);
        assert!(cfg.retrieval.enable_mmr);
    }

    #[test]
    fn speed_preset_picks_basic_strategy_and_short_timeout() {
        let cfg = PipelineConfig::speed("db", "hnsw", 32);
        assert_eq!(cfg.retrieval.strategy, RetrievalStrategy::Basic);
        assert!(!cfg.retrieval.enable_mmr);
    }

    #[test]
    fn stable_preset_disables_adaptive_threshold() {
        let cfg = PipelineConfig::stable("db", "hnsw", 32);
        assert_eq!(cfg.retrieval.strategy, RetrievalStrategy::Stable);
        assert!(!cfg.retrieval.adaptive_threshold);
    }

    #[test]
    fn vector_store_conversion_disables_cache_when_caching_is_off() {
        let mut cfg = PipelineConfig::new("db", "hnsw", 32);
        cfg.vector_store.enable_caching = false;
        assert_eq!(cfg.to_vector_store_config().cache_size, 0);
    }
}
