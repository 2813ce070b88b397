//! The four retrieval strategies named in the system overview, built from
//! the shared scoring/dedup/mmr/citation stages.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use chunk_model::{Chunk, Filters, PageId};
use chunking_store::{LocalDocStore, ScoredChunk, VectorStore};
use embedding_provider::Embedder;

use crate::citations::{build_citations, dedup_for_display};
use crate::collaborators::{ChatMessage, ChatOptions, DocumentAnalyzer, IntentProcessor, LlmCollaborator};
use crate::dedup::dedup_candidates;
use crate::mmr::mmr_select;
use crate::scoring::{adaptive_threshold, blended_score, keyword_relevance_score, passes_threshold, rerank_score};
use crate::{per_document_cap, RetrievalOutcome, RetrievalRequest, Retriever, RetrieverConfig, RetrieverError, StalePage};

fn dense_search<E: Embedder + ?Sized>(
    embedder: &E,
    vector_store: &VectorStore,
    query: &str,
    filters: &Filters,
    k: usize,
) -> Result<Vec<ScoredChunk>, RetrieverError> {
    let vector = embedder.embed(query)?;
    Ok(vector_store.search_similar(&vector, filters, k)?)
}

fn stale_pages_from(chunks: &[ScoredChunk], ttl_days: i64) -> Vec<StalePage> {
    let now = Utc::now();
    let mut seen = HashSet::new();
    chunks
        .iter()
        .filter(|sc| (now - sc.chunk.indexed_at).num_days() >= ttl_days)
        .filter_map(|sc| seen.insert(sc.chunk.page_id.clone()).then(|| StalePage { page_id: sc.chunk.page_id.clone() }))
        .collect()
}

fn finish(selected: Vec<ScoredChunk>, base_url: &str, ttl_days: i64) -> RetrievalOutcome {
    if selected.is_empty() {
        return RetrievalOutcome::empty();
    }
    let stale_pages = stale_pages_from(&selected, ttl_days);
    let chunks: Vec<Chunk> = selected.into_iter().map(|sc| sc.chunk).collect();
    let citations = build_citations(&chunks, base_url);
    let (display_citations, citation_index_map) = dedup_for_display(&citations);
    RetrievalOutcome {
        chunks,
        citations,
        display_citations: Some(display_citations),
        citation_index_map: Some(citation_index_map),
        stale_pages,
    }
}

/// Steps 3, 5, 12 only: dense search, dedup, citations. No threshold gate,
/// no rerank, no MMR, fixed K.
pub struct BasicRetriever<E: Embedder> {
    vector_store: Arc<VectorStore>,
    embedder: Arc<E>,
    config: RetrieverConfig,
}

impl<E: Embedder> BasicRetriever<E> {
    pub fn new(vector_store: Arc<VectorStore>, embedder: Arc<E>, config: RetrieverConfig) -> Self {
        Self { vector_store, embedder, config }
    }
}

#[async_trait]
impl<E: Embedder> Retriever for BasicRetriever<E> {
    async fn retrieve(&self, request: &RetrievalRequest) -> Result<RetrievalOutcome, RetrieverError> {
        if request.top_k == 0 {
            return Ok(RetrievalOutcome::empty());
        }
        let candidates = dense_search(self.embedder.as_ref(), &self.vector_store, &request.primary_query, &request.filters, request.top_k)?;
        let mut selected = dedup_candidates(candidates);
        selected.truncate(request.top_k);
        Ok(finish(selected, &self.config.base_url, self.config.chunk_ttl_days))
    }
}

/// Dense-only, no expansion, no MMR, fixed K, but still runs threshold
/// gating and rerank — the low-variance strategy.
pub struct StableRetriever<E: Embedder> {
    vector_store: Arc<VectorStore>,
    embedder: Arc<E>,
    config: RetrieverConfig,
}

impl<E: Embedder> StableRetriever<E> {
    pub fn new(vector_store: Arc<VectorStore>, embedder: Arc<E>, config: RetrieverConfig) -> Self {
        Self { vector_store, embedder, config }
    }
}

#[async_trait]
impl<E: Embedder> Retriever for StableRetriever<E> {
    async fn retrieve(&self, request: &RetrievalRequest) -> Result<RetrievalOutcome, RetrieverError> {
        if request.top_k == 0 {
            return Ok(RetrievalOutcome::empty());
        }
        let candidate_k = (request.top_k * self.config.mmr_pool_multiplier).clamp(self.config.min_k, self.config.max_candidates);
        let candidates = dense_search(self.embedder.as_ref(), &self.vector_store, &request.primary_query, &request.filters, candidate_k)?;
        let candidates = dedup_candidates(candidates);
        if candidates.is_empty() {
            return Ok(RetrievalOutcome::empty());
        }

        let max_score = candidates.iter().map(|c| c.score).fold(f32::MIN, f32::max);
        let threshold = adaptive_threshold(self.config.relevance_threshold, max_score, self.config.adaptive_threshold);
        if !passes_threshold(max_score, threshold) {
            return Ok(RetrievalOutcome::empty());
        }

        let now = Utc::now();
        let mut reranked: Vec<ScoredChunk> = candidates
            .into_iter()
            .map(|mut sc| {
                sc.score = rerank_score(sc.score, &sc.chunk, now, self.config.enable_temporal_scoring, self.config.temporal_weight, self.config.metadata_boosts);
                sc
            })
            .collect();
        reranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        reranked.truncate(request.top_k);

        Ok(finish(reranked, &self.config.base_url, self.config.chunk_ttl_days))
    }
}

/// The full multi-stage control flow, with optional HyDE,
/// query expansion, compression, lexical floor, and per-document cap.
pub struct AdvancedRetriever<E: Embedder> {
    vector_store: Arc<VectorStore>,
    embedder: Arc<E>,
    config: RetrieverConfig,
    llm: Option<Arc<dyn LlmCollaborator>>,
    intent: Option<Arc<dyn IntentProcessor>>,
}

impl<E: Embedder> AdvancedRetriever<E> {
    pub fn new(vector_store: Arc<VectorStore>, embedder: Arc<E>, config: RetrieverConfig) -> Self {
        Self { vector_store, embedder, config, llm: None, intent: None }
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmCollaborator>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_intent_processor(mut self, intent: Arc<dyn IntentProcessor>) -> Self {
        self.intent = Some(intent);
        self
    }

    async fn retrieve_for_query(&self, query: &str, filters: &Filters, top_k: usize) -> Result<Vec<ScoredChunk>, RetrieverError> {
        // Step 3: dense search.
        let candidate_k = (top_k * self.config.mmr_pool_multiplier).clamp(self.config.min_k, self.config.max_candidates);
        let mut candidates = dense_search(self.embedder.as_ref(), &self.vector_store, query, filters, candidate_k)?;

        // Step 4: expanded search.
        if self.config.enable_query_expansion {
            if let Some(intent) = &self.intent {
                let variants = intent.expand_query(query, self.config.max_query_variants).await;
                let expanded_k = (candidate_k / 2).max(1);
                for variant in variants {
                    let mut expanded = dense_search(self.embedder.as_ref(), &self.vector_store, &variant, filters, expanded_k)?;
                    for sc in &mut expanded {
                        sc.score *= self.config.expansion_weight;
                    }
                    candidates.extend(expanded);
                }
            }
        }

        // Step 5: dedup.
        let candidates = dedup_candidates(candidates);
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        // Step 6: thresholding.
        let max_score = candidates.iter().map(|c| c.score).fold(f32::MIN, f32::max);
        let threshold = adaptive_threshold(self.config.relevance_threshold, max_score, self.config.adaptive_threshold);
        if !passes_threshold(max_score, threshold) {
            return Ok(Vec::new());
        }

        // Step 7: rerank (temporal decay + metadata boosts; no cross-encoder wired up).
        let now = Utc::now();
        let mut reranked: Vec<ScoredChunk> = candidates
            .into_iter()
            .map(|mut sc| {
                sc.score = rerank_score(sc.score, &sc.chunk, now, self.config.enable_temporal_scoring, self.config.temporal_weight, self.config.metadata_boosts);
                sc
            })
            .collect();
        reranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        // Step 8: MMR.
        let mut selected = if self.config.enable_mmr {
            mmr_select(reranked, self.config.mmr_lambda, top_k)
        } else {
            reranked.into_iter().take(top_k).collect()
        };

        // Step 9: optional compression.
        if self.config.enable_contextual_compression {
            for sc in &mut selected {
                if let Some(compressed) = crate::compression::compress(&sc.chunk.text, query, self.config.compression_threshold) {
                    sc.chunk.text = compressed;
                }
            }
        }

        // Step 10: lexical floor.
        if self.config.min_keyword_score > 0.0 {
            selected.retain(|sc| keyword_relevance_score(query, &sc.chunk) >= self.config.min_keyword_score);
        }
        for sc in &mut selected {
            let lexical = keyword_relevance_score(query, &sc.chunk);
            sc.score = blended_score(sc.score, lexical);
        }
        selected.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        // Step 11: per-document cap.
        if self.config.per_doc_cap_enabled {
            let cap = per_document_cap(top_k);
            let mut per_page_counts: HashMap<PageId, usize> = HashMap::new();
            selected.retain(|sc| {
                let count = per_page_counts.entry(sc.chunk.page_id.clone()).or_insert(0);
                *count += 1;
                *count <= cap
            });
        }

        selected.truncate(top_k);
        Ok(selected)
    }
}

#[async_trait]
impl<E: Embedder> Retriever for AdvancedRetriever<E> {
    async fn retrieve(&self, request: &RetrievalRequest) -> Result<RetrievalOutcome, RetrieverError> {
        if request.top_k == 0 {
            return Ok(RetrievalOutcome::empty());
        }

        // Step 1: query variants, bounded by maxFallbackQueries.
        let mut queries = vec![request.primary_query.clone()];
        queries.extend(request.variants.iter().cloned());
        queries.truncate(self.config.max_fallback_queries.max(1));

        // Step 2: HyDE, inserted as an extra query to try.
        if self.config.enable_hyde {
            if let Some(llm) = &self.llm {
                let hyde_doc = llm
                    .chat(
                        &[
                            ChatMessage::system("Write a short hypothetical document that would answer the question."),
                            ChatMessage::user(request.primary_query.clone()),
                        ],
                        &ChatOptions::default(),
                    )
                    .await?;
                queries.push(hyde_doc);
            }
        }

        let mut selected = Vec::new();
        for query in &queries {
            let result = self.retrieve_for_query(query, &request.filters, request.top_k).await?;
            if !result.is_empty() {
                selected = result;
                break;
            }
        }

        Ok(finish(selected, &self.config.base_url, self.config.chunk_ttl_days))
    }
}

/// Consults a document analyzer over a broad keyword search before any
/// embedding happens; falls back to dense-only retrieval if the analyzer
/// errors. Threshold gating still applies to the analyzer's own output.
pub struct SmartRetriever<E: Embedder> {
    analyzer: Arc<dyn DocumentAnalyzer>,
    doc_store: Arc<LocalDocStore>,
    fallback: BasicRetriever<E>,
    config: RetrieverConfig,
    broad_candidate_limit: usize,
}

impl<E: Embedder> SmartRetriever<E> {
    pub fn new(
        analyzer: Arc<dyn DocumentAnalyzer>,
        doc_store: Arc<LocalDocStore>,
        vector_store: Arc<VectorStore>,
        embedder: Arc<E>,
        config: RetrieverConfig,
    ) -> Self {
        let fallback = BasicRetriever::new(vector_store, embedder, config.clone());
        Self { analyzer, doc_store, fallback, config, broad_candidate_limit: 50 }
    }
}

#[async_trait]
impl<E: Embedder> Retriever for SmartRetriever<E> {
    async fn retrieve(&self, request: &RetrievalRequest) -> Result<RetrievalOutcome, RetrieverError> {
        if request.top_k == 0 {
            return Ok(RetrievalOutcome::empty());
        }

        let broad_candidates = self.doc_store.query_candidates(&request.primary_query, &request.filters, self.broad_candidate_limit);
        if broad_candidates.is_empty() {
            return self.fallback.retrieve(request).await;
        }

        let page_ids: Vec<PageId> = broad_candidates.iter().map(|c| c.page.id.clone()).collect();
        let pages_by_id: HashMap<PageId, _> = broad_candidates.into_iter().map(|c| (c.page.id.clone(), c.page)).collect();

        let relevances = match self.analyzer.analyze(&request.primary_query, &page_ids).await {
            Ok(r) => r,
            Err(_) => return self.fallback.retrieve(request).await,
        };

        let mut synthetic: Vec<ScoredChunk> = Vec::new();
        for relevance in relevances {
            let Some(page) = pages_by_id.get(&relevance.page_id) else { continue };
            for passage in &relevance.passages {
                synthetic.push(ScoredChunk {
                    chunk: Chunk {
                        id: chunk_model::ChunkId::new(),
                        page_id: page.id.clone(),
                        space: page.space.clone(),
                        title: page.title.clone(),
                        section_anchor: None,
                        text: passage.clone(),
                        version: page.version,
                        updated_at: page.updated_at,
                        labels: page.labels.clone(),
                        vector: Vec::new(),
                        url: page.url.clone(),
                        indexed_at: page.updated_at,
                        metadata: chunk_model::ChunkMetadata::default(),
                    },
                    score: relevance.relevance,
                });
            }
        }

        if synthetic.is_empty() {
            return Ok(RetrievalOutcome::empty());
        }

        let max_score = synthetic.iter().map(|c| c.score).fold(f32::MIN, f32::max);
        let threshold = adaptive_threshold(self.config.relevance_threshold, max_score, self.config.adaptive_threshold);
        if !passes_threshold(max_score, threshold) {
            return Ok(RetrievalOutcome::empty());
        }

        synthetic.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        synthetic.truncate(request.top_k);

        Ok(finish(synthetic, &self.config.base_url, self.config.chunk_ttl_days))
    }
}
