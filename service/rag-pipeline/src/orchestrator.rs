//! `PipelineOrchestrator`: the single public façade that
//! composes `Chunker`, `Embedder`, `VectorStore`, `LocalDocStore`, and the
//! active `Retriever` strategy.

use std::sync::Arc;

use chunk_model::{Page, PageId};
use chunking_store::{LocalDocStore, StoreError, VectorStore};
use embedding_provider::{Embedder, EmbedderError};
use retriever::{
    AdvancedRetriever, BasicRetriever, DocumentAnalyzer, IntentProcessor, LlmCollaborator, RetrievalOutcome, RetrievalRequest,
    Retriever, RetrieverConfig, RetrieverError, SmartRetriever, StableRetriever,
};
use thiserror::Error;
use wiki_chunker::Chunker;

use crate::config::{PipelineConfig, RetrievalStrategy};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("vector store error: {0}")]
    Store(#[from] StoreError),
    #[error("embedder error: {0}")]
    Embed(#[from] EmbedderError),
    #[error("retrieval error: {0}")]
    Retrieve(#[from] RetrieverError),
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("retrieval strategy '{0:?}' requires a collaborator that was not supplied")]
    MissingCollaborator(RetrievalStrategy),
    #[error("retrieval exceeded processingTimeout")]
    Timeout,
}

/// External collaborators the `advanced`/`smart` strategies consult.
/// Left unset, `advanced` simply skips HyDE/expansion and `smart` cannot be
/// selected at all (see [`PipelineError::MissingCollaborator`]).
#[derive(Default, Clone)]
pub struct PipelineCollaborators {
    pub llm: Option<Arc<dyn LlmCollaborator>>,
    pub intent_processor: Option<Arc<dyn IntentProcessor>>,
    pub document_analyzer: Option<Arc<dyn DocumentAnalyzer>>,
}

fn build_retriever<E: Embedder + 'static>(
    strategy: RetrievalStrategy,
    vector_store: Arc<VectorStore>,
    doc_store: Arc<LocalDocStore>,
    embedder: Arc<E>,
    retriever_config: RetrieverConfig,
    collaborators: PipelineCollaborators,
) -> Result<Arc<dyn Retriever>, PipelineError> {
    match strategy {
        RetrievalStrategy::Basic => Ok(Arc::new(BasicRetriever::new(vector_store, embedder, retriever_config))),
        RetrievalStrategy::Stable => Ok(Arc::new(StableRetriever::new(vector_store, embedder, retriever_config))),
        RetrievalStrategy::Advanced => {
            let mut built = AdvancedRetriever::new(vector_store, embedder, retriever_config);
            if let Some(llm) = collaborators.llm {
                built = built.with_llm(llm);
            }
            if let Some(intent) = collaborators.intent_processor {
                built = built.with_intent_processor(intent);
            }
            Ok(Arc::new(built))
        }
        RetrievalStrategy::Smart => {
            let analyzer = collaborators
                .document_analyzer
                .ok_or(PipelineError::MissingCollaborator(RetrievalStrategy::Smart))?;
            Ok(Arc::new(SmartRetriever::new(analyzer, doc_store, vector_store, embedder, retriever_config)))
        }
    }
}

/// Batches chunk embedding the same way `ingest-worker` does; duplicated
/// rather than shared because the two crates batch under different error
/// types (`IngestError` vs `PipelineError`).
fn embed_chunks<E: Embedder>(embedder: &E, chunks: &mut [chunk_model::Chunk], batch_size: usize) -> Result<(), EmbedderError> {
    for batch in chunks.chunks_mut(batch_size.max(1)) {
        let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
        let vectors = embedder.embed_batch(&texts)?;
        for (chunk, vector) in batch.iter_mut().zip(vectors) {
            chunk.vector = vector;
        }
    }
    Ok(())
}

/// Crude proxy for `minChunkQualityScore`: a chunk long enough to carry
/// meaningful content scores higher, saturating at `targetWords`.
fn chunk_quality_score(chunk: &chunk_model::Chunk, target_words: usize) -> f32 {
    let words = chunk.text.split_whitespace().count();
    (words as f32 / target_words.max(1) as f32).min(1.0)
}

pub struct PipelineOrchestrator<E: Embedder, C: Chunker> {
    chunker: Arc<C>,
    embedder: Arc<E>,
    vector_store: Arc<VectorStore>,
    doc_store: Arc<LocalDocStore>,
    retriever: Arc<dyn Retriever>,
    config: PipelineConfig,
}

impl<E: Embedder + 'static, C: Chunker + 'static> PipelineOrchestrator<E, C> {
    pub fn new(config: PipelineConfig, chunker: Arc<C>, embedder: Arc<E>, collaborators: PipelineCollaborators) -> Result<Self, PipelineError> {
        let vector_store = Arc::new(VectorStore::open(config.to_vector_store_config())?);
        let doc_store = Arc::new(LocalDocStore::new());
        let retriever = build_retriever(
            config.retrieval.strategy,
            vector_store.clone(),
            doc_store.clone(),
            embedder.clone(),
            config.to_retriever_config(),
            collaborators,
        )?;
        Ok(Self { chunker, embedder, vector_store, doc_store, retriever, config })
    }

    pub fn vector_store(&self) -> &VectorStore {
        &self.vector_store
    }

    pub fn doc_store(&self) -> &LocalDocStore {
        &self.doc_store
    }

    /// `indexDocument(page, content)`: chunk → embed → upsertByPage → mirror
    /// in `LocalDocStore`. A no-op for empty/whitespace content or when
    /// every resulting chunk fails the (optional) quality filter.
    pub fn index_document(&self, page: &Page) -> Result<(), PipelineError> {
        if page.content.trim().is_empty() {
            return Ok(());
        }

        let mut chunks = self.chunker.chunk_page(page);
        if chunks.is_empty() {
            return Ok(());
        }

        if self.config.process.enable_content_filtering {
            let target_words = self.config.chunking.min_chunk_words;
            chunks.retain(|c| chunk_quality_score(c, target_words) >= self.config.process.min_chunk_quality_score);
            if chunks.is_empty() {
                return Ok(());
            }
        }

        embed_chunks(self.embedder.as_ref(), &mut chunks, self.config.vector_store.batch_size)?;

        self.vector_store.upsert_by_page(&page.id, &chunks)?;
        self.doc_store.upsert_all([page.clone()]);
        Ok(())
    }

    /// `deleteDocument(pageId)`: forward to both stores.
    pub fn delete_document(&self, page_id: &PageId) -> Result<usize, PipelineError> {
        let deleted = self.vector_store.delete_by_page_id(page_id)?;
        self.doc_store.remove_by_page_id(&page_id.0);
        Ok(deleted)
    }

    /// `retrieveForQuery(queries, filters, topK)`: validate the request
    /// contract, then delegate to the active strategy under
    /// `processingTimeout`.
    pub async fn retrieve_for_query(&self, request: &RetrievalRequest) -> Result<RetrievalOutcome, PipelineError> {
        if request.primary_query.trim().is_empty() {
            return Err(PipelineError::Validation("question must not be empty".into()));
        }
        if request.top_k == 0 || request.top_k > 100 {
            return Err(PipelineError::Validation(format!("topK must be in 1..=100, got {}", request.top_k)));
        }

        match tokio::time::timeout(self.config.process.processing_timeout, self.retriever.retrieve(request)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(PipelineError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;
    use embedding_provider::mock::MockEmbedder;
    use wiki_chunker::SimpleChunker;

    use super::*;

    fn page(id: &str, content: &str) -> Page {
        Page {
            id: PageId::new(id),
            title: "Deploys".into(),
            space: "ENG".into(),
            version: 1,
            labels: BTreeSet::new(),
            updated_at: Utc::now(),
            url: None,
            content: content.into(),
        }
    }

    fn pipeline(dir: &tempfile::TempDir) -> PipelineOrchestrator<MockEmbedder, SimpleChunker> {
        let config = PipelineConfig::speed(dir.path().join("chunks.db"), dir.path().join("hnsw"), 32);
        let embedder = Arc::new(MockEmbedder::with_dimension(32));
        let chunker = Arc::new(SimpleChunker::default());
        PipelineOrchestrator::new(config, chunker, embedder, PipelineCollaborators::default()).unwrap()
    }

    #[tokio::test]
    async fn index_then_retrieve_finds_the_indexed_page() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(&dir);
        let page = page("p1", "Restarting the deploy pipeline clears a stuck release.");
        pipeline.index_document(&page).unwrap();

        let request = RetrievalRequest::new("restart the deploy pipeline", 3);
        let outcome = pipeline.retrieve_for_query(&request).await.unwrap();
        assert!(!outcome.chunks.is_empty());
        assert_eq!(outcome.chunks.len(), outcome.citations.len());
        assert!(outcome.chunks.iter().all(|c| c.page_id == page.id));
    }

    #[tokio::test]
    async fn delete_document_empties_subsequent_search() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(&dir);
        let page = page("p1", "Runbook for restarting the deploy pipeline during an incident.");
        pipeline.index_document(&page).unwrap();
        pipeline.delete_document(&page.id).unwrap();

        let request = RetrievalRequest::new("restart the deploy pipeline", 3);
        let outcome = pipeline.retrieve_for_query(&request).await.unwrap();
        assert!(outcome.chunks.is_empty());
    }

    #[tokio::test]
    async fn empty_question_is_rejected_without_contacting_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(&dir);
        let request = RetrievalRequest::new("   ", 3);
        let err = pipeline.retrieve_for_query(&request).await.unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[tokio::test]
    async fn top_k_out_of_range_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(&dir);
        let request = RetrievalRequest::new("deploy", 200);
        let err = pipeline.retrieve_for_query(&request).await.unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }
}
