//! Exercises the realistic deployment shape: `ingest-worker` populates the
//! on-disk vector store, `PipelineOrchestrator` opens the same paths to
//! serve queries.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use chunk_model::{Page, PageId};
use chunking_store::{ChunkOrchestrator, LocalDocStore, VectorStore, VectorStoreConfig};
use embedding_provider::mock::MockEmbedder;
use ingest_worker::{CrawlerConfig, IngestWorker, SearchQuery, SearchResponse, StateStore, WikiSource, WikiSourceError};
use rag_pipeline::{PipelineCollaborators, PipelineConfig, PipelineOrchestrator, RetrievalRequest};
use wiki_chunker::SimpleChunker;

struct StaticWikiSource {
    pages: HashMap<String, Page>,
    space: String,
}

#[async_trait]
impl WikiSource for StaticWikiSource {
    async fn search_documents(&self, _query: &SearchQuery) -> Result<SearchResponse, WikiSourceError> {
        Ok(SearchResponse { documents: vec![], start: 0, limit: 0, total: 0 })
    }

    async fn get_document_by_id(&self, id: &str) -> Result<Page, WikiSourceError> {
        self.pages.get(id).cloned().ok_or_else(|| WikiSourceError::Transport(format!("unknown page {id}")))
    }

    async fn list_pages_by_space(&self, _space: &str, start: usize, limit: usize) -> Result<SearchResponse, WikiSourceError> {
        let all: Vec<Page> = self.pages.values().cloned().collect();
        let total = all.len();
        let documents = all.into_iter().skip(start).take(limit).collect();
        Ok(SearchResponse { documents, start, limit, total })
    }

    async fn list_all_space_keys(&self) -> Result<Vec<String>, WikiSourceError> {
        Ok(vec![self.space.clone()])
    }
}

fn page(id: &str, content: &str) -> Page {
    Page {
        id: PageId::new(id),
        title: "Incident Response".into(),
        space: "ENG".into(),
        version: 1,
        labels: ["runbook".to_string()].into(),
        updated_at: Utc::now(),
        url: Some(format!("https://wiki.example.com/{id}")),
        content: content.into(),
    }
}

#[tokio::test]
async fn queries_served_by_the_pipeline_see_what_the_ingest_worker_wrote() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("chunks.db");
    let hnsw_dir = dir.path().join("hnsw");

    let wiki_source = Arc::new(StaticWikiSource {
        pages: HashMap::from([("p1".to_string(), page("p1", "Escalate to the on-call engineer when a pod crashloops more than three times."))]),
        space: "ENG".into(),
    });
    let embedder = Arc::new(MockEmbedder::with_dimension(32));
    let chunker = Arc::new(SimpleChunker::default());

    {
        let vector_store = VectorStore::open(VectorStoreConfig::new(db_path.clone(), hnsw_dir.clone(), 32)).unwrap();
        let orch = Arc::new(ChunkOrchestrator::new(vector_store, LocalDocStore::new()));
        let state_store = Arc::new(StateStore::new(dir.path().join("ingest-state.json")));
        let worker = IngestWorker::new(wiki_source, orch, embedder.clone(), chunker.clone(), state_store);
        let config = CrawlerConfig { min_fetch_interval: std::time::Duration::from_millis(0), ..CrawlerConfig::default() };
        let report = worker.run_once(&config).await.unwrap();
        assert_eq!(report.processed_by_space.get("ENG").unwrap().processed, 1);
    }

    let config = PipelineConfig::balanced(db_path.clone(), hnsw_dir.clone(), 32);
    let pipeline = PipelineOrchestrator::new(config, chunker, embedder, PipelineCollaborators::default()).unwrap();

    let request = RetrievalRequest::new("what do I do when a pod crashloops", 3);
    let outcome = pipeline.retrieve_for_query(&request).await.unwrap();

    assert!(!outcome.chunks.is_empty());
    assert_eq!(outcome.chunks[0].page_id, PageId::new("p1"));
    assert!(outcome.citations[0].url.contains("wiki.example.com"));
}
