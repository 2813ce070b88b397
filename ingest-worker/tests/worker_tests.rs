use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use chunk_model::{Page, PageId};
use chunking_store::{ChunkOrchestrator, LocalDocStore, VectorStore, VectorStoreConfig};
use embedding_provider::mock::MockEmbedder;
use ingest_worker::{CrawlerConfig, IngestWorker, SearchQuery, SearchResponse, StateStore, WikiSource, WikiSourceError};
use wiki_chunker::SimpleChunker;

struct StaticWikiSource {
    pages: HashMap<String, Page>,
    space: String,
}

impl StaticWikiSource {
    fn new(pages: Vec<Page>, space: &str) -> Self {
        Self {
            pages: pages.into_iter().map(|p| (p.id.0.clone(), p)).collect(),
            space: space.to_string(),
        }
    }
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
        title: "Runbook".into(),
        space: "ENG".into(),
        version: 1,
        labels: BTreeSet::new(),
        updated_at: Utc::now(),
        url: None,
        content: content.into(),
    }
}

fn orchestrator(dir: &tempfile::TempDir) -> ChunkOrchestrator {
    let config = VectorStoreConfig::new(dir.path().join("chunks.db"), dir.path().join("hnsw"), 32);
    ChunkOrchestrator::new(VectorStore::open(config).unwrap(), LocalDocStore::new())
}

#[tokio::test]
async fn run_once_indexes_new_pages_and_skips_unchanged_ones() {
    let dir = tempfile::tempdir().unwrap();
    let wiki_source = Arc::new(StaticWikiSource::new(
        vec![page("p1", "Restart the deployment when pods crashloop repeatedly.")],
        "ENG",
    ));
    let orch = Arc::new(orchestrator(&dir));
    let embedder = Arc::new(MockEmbedder::with_dimension(32));
    let chunker = Arc::new(SimpleChunker::default());
    let state_store = Arc::new(StateStore::new(dir.path().join("ingest-state.json")));

    let worker = IngestWorker::new(wiki_source, orch.clone(), embedder, chunker, state_store);
    let config = CrawlerConfig { min_fetch_interval: Duration::from_millis(0), ..CrawlerConfig::default() };

    let first = worker.run_once(&config).await.unwrap();
    assert_eq!(first.processed_by_space.get("ENG").unwrap().processed, 1);
    assert!(orch.vector_store().stats(10).unwrap().count > 0);

    let second = worker.run_once(&config).await.unwrap();
    assert_eq!(second.processed_by_space.get("ENG").unwrap().skipped, 1);
    assert_eq!(second.processed_by_space.get("ENG").unwrap().processed, 0);
}
