use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use chunk_model::{Chunk, ChunkId, ChunkMetadata, Filters, PageId};
use chunking_store::{VectorStore, VectorStoreConfig};
use embedding_provider::mock::MockEmbedder;
use embedding_provider::Embedder;
use retriever::{BasicRetriever, RetrievalRequest, Retriever, RetrieverConfig};

fn chunk(page_id: &str, space: &str, text: &str, vector: Vec<f32>) -> Chunk {
    let now = Utc::now();
    Chunk {
        id: ChunkId::new(),
        page_id: PageId::new(page_id),
        space: space.into(),
        title: "Database Design Principles".into(),
        section_anchor: Some("normalization".into()),
        text: text.into(),
        version: 1,
        updated_at: now,
        labels: BTreeSet::from(["runbook".to_string()]),
        vector,
        url: None,
        indexed_at: now,
        metadata: ChunkMetadata::default(),
    }
}

fn open_store(dir: &tempfile::TempDir, dim: usize) -> VectorStore {
    let config = VectorStoreConfig::new(dir.path().join("chunks.db"), dir.path().join("hnsw"), dim);
    VectorStore::open(config).unwrap()
}

#[tokio::test]
async fn basic_retriever_returns_matching_chunk_with_citation() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = Arc::new(MockEmbedder::with_dimension(16));
    let store = Arc::new(open_store(&dir, 16));

    let query_vector = embedder.embed("what is database normalization?").unwrap();
    let c = chunk("p1", "ENG", "normalization eliminates redundancy", query_vector);
    store.upsert_by_page(&c.page_id.clone(), std::slice::from_ref(&c)).unwrap();

    let mut config = RetrieverConfig::default();
    config.base_url = "https://wiki.example.com".into();
    let retriever = BasicRetriever::new(store, embedder, config);

    let request = RetrievalRequest::new("what is database normalization?", 3);
    let outcome = retriever.retrieve(&request).await.unwrap();

    assert_eq!(outcome.chunks.len(), 1);
    assert_eq!(outcome.chunks[0].page_id, c.page_id);
    assert_eq!(outcome.citations.len(), 1);
    assert!(outcome.citations[0].url.contains("#normalization"));
}

#[tokio::test]
async fn filters_restrict_results_to_matching_space() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = Arc::new(MockEmbedder::with_dimension(16));
    let store = Arc::new(open_store(&dir, 16));

    let vector = embedder.embed("runbook content").unwrap();
    let eng = chunk("p1", "ENG", "runbook content here", vector.clone());
    let ops = chunk("p2", "OPS", "runbook content here", vector);
    store.upsert_by_page(&eng.page_id.clone(), std::slice::from_ref(&eng)).unwrap();
    store.upsert_by_page(&ops.page_id.clone(), std::slice::from_ref(&ops)).unwrap();

    let retriever = BasicRetriever::new(store, embedder, RetrieverConfig::default());
    let mut request = RetrievalRequest::new("runbook content", 5);
    request.filters = Filters { space: Some("ENG".into()), ..Default::default() };

    let outcome = retriever.retrieve(&request).await.unwrap();
    assert!(outcome.chunks.iter().all(|c| c.space == "ENG"));
}

#[tokio::test]
async fn top_k_zero_returns_empty_without_querying_store() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = Arc::new(MockEmbedder::with_dimension(16));
    let store = Arc::new(open_store(&dir, 16));
    let retriever = BasicRetriever::new(store, embedder, RetrieverConfig::default());

    let outcome = retriever.retrieve(&RetrievalRequest::new("anything", 0)).await.unwrap();
    assert!(outcome.is_empty());
}
