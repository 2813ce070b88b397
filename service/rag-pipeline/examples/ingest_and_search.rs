use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use chunk_model::{Page, PageId};
use embedding_provider::mock::MockEmbedder;
use rag_pipeline::{PipelineCollaborators, PipelineConfig, PipelineOrchestrator, RetrievalRequest};
use wiki_chunker::SimpleChunker;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: cargo run -p rag-pipeline --example ingest_and_search -- <TEXT_FILE> <QUERY>");
        std::process::exit(1);
    }
    let file = &args[1];
    let query = &args[2];

    let config = PipelineConfig::balanced("target/demo/chunks.db", "target/demo/hnsw", 32);
    let embedder = Arc::new(MockEmbedder::with_dimension(32));
    let chunker = Arc::new(SimpleChunker::default());
    let pipeline = PipelineOrchestrator::new(config, chunker, embedder, PipelineCollaborators::default())?;

    let content = std::fs::read_to_string(file)?;
    let page = Page {
        id: PageId::new(file.as_str()),
        title: file.clone(),
        space: "DEMO".into(),
        version: 1,
        labels: BTreeSet::new(),
        updated_at: Utc::now(),
        url: None,
        content,
    };
    pipeline.index_document(&page)?;

    let request = RetrievalRequest::new(query.clone(), 5);
    let outcome = pipeline.retrieve_for_query(&request).await?;
    println!("Results: {}", outcome.chunks.len());
    for (i, (chunk, citation)) in outcome.chunks.iter().zip(outcome.citations.iter()).enumerate() {
        let preview: String = chunk.text.chars().take(80).collect();
        println!("{:>2}. [{}] {} — {}", i + 1, citation.url, preview, citation.snippet.as_deref().unwrap_or(""));
    }
    Ok(())
}
