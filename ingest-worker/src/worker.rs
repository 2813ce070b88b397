//! Concurrent, rate-limited reconciliation of the vector index against the
//! wiki source.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use chunk_model::{Chunk, Page, PageState};
use chunking_store::ChunkOrchestrator;
use embedding_provider::{Embedder, EmbedderError};
use thiserror::Error;
use wiki_chunker::Chunker;

use crate::content_hash::content_hash;
use crate::rate_limiter::RateLimiter;
use crate::state::{IngestState, StateError, StateStore};
use crate::wiki_source::{SearchQuery, WikiSource, WikiSourceError};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("wiki source error: {0}")]
    WikiSource(#[from] WikiSourceError),
    #[error("state persistence error: {0}")]
    State(#[from] StateError),
    #[error("embedder failure aborted the tick: {0}")]
    EmbedderAborted(String),
}

#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    pub all_spaces: bool,
    pub spaces: Vec<String>,
    pub page_size: usize,
    pub max_pages_per_tick: usize,
    pub concurrency: usize,
    pub cron: Option<String>,
    pub min_fetch_interval: Duration,
    pub embed_batch_size: usize,
    pub embed_delay: Duration,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            all_spaces: true,
            spaces: Vec::new(),
            page_size: 50,
            max_pages_per_tick: 500,
            concurrency: 4,
            cron: None,
            min_fetch_interval: Duration::from_millis(100),
            embed_batch_size: 16,
            embed_delay: Duration::from_millis(0),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpaceReport {
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub processed_by_space: HashMap<String, SpaceReport>,
    pub aborted: bool,
}

pub struct IngestWorker<S: WikiSource, E: Embedder, C: Chunker> {
    wiki_source: Arc<S>,
    orchestrator: Arc<ChunkOrchestrator>,
    embedder: Arc<E>,
    chunker: Arc<C>,
    state_store: Arc<StateStore>,
}

impl<S: WikiSource + 'static, E: Embedder + 'static, C: Chunker + 'static> IngestWorker<S, E, C> {
    pub fn new(wiki_source: Arc<S>, orchestrator: Arc<ChunkOrchestrator>, embedder: Arc<E>, chunker: Arc<C>, state_store: Arc<StateStore>) -> Self {
        Self { wiki_source, orchestrator, embedder, chunker, state_store }
    }

    pub async fn run_once(&self, config: &CrawlerConfig) -> Result<TickReport, IngestError> {
        let spaces = if config.all_spaces {
            self.wiki_source.list_all_space_keys().await?
        } else {
            config.spaces.clone()
        };

        let state = Arc::new(Mutex::new(self.state_store.load()?));
        let rate_limiter = Arc::new(RateLimiter::new(config.min_fetch_interval));
        let semaphore = Arc::new(tokio::sync::Semaphore::new(config.concurrency.max(1)));
        let aborted = Arc::new(AtomicBool::new(false));
        let remaining_budget = Arc::new(AtomicUsize::new(config.max_pages_per_tick));

        let mut report = TickReport::default();

        for space in &spaces {
            let space_report = self
                .run_space(space, config, &state, &rate_limiter, &semaphore, &aborted, &remaining_budget)
                .await?;
            report.processed_by_space.insert(space.clone(), space_report);
            if aborted.load(Ordering::SeqCst) {
                break;
            }
        }

        report.aborted = aborted.load(Ordering::SeqCst);
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_space(
        &self,
        space: &str,
        config: &CrawlerConfig,
        state: &Arc<Mutex<IngestState>>,
        rate_limiter: &Arc<RateLimiter>,
        semaphore: &Arc<tokio::sync::Semaphore>,
        aborted: &Arc<AtomicBool>,
        remaining_budget: &Arc<AtomicUsize>,
    ) -> Result<SpaceReport, IngestError> {
        let mut report = SpaceReport::default();
        let mut start = 0;

        loop {
            if aborted.load(Ordering::SeqCst) || remaining_budget.load(Ordering::SeqCst) == 0 {
                break;
            }
            let page_size = config.page_size.min(100);
            let response = self.wiki_source.list_pages_by_space(space, start, page_size).await?;
            if response.documents.is_empty() {
                break;
            }

            let mut handles = Vec::new();
            for page in response.documents {
                if remaining_budget.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_err() {
                    break;
                }
                if aborted.load(Ordering::SeqCst) {
                    break;
                }

                let permit = semaphore.clone().acquire_owned().await.expect("semaphore not closed");
                rate_limiter.acquire().await;

                let wiki_source = self.wiki_source.clone();
                let chunker = self.chunker.clone();
                let embedder = self.embedder.clone();
                let orchestrator = self.orchestrator.clone();
                let state = state.clone();
                let aborted = aborted.clone();
                let embed_batch_size = config.embed_batch_size.max(1);
                let embed_delay = config.embed_delay;
                let page_id = page.id.0.clone();

                handles.push(tokio::spawn(async move {
                    let _permit = permit;
                    let result = process_page(&*wiki_source, &*chunker, &*embedder, &orchestrator, &page_id, embed_batch_size, embed_delay, &state).await;
                    if let Err(ProcessPageError::EmbedderFatal(message)) = &result {
                        tracing::error!(page_id = %page_id, error = %message, "embedder failure aborted the tick");
                        aborted.store(true, Ordering::SeqCst);
                    }
                    result
                }));
            }

            for handle in handles {
                match handle.await.expect("page task panicked") {
                    Ok(Outcome::Indexed) => report.processed += 1,
                    Ok(Outcome::UpToDate) => report.skipped += 1,
                    Err(ProcessPageError::EmbedderFatal(_)) => {
                        report.errors += 1;
                    }
                    Err(ProcessPageError::PageLevel(_)) => {
                        report.errors += 1;
                    }
                }
            }

            if aborted.load(Ordering::SeqCst) {
                break;
            }
            start += page_size;
            if response.documents.len() < page_size || start >= response.total {
                break;
            }
        }

        self.state_store.persist(&state.lock().expect("state lock poisoned"))?;
        Ok(report)
    }
}

enum Outcome {
    Indexed,
    UpToDate,
}

#[derive(Debug)]
enum ProcessPageError {
    /// Per-page integrity/transport failure; the tick continues.
    PageLevel(String),
    /// Batch-level fatal: the embedder itself is down.
    EmbedderFatal(String),
}

async fn process_page<S: WikiSource, E: Embedder, C: Chunker>(
    wiki_source: &S,
    chunker: &C,
    embedder: &E,
    orchestrator: &ChunkOrchestrator,
    page_id: &str,
    embed_batch_size: usize,
    embed_delay: Duration,
    state: &Arc<Mutex<IngestState>>,
) -> Result<Outcome, ProcessPageError> {
    let page = wiki_source
        .get_document_by_id(page_id)
        .await
        .map_err(|e| ProcessPageError::PageLevel(e.to_string()))?;

    let hash = content_hash(&page.content);
    let up_to_date = {
        let state = state.lock().expect("state lock poisoned");
        state
            .pages
            .get(&page.id.0)
            .map(|existing| existing.is_up_to_date(page.version, &hash))
            .unwrap_or(false)
    };
    if up_to_date {
        return Ok(Outcome::UpToDate);
    }

    let mut chunks = chunker.chunk_page(&page);
    if !chunks.is_empty() {
        embed_chunks(embedder, &mut chunks, embed_batch_size, embed_delay)
            .await
            .map_err(|e| ProcessPageError::EmbedderFatal(e.to_string()))?;
    }

    orchestrator
        .index_document(&page, &chunks)
        .map_err(|e| ProcessPageError::PageLevel(e.to_string()))?;

    let now = Utc::now();
    let new_state = PageState {
        page_id: page.id.clone(),
        space: page.space.clone(),
        title: page.title.clone(),
        version: page.version,
        updated_at: page.updated_at,
        content_hash: hash,
        last_indexed_at: now,
        url: page.url.clone(),
    };
    state.lock().expect("state lock poisoned").pages.insert(page.id.0.clone(), new_state);

    Ok(Outcome::Indexed)
}

async fn embed_chunks<E: Embedder>(embedder: &E, chunks: &mut [Chunk], batch_size: usize, delay: Duration) -> Result<(), EmbedderError> {
    for (batch_index, batch) in chunks.chunks_mut(batch_size).enumerate() {
        if batch_index > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
        let vectors = embedder.embed_batch(&texts)?;
        for (chunk, vector) in batch.iter_mut().zip(vectors) {
            chunk.vector = vector;
        }
    }
    Ok(())
}
