//! The wiki source contract: page search, page fetch, space
//! enumeration. Out of scope for this core beyond its interface — the HTTP
//! client living behind it is someone else's crate.

use async_trait::async_trait;
use chunk_model::Page;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WikiSourceError {
    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub query: Option<String>,
    pub space: Option<String>,
    pub labels: Option<Vec<String>>,
    pub updated_after: Option<chrono::DateTime<chrono::Utc>>,
    pub limit: usize,
    pub start: usize,
}

#[derive(Debug, Clone)]
pub struct SearchResponse {
    pub documents: Vec<Page>,
    pub start: usize,
    pub limit: usize,
    pub total: usize,
}

#[async_trait]
pub trait WikiSource: Send + Sync {
    async fn search_documents(&self, query: &SearchQuery) -> Result<SearchResponse, WikiSourceError>;
    async fn get_document_by_id(&self, id: &str) -> Result<Page, WikiSourceError>;
    async fn list_pages_by_space(&self, space: &str, start: usize, limit: usize) -> Result<SearchResponse, WikiSourceError>;
    async fn list_all_space_keys(&self) -> Result<Vec<String>, WikiSourceError>;
}
