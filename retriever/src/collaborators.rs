//! External-collaborator contracts: the LLM client and the
//! intent/query-analysis step live outside the retrieval core. Strategies
//! depend on these traits, never on a concrete HTTP client, so the core
//! stays testable with stand-ins.

use async_trait::async_trait;
use chunk_model::PageId;

use crate::RetrieverError;

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: content.into() }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".into(), content: content.into() }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout_ms: Option<u64>,
}

/// The chat/HyDE half of the LLM contract. Streaming (`chatStream`) belongs
/// to the answer-generation surface, out of scope for retrieval.
#[async_trait]
pub trait LlmCollaborator: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage], opts: &ChatOptions) -> Result<String, RetrieverError>;
}

/// Generates synonym/question-form query variants, capped by the caller to
/// `maxQueryVariants`.
#[async_trait]
pub trait IntentProcessor: Send + Sync {
    async fn expand_query(&self, query: &str, max_variants: usize) -> Vec<String>;
}

#[derive(Debug, Clone)]
pub struct DocumentRelevance {
    pub page_id: PageId,
    pub relevance: f32,
    pub passages: Vec<String>,
}

/// The `smart` strategy's document analyzer: reads a broad keyword-search
/// candidate set and returns per-document relevance plus extracted
/// passages, before any embedding happens.
#[async_trait]
pub trait DocumentAnalyzer: Send + Sync {
    async fn analyze(&self, query: &str, candidate_page_ids: &[PageId]) -> Result<Vec<DocumentRelevance>, RetrieverError>;
}
