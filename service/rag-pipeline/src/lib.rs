//! Public entry point for the retrieval core: composes
//! `wiki-chunker`, `embedding-provider`, `chunking-store`, and `retriever`
//! behind a single [`PipelineOrchestrator`] driven by a [`PipelineConfig`].

pub mod config;
pub mod orchestrator;

pub use config::{
    ChunkingConfig, EmbeddingConfig, PipelineConfig, ProcessConfig, RetrievalConfig, RetrievalStrategy, VectorStoreSectionConfig,
};
pub use orchestrator::{PipelineCollaborators, PipelineError, PipelineOrchestrator};

pub use retriever::{RetrievalOutcome, RetrievalRequest};
