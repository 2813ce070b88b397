//! Persistence layer for the wiki retrieval core: a cosine ANN index backed
//! by sqlite ([`vector_store`]), an in-memory lexical fallback
//! ([`local_doc_store`]), and [`orchestrator`] to keep the two in sync.

pub mod errors;
pub mod hnsw_index;
pub mod local_doc_store;
pub mod orchestrator;
pub mod vector_store;

pub use errors::StoreError;
pub use hnsw_index::HnswIndex;
pub use local_doc_store::{Candidate, LocalDocStore};
pub use orchestrator::ChunkOrchestrator;
pub use vector_store::{IndexStats, ScoredChunk, VectorStore, VectorStoreConfig};
