//! Embedding backends for the retrieval core.
//!
//! [`embedder`] holds the provider-facing [`embedder::Embedder`] trait and
//! its ONNX implementations; [`mock`] and [`retry`] are decorators used by
//! the rest of the workspace (tests reach for [`mock::MockEmbedder`] instead
//! of a real model, production callers wrap their provider in
//! [`retry::RetryingEmbedder`]); [`enhance`] builds the richer
//! [`chunk_model::EnhancedEmbedding`] used by `chunking-store`'s dense+sparse
//! index.

pub mod config;
pub mod embedder;
pub mod enhance;
pub mod mock;
pub mod retry;

pub use embedder::{Embedder, EmbedderError, EmbedderInfo, ProviderKind};
pub use enhance::{embed_enhanced, DocumentFrequencyTracker};
pub use mock::{MockEmbedder, MockEmbedderConfig};
pub use retry::{RetryPolicy, RetryingEmbedder};
