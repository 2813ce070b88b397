//! Deterministic test embedder.
//!
//! Generalizes the hash-based pseudo-embedding used by [`OnnxHttpEmbedder`]
//! into a standalone [`Embedder`] with no ONNX Runtime dependency, so
//! `chunking-store`, `retriever`, and `ingest-worker` can exercise their
//! logic without a real model on disk.

use crate::embedder::{compute_seed, DeterministicEmbedderCore, Embedder, EmbedderError, EmbedderInfo, ProviderKind};

/// Configuration for [`MockEmbedder`].
#[derive(Debug, Clone)]
pub struct MockEmbedderConfig {
    pub dimension: usize,
    pub max_input_length: usize,
    pub embedding_model_id: String,
    pub text_repr_version: String,
    /// Distinguishes otherwise-identical mock instances in the same process,
    /// so two `MockEmbedder`s never collide on the same text.
    pub seed_namespace: String,
}

impl Default for MockEmbedderConfig {
    fn default() -> Self {
        Self {
            dimension: 32,
            max_input_length: 8192,
            embedding_model_id: "mock-deterministic".into(),
            text_repr_version: "v1".into(),
            seed_namespace: "default".into(),
        }
    }
}

/// An embedder that hashes its input into a unit vector. Same text always
/// produces the same vector; different text almost never collides.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    core: DeterministicEmbedderCore,
}

impl MockEmbedder {
    pub fn new(config: MockEmbedderConfig) -> Result<Self, EmbedderError> {
        let info = EmbedderInfo {
            provider: ProviderKind::OnnxHttp,
            embedding_model_id: config.embedding_model_id.clone(),
            dimension: config.dimension,
            text_repr_version: config.text_repr_version.clone(),
        };
        let base_seed = compute_seed(
            ProviderKind::OnnxHttp,
            &config.seed_namespace,
            &config.embedding_model_id,
            &config.text_repr_version,
        );
        let core = DeterministicEmbedderCore::new(info, config.max_input_length, base_seed)?;
        Ok(Self { core })
    }

    /// Convenience constructor for tests that only care about dimension.
    pub fn with_dimension(dimension: usize) -> Self {
        Self::new(MockEmbedderConfig {
            dimension,
            ..Default::default()
        })
        .expect("non-zero dimension and max_input_length are always valid")
    }
}

impl Embedder for MockEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        self.core.embed(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        self.core.embed_batch(texts)
    }

    fn info(&self) -> &EmbedderInfo {
        self.core.info()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_same_vector() {
        let embedder = MockEmbedder::with_dimension(16);
        let a = embedder.embed("hybrid retrieval").unwrap();
        let b = embedder.embed("hybrid retrieval").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_text_different_vector() {
        let embedder = MockEmbedder::with_dimension(16);
        let a = embedder.embed("alpha").unwrap();
        let b = embedder.embed("beta").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn vectors_are_unit_length() {
        let embedder = MockEmbedder::with_dimension(24);
        let v = embedder.embed("unit length check").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn two_namespaces_diverge() {
        let a = MockEmbedder::new(MockEmbedderConfig {
            seed_namespace: "a".into(),
            ..Default::default()
        })
        .unwrap();
        let b = MockEmbedder::new(MockEmbedderConfig {
            seed_namespace: "b".into(),
            ..Default::default()
        })
        .unwrap();
        assert_ne!(a.embed("same text").unwrap(), b.embed("same text").unwrap());
    }
}
