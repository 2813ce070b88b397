//! Builds [`EnhancedEmbedding`]s: a dense vector over title-weighted,
//! metadata-annotated text, plus a sparse TF·IDF-style term map.

use std::collections::BTreeMap;
use std::collections::HashMap;

use chunk_model::{EmbeddingLevel, EmbeddingMetadata, EnhancedEmbedding};

use crate::embedder::{Embedder, EmbedderError};

/// Tracks term document-frequency across everything indexed so far, so the
/// sparse weights in [`embed_enhanced`] reflect the corpus rather than a
/// single chunk in isolation.
#[derive(Debug, Clone, Default)]
pub struct DocumentFrequencyTracker {
    doc_freq: HashMap<String, u32>,
    doc_count: u32,
}

impl DocumentFrequencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one document's distinct terms against the running totals.
    pub fn observe(&mut self, tokens: &[String]) {
        self.doc_count += 1;
        let mut seen = std::collections::HashSet::new();
        for token in tokens {
            if seen.insert(token.clone()) {
                *self.doc_freq.entry(token.clone()).or_insert(0) += 1;
            }
        }
    }

    pub fn doc_freq(&self, term: &str) -> u32 {
        self.doc_freq.get(term).copied().unwrap_or(0)
    }

    pub fn doc_count(&self) -> u32 {
        self.doc_count
    }
}

/// Lowercases, splits on non-alphanumeric boundaries, and drops terms of
/// length <= 2.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(|t| t.to_lowercase())
        .filter(|t| t.len() > 2)
        .collect()
}

const SPARSE_SCORE_FLOOR: f32 = 0.01;

/// `tf(term) / (1 + ln(1 + doc_freq))`, floored at [`SPARSE_SCORE_FLOOR`].
fn term_weight(term_count: u32, total_terms: u32, doc_freq: u32) -> f32 {
    let tf = term_count as f32 / total_terms.max(1) as f32;
    let weight = tf / (1.0 + ((1.0 + doc_freq as f64).ln() as f32));
    weight.max(SPARSE_SCORE_FLOOR)
}

/// Builds the sparse term -> weight map for one document's tokens.
pub fn sparse_weights(tokens: &[String], freq: &DocumentFrequencyTracker) -> BTreeMap<String, f32> {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for token in tokens {
        *counts.entry(token.as_str()).or_insert(0) += 1;
    }
    let total = tokens.len() as u32;
    counts
        .into_iter()
        .map(|(term, count)| {
            let weight = term_weight(count, total, freq.doc_freq(term));
            (term.to_string(), weight)
        })
        .filter(|(_, weight)| *weight > SPARSE_SCORE_FLOOR || tokens.len() <= 1)
        .collect()
}

/// Produces an [`EnhancedEmbedding`] for one chunk.
///
/// `title` is repeated `title_weight` times ahead of the body so the dense
/// vector leans toward the document's subject; `metadata_hints` are rendered
/// as a single "Document features: a, b, c" line, matching how structural
/// flags (has_code, has_tables, ...) are expected to nudge the embedding.
pub fn embed_enhanced(
    embedder: &dyn Embedder,
    title: &str,
    text: &str,
    metadata_hints: &[String],
    level: EmbeddingLevel,
    freq: &DocumentFrequencyTracker,
    title_weight: usize,
) -> Result<EnhancedEmbedding, EmbedderError> {
    let mut prepared = String::new();
    for _ in 0..title_weight.max(1) {
        prepared.push_str(title);
        prepared.push('\n');
    }
    if !metadata_hints.is_empty() {
        prepared.push_str("Document features: ");
        prepared.push_str(&metadata_hints.join(", "));
        prepared.push('\n');
    }
    prepared.push_str(text);

    let dense = embedder.embed(&prepared)?;
    let tokens = tokenize(text);
    let sparse = sparse_weights(&tokens, freq);

    Ok(EnhancedEmbedding {
        dense,
        sparse,
        document: None,
        section: None,
        metadata: EmbeddingMetadata {
            level,
            has_context: !metadata_hints.is_empty(),
            token_count: tokens.len(),
            keywords: top_keywords(&tokens, 8),
        },
    })
}

fn top_keywords(tokens: &[String], limit: usize) -> Vec<String> {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for token in tokens {
        *counts.entry(token.as_str()).or_insert(0) += 1;
    }
    let mut ranked: Vec<(&str, u32)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked.into_iter().take(limit).map(|(t, _)| t.to_string()).collect()
}
