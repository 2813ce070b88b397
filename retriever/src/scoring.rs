//! Similarity, rerank, and thresholding math shared by every strategy.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use chunk_model::{Chunk, ChunkMetadata};

use crate::MetadataBoosts;

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Fallback similarity for candidates without vectors: token-set overlap.
pub fn jaccard_similarity(a: &str, b: &str) -> f32 {
    let ta = tokenize(a);
    let tb = tokenize(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let intersection = ta.intersection(&tb).count() as f32;
    let union = ta.union(&tb).count() as f32;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

/// `exp(-ageDays/365) * temporalWeight`.
pub fn temporal_decay(chunk: &Chunk, now: DateTime<Utc>, temporal_weight: f32) -> f32 {
    let age_days = chunk.age_days(now);
    (-age_days / 365.0).exp() * temporal_weight
}

/// Multiplicative boost `1 + boost` for each truthy metadata flag.
pub fn metadata_boost_multiplier(metadata: &ChunkMetadata, boosts: MetadataBoosts) -> f32 {
    let mut multiplier = 1.0;
    if metadata.has_code {
        multiplier *= 1.0 + boosts.has_code;
    }
    if metadata.has_tables {
        multiplier *= 1.0 + boosts.has_tables;
    }
    if metadata.has_lists {
        multiplier *= 1.0 + boosts.has_lists;
    }
    multiplier
}

/// Enhanced score blending dense similarity with temporal decay and
/// metadata boosts; the fallback used when no cross-encoder rerank is
/// wired up.
pub fn rerank_score(
    dense_score: f32,
    chunk: &Chunk,
    now: DateTime<Utc>,
    enable_temporal: bool,
    temporal_weight: f32,
    boosts: MetadataBoosts,
) -> f32 {
    let mut score = dense_score;
    if enable_temporal {
        score += temporal_decay(chunk, now, temporal_weight);
    }
    score * metadata_boost_multiplier(&chunk.metadata, boosts)
}

/// Term-overlap keyword relevance over `title + text`, used for the
/// lexical floor.
pub fn keyword_relevance_score(query: &str, chunk: &Chunk) -> f32 {
    let query_terms = tokenize(query);
    if query_terms.is_empty() {
        return 0.0;
    }
    let haystack = format!("{} {}", chunk.title, chunk.text);
    let doc_terms = tokenize(&haystack);
    if doc_terms.is_empty() {
        return 0.0;
    }
    let hits = query_terms.iter().filter(|t| doc_terms.contains(*t)).count();
    hits as f32 / query_terms.len() as f32
}

/// `0.3 * vector + 0.7 * lexical`.
pub fn blended_score(vector_score: f32, lexical_score: f32) -> f32 {
    0.3 * vector_score + 0.7 * lexical_score
}

/// `max(baseThreshold, 0.6 * maxScore)` when adaptive, else `baseThreshold`.
pub fn adaptive_threshold(base_threshold: f32, max_score: f32, adaptive: bool) -> f32 {
    if adaptive {
        base_threshold.max(0.6 * max_score)
    } else {
        base_threshold
    }
}

/// `maxScore < threshold - epsilon` gates an empty result.
pub const THRESHOLD_EPSILON: f32 = 1e-3;

pub fn passes_threshold(max_score: f32, threshold: f32) -> bool {
    max_score >= threshold - THRESHOLD_EPSILON
}
