//! Maximal Marginal Relevance diversification.

use chunking_store::ScoredChunk;

use crate::scoring::{cosine_similarity, jaccard_similarity};

fn similarity(a: &ScoredChunk, b: &ScoredChunk) -> f32 {
    if !a.chunk.vector.is_empty() && !b.chunk.vector.is_empty() {
        cosine_similarity(&a.chunk.vector, &b.chunk.vector)
    } else {
        jaccard_similarity(&a.chunk.text, &b.chunk.text)
    }
}

/// Greedily selects up to `final_k` candidates maximizing
/// `lambda * relevance(c) - (1 - lambda) * max_similarity(c, selected)`.
/// `candidates` is consumed; ties are broken by original order, which makes
/// this idempotent given identical inputs and `lambda`.
pub fn mmr_select(candidates: Vec<ScoredChunk>, lambda: f32, final_k: usize) -> Vec<ScoredChunk> {
    if final_k == 0 || candidates.is_empty() {
        return Vec::new();
    }

    let mut pool = candidates;
    let mut selected: Vec<ScoredChunk> = Vec::with_capacity(final_k.min(pool.len()));

    while !pool.is_empty() && selected.len() < final_k {
        let mut best_index = 0;
        let mut best_value = f32::NEG_INFINITY;

        for (index, candidate) in pool.iter().enumerate() {
            let max_sim = selected
                .iter()
                .map(|s| similarity(candidate, s))
                .fold(0.0_f32, f32::max);
            let value = lambda * candidate.score - (1.0 - lambda) * max_sim;
            if value > best_value {
                best_value = value;
                best_index = index;
            }
        }

        selected.push(pool.remove(best_index));
    }

    selected
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;
    use chunk_model::{Chunk, ChunkId, ChunkMetadata, PageId};

    use super::*;

    fn chunk(page_id: &str, text: &str, vector: Vec<f32>, score: f32) -> ScoredChunk {
        let now = Utc::now();
        ScoredChunk {
            chunk: Chunk {
                id: ChunkId::new(),
                page_id: PageId::new(page_id),
                space: "ENG".into(),
                title: "T".into(),
                section_anchor: None,
                text: text.into(),
                version: 1,
                updated_at: now,
                labels: BTreeSet::new(),
                vector,
                url: None,
                indexed_at: now,
                metadata: ChunkMetadata::default(),
            },
            score,
        }
    }

    #[test]
    fn diversifies_away_from_near_duplicates() {
        let candidates = vec![
            chunk("A", "alpha one", vec![1.0, 0.0, 0.0], 0.95),
            chunk("A", "alpha two", vec![0.99, 0.01, 0.0], 0.93),
            chunk("A", "alpha three", vec![0.98, 0.02, 0.0], 0.92),
            chunk("B", "beta distinct", vec![0.0, 1.0, 0.0], 0.70),
        ];
        let selected = mmr_select(candidates, 0.5, 2);
        let page_ids: Vec<_> = selected.iter().map(|s| s.chunk.page_id.0.clone()).collect();
        assert!(page_ids.contains(&"B".to_string()), "expected MMR to surface the distinct chunk, got {page_ids:?}");
    }

    #[test]
    fn is_idempotent_given_same_inputs() {
        let candidates = vec![
            chunk("A", "one", vec![1.0, 0.0], 0.9),
            chunk("B", "two", vec![0.0, 1.0], 0.8),
        ];
        let first = mmr_select(candidates.clone(), 0.5, 2);
        let second = mmr_select(candidates, 0.5, 2);
        assert_eq!(
            first.iter().map(|s| s.chunk.id).collect::<Vec<_>>(),
            second.iter().map(|s| s.chunk.id).collect::<Vec<_>>()
        );
    }

    #[test]
    fn stops_at_final_k() {
        let candidates = vec![
            chunk("A", "one", vec![1.0, 0.0], 0.9),
            chunk("B", "two", vec![0.0, 1.0], 0.8),
            chunk("C", "three", vec![0.5, 0.5], 0.7),
        ];
        assert_eq!(mmr_select(candidates, 0.5, 1).len(), 1);
    }
}
