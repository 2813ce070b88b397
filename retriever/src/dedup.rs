//! Candidate deduplication: same `(pageId,
//! sectionAnchor, text[0:100])` key, keep the highest-scoring duplicate.

use std::collections::HashMap;

use chunking_store::ScoredChunk;

pub fn dedup_candidates(candidates: Vec<ScoredChunk>) -> Vec<ScoredChunk> {
    let mut best: HashMap<_, ScoredChunk> = HashMap::new();
    for candidate in candidates {
        let key = candidate.chunk.dedup_key();
        match best.get(&key) {
            Some(existing) if existing.score >= candidate.score => {}
            _ => {
                best.insert(key, candidate);
            }
        }
    }
    let mut out: Vec<ScoredChunk> = best.into_values().collect();
    out.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    out
}
