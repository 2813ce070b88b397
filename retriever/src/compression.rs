//! Optional contextual compression: keep only the
//! sentences of a surviving chunk whose token overlap with the query meets
//! `compressionThreshold`.

use std::collections::HashSet;

fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    for (index, byte) in bytes.iter().enumerate() {
        if matches!(byte, b'.' | b'!' | b'?') {
            let candidate = text[start..=index].trim();
            if !candidate.is_empty() {
                sentences.push(candidate);
            }
            start = index + 1;
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

fn overlap_ratio(query_terms: &HashSet<String>, sentence: &str) -> f32 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let sentence_terms = tokenize(sentence);
    let hits = query_terms.intersection(&sentence_terms).count();
    hits as f32 / query_terms.len() as f32
}

/// Returns the compressed text, or `None` when no sentence meets the
/// threshold (caller keeps the chunk unchanged in that case).
pub fn compress(text: &str, query: &str, threshold: f32) -> Option<String> {
    let query_terms = tokenize(query);
    let sentences = split_sentences(text);
    let kept: Vec<&str> = sentences
        .into_iter()
        .filter(|sentence| overlap_ratio(&query_terms, sentence) >= threshold)
        .collect();
    if kept.is_empty() {
        None
    } else {
        Some(kept.join(" "))
    }
}
