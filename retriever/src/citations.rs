//! Citation construction and a display-dedup transform: the 1:1
//! `citations` list stays exactly co-indexed with `chunks`, while
//! `displayCitations`/`citationIndexMap` offer a deduped-by-page view for
//! callers that want to render one citation per source page.

use std::collections::HashMap;

use chunk_model::{Chunk, Citation};

const SNIPPET_MAX_CHARS: usize = 200;

fn resolve_url(chunk: &Chunk, base_url: &str) -> String {
    let base = match &chunk.url {
        Some(url) if url.starts_with("http://") || url.starts_with("https://") => url.clone(),
        Some(url) => format!("{}{}", base_url.trim_end_matches('/'), url),
        None => format!("{}/{}", base_url.trim_end_matches('/'), chunk.page_id.0),
    };
    match &chunk.section_anchor {
        Some(anchor) if !anchor.is_empty() => format!("{base}#{anchor}"),
        _ => base,
    }
}

fn snippet(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    if text.chars().count() <= SNIPPET_MAX_CHARS {
        return Some(text.to_string());
    }

    let truncated: String = text.chars().take(SNIPPET_MAX_CHARS).collect();
    let cut = truncated.rfind(char::is_whitespace).unwrap_or(truncated.len());
    let mut out = truncated[..cut].trim_end().to_string();
    out.push('…');
    Some(out)
}

/// Builds citations 1:1, in the exact order of `chunks`.
pub fn build_citations(chunks: &[Chunk], base_url: &str) -> Vec<Citation> {
    chunks
        .iter()
        .map(|chunk| Citation {
            page_id: chunk.page_id.clone(),
            title: chunk.title.clone(),
            url: resolve_url(chunk, base_url),
            section_anchor: chunk.section_anchor.clone(),
            snippet: snippet(&chunk.text),
        })
        .collect()
}

/// Deduplicates citations by `(pageId, sectionAnchor)`, returning the
/// deduped list plus a map from original citation index to its position in
/// the deduped list.
pub fn dedup_for_display(citations: &[Citation]) -> (Vec<Citation>, Vec<usize>) {
    let mut display = Vec::new();
    let mut seen: HashMap<(chunk_model::PageId, Option<String>), usize> = HashMap::new();
    let mut index_map = Vec::with_capacity(citations.len());

    for citation in citations {
        let key = (citation.page_id.clone(), citation.section_anchor.clone());
        let display_index = *seen.entry(key).or_insert_with(|| {
            display.push(citation.clone());
            display.len() - 1
        });
        index_map.push(display_index);
    }

    (display, index_map)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;
    use chunk_model::{ChunkId, ChunkMetadata, PageId};

    use super::*;

    fn chunk(url: Option<&str>, anchor: Option<&str>, text: &str) -> Chunk {
        let now = Utc::now();
        Chunk {
            id: ChunkId::new(),
            page_id: PageId::new("p1"),
            space: "ENG".into(),
            title: "Database Design Principles".into(),
            section_anchor: anchor.map(String::from),
            text: text.into(),
            version: 1,
            updated_at: now,
            labels: BTreeSet::new(),
            vector: vec![],
            url: url.map(String::from),
            indexed_at: now,
            metadata: ChunkMetadata::default(),
        }
    }

    #[test]
    fn absolute_url_is_used_verbatim() {
        let c = chunk(Some("https://wiki.example.com/p1"), Some("normalization"), "text");
        let citations = build_citations(std::slice::from_ref(&c), "https://base.example.com");
        assert_eq!(citations[0].url, "https://wiki.example.com/p1#normalization");
    }

    #[test]
    fn relative_url_is_prefixed_with_base() {
        let c = chunk(Some("/pages/p1"), None, "text");
        let citations = build_citations(std::slice::from_ref(&c), "https://base.example.com");
        assert_eq!(citations[0].url, "https://base.example.com/pages/p1");
    }

    #[test]
    fn snippet_ellipsizes_at_word_boundary() {
        let long_text = "word ".repeat(100);
        let c = chunk(None, None, &long_text);
        let citations = build_citations(std::slice::from_ref(&c), "https://base.example.com");
        let snippet = citations[0].snippet.as_ref().unwrap();
        assert!(snippet.ends_with('…'));
        assert!(snippet.len() <= SNIPPET_MAX_CHARS + 1);
    }

    #[test]
    fn display_citations_dedupe_by_page_and_anchor() {
        let a = chunk(None, Some("intro"), "a");
        let b = chunk(None, Some("intro"), "b");
        let citations = build_citations(&[a, b], "https://base.example.com");
        let (display, index_map) = dedup_for_display(&citations);
        assert_eq!(display.len(), 1);
        assert_eq!(index_map, vec![0, 0]);
    }
}
