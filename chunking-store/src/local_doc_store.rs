//! In-memory lexical fallback used when dense retrieval comes up short.
//!
//! Deliberately not a full-text search engine: term frequency over
//! `title + stripped(content)`, short/stop words dropped, longer terms
//! weighted up. Good enough to rescue queries the embedding model misses
//! entirely (acronyms, error codes) without pulling in a second index
//! engine alongside the ANN one.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use chunk_model::{Filters, Page};

const MIN_TERM_LEN: usize = 3;
const LONG_TERM_LEN: usize = 5;
const LONG_TERM_WEIGHT: f32 = 2.0;

fn stop_words() -> &'static HashSet<&'static str> {
    static WORDS: std::sync::OnceLock<HashSet<&'static str>> = std::sync::OnceLock::new();
    WORDS.get_or_init(|| {
        [
            "the", "and", "for", "are", "but", "not", "you", "all", "can", "had", "her", "was",
            "one", "our", "out", "day", "get", "has", "him", "his", "how", "man", "new", "now",
            "old", "see", "two", "way", "who", "boy", "did", "its", "let", "put", "say", "she",
            "too", "use", "this", "that", "with", "from", "into", "your", "have", "will", "what",
            "when", "where", "which", "their", "about",
        ]
        .into_iter()
        .collect()
    })
}

/// Drops `<script>`/`<style>` elements entirely (tags and body) and all
/// other tag delimiters, inserting a space wherever a tag run closes so
/// text either side of adjacent tags doesn't fuse into one token.
fn strip_html(content: &str) -> String {
    let lower = content.to_ascii_lowercase();
    let mut out = String::with_capacity(content.len());
    let mut in_tag = false;
    let mut skip_until: Option<&str> = None;
    let mut i = 0usize;

    while i < content.len() {
        let rest = &content[i..];
        let rest_lower = &lower[i..];

        if let Some(close_tag) = skip_until {
            if let Some(pos) = rest_lower.find(close_tag) {
                i += pos + close_tag.len();
                skip_until = None;
                in_tag = false;
                out.push(' ');
            } else {
                break;
            }
            continue;
        }

        let c = rest.chars().next().unwrap();
        match c {
            '<' => {
                if rest_lower.starts_with("<script") {
                    skip_until = Some("</script>");
                } else if rest_lower.starts_with("<style") {
                    skip_until = Some("</style>");
                }
                in_tag = true;
                i += 1;
            }
            '>' => {
                in_tag = false;
                out.push(' ');
                i += 1;
            }
            _ => {
                if !in_tag {
                    out.push(c);
                }
                i += c.len_utf8();
            }
        }
    }
    out
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .filter(|w| w.len() >= MIN_TERM_LEN && !stop_words().contains(w.as_str()))
        .collect()
}

fn term_counts(text: &str) -> HashMap<String, f32> {
    let mut counts = HashMap::new();
    for term in tokenize(text) {
        let weight = if term.len() >= LONG_TERM_LEN { LONG_TERM_WEIGHT } else { 1.0 };
        *counts.entry(term).or_insert(0.0) += weight;
    }
    counts
}

struct IndexedDoc {
    insertion_order: usize,
    page: Page,
    term_counts: HashMap<String, f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub page: Page,
    pub score: f32,
}

pub struct LocalDocStore {
    docs: RwLock<HashMap<String, IndexedDoc>>,
    next_order: RwLock<usize>,
}

impl Default for LocalDocStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalDocStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
            next_order: RwLock::new(0),
        }
    }

    pub fn size(&self) -> usize {
        self.docs.read().expect("local doc store lock poisoned").len()
    }

    /// Replaces each page by id, preserving insertion order for ties.
    pub fn upsert_all(&self, pages: impl IntoIterator<Item = Page>) {
        let mut docs = self.docs.write().expect("local doc store lock poisoned");
        let mut order = self.next_order.write().expect("order lock poisoned");
        for page in pages {
            let combined = format!("{} {}", page.title, strip_html(&page.content));
            let term_counts = term_counts(&combined);
            let insertion_order = docs.get(&page.id.0).map(|d| d.insertion_order).unwrap_or_else(|| {
                let n = *order;
                *order += 1;
                n
            });
            docs.insert(
                page.id.0.clone(),
                IndexedDoc { insertion_order, page, term_counts },
            );
        }
    }

    pub fn remove_by_page_id(&self, page_id: &str) -> bool {
        self.docs
            .write()
            .expect("local doc store lock poisoned")
            .remove(page_id)
            .is_some()
    }

    /// Scores every stored page against `query`'s terms, returning up to
    /// `limit` candidates matching `filters`, highest score first, ties
    /// broken by insertion order.
    pub fn query_candidates(&self, query: &str, filters: &Filters, limit: usize) -> Vec<Candidate> {
        let query_terms = tokenize(query);
        if query_terms.is_empty() || limit == 0 {
            return Vec::new();
        }

        let docs = self.docs.read().expect("local doc store lock poisoned");
        let mut scored: Vec<(f32, usize, Candidate)> = docs
            .values()
            .filter_map(|doc| {
                let score: f32 = query_terms
                    .iter()
                    .filter_map(|term| doc.term_counts.get(term))
                    .sum();
                if score <= 0.0 {
                    return None;
                }
                if !filters.is_empty() && !passes_page_filters(&doc.page, filters) {
                    return None;
                }
                Some((
                    score,
                    doc.insertion_order,
                    Candidate { page: doc.page.clone(), score },
                ))
            })
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        scored.truncate(limit);
        scored.into_iter().map(|(_, _, c)| c).collect()
    }
}

fn passes_page_filters(page: &Page, filters: &Filters) -> bool {
    if let Some(space) = &filters.space {
        if &page.space != space {
            return false;
        }
    }
    if let Some(labels) = &filters.labels {
        if !labels.is_empty() && page.labels.is_disjoint(labels) {
            return false;
        }
    }
    if let Some(after) = &filters.updated_after {
        if page.updated_at < *after {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;
    use chunk_model::PageId;

    use super::*;

    fn page(id: &str, title: &str, content: &str) -> Page {
        Page {
            id: PageId::new(id),
            title: title.into(),
            space: "ENG".into(),
            version: 1,
            labels: BTreeSet::new(),
            updated_at: Utc::now(),
            url: None,
            content: content.into(),
        }
    }

    #[test]
    fn ranks_by_term_overlap() {
        let store = LocalDocStore::new();
        store.upsert_all([
            page("p1", "Kubernetes Runbook", "restart the deployment when pods crashloop"),
            page("p2", "Unrelated", "nothing to see here"),
        ]);

        let hits = store.query_candidates("crashloop pods", &Filters::default(), 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].page.id.0, "p1");
    }

    #[test]
    fn upsert_replaces_existing_page() {
        let store = LocalDocStore::new();
        store.upsert_all([page("p1", "Old Title", "old body")]);
        store.upsert_all([page("p1", "New Title", "new body crashloop")]);
        assert_eq!(store.size(), 1);

        let hits = store.query_candidates("crashloop", &Filters::default(), 5);
        assert_eq!(hits[0].page.title, "New Title");
    }

    #[test]
    fn html_is_stripped_before_tokenizing() {
        let store = LocalDocStore::new();
        store.upsert_all([page("p1", "Doc", "<p>crashloop</p><script>ignored</script>")]);
        let hits = store.query_candidates("crashloop", &Filters::default(), 5);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn filters_restrict_candidates() {
        let store = LocalDocStore::new();
        store.upsert_all([page("p1", "Runbook", "crashloop pods")]);
        let filters = Filters {
            space: Some("OPS".into()),
            ..Default::default()
        };
        assert!(store.query_candidates("crashloop", &filters, 5).is_empty());
    }

    #[test]
    fn remove_by_page_id_drops_candidate() {
        let store = LocalDocStore::new();
        store.upsert_all([page("p1", "Runbook", "crashloop pods")]);
        assert!(store.remove_by_page_id("p1"));
        assert!(store.query_candidates("crashloop", &Filters::default(), 5).is_empty());
    }
}
