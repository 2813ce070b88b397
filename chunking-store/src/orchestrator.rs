//! Keeps the dense ([`VectorStore`]) and lexical ([`LocalDocStore`]) indexes
//! in sync for a page. Ingest and delete are each two writes with no shared
//! transaction across the two stores — a crash between them leaves one
//! index stale until the next re-ingest, which is the same inconsistency
//! window the wiki connector's own retry-on-next-tick already tolerates.

use chunk_model::{Chunk, Page, PageId};

use crate::errors::StoreError;
use crate::local_doc_store::LocalDocStore;
use crate::vector_store::VectorStore;

pub struct ChunkOrchestrator {
    vector_store: VectorStore,
    doc_store: LocalDocStore,
}

impl ChunkOrchestrator {
    pub fn new(vector_store: VectorStore, doc_store: LocalDocStore) -> Self {
        Self { vector_store, doc_store }
    }

    pub fn vector_store(&self) -> &VectorStore {
        &self.vector_store
    }

    pub fn doc_store(&self) -> &LocalDocStore {
        &self.doc_store
    }

    /// Replaces `page`'s chunks in the vector store and its lexical entry
    /// in the doc store. `chunks` must all belong to `page.id`.
    pub fn index_document(&self, page: &Page, chunks: &[Chunk]) -> Result<(), StoreError> {
        self.vector_store.upsert_by_page(&page.id, chunks)?;
        self.doc_store.upsert_all([page.clone()]);
        Ok(())
    }

    pub fn delete_document(&self, page_id: &PageId) -> Result<usize, StoreError> {
        let deleted = self.vector_store.delete_by_page_id(page_id)?;
        self.doc_store.remove_by_page_id(&page_id.0);
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;
    use chunk_model::{ChunkId, ChunkMetadata};

    use crate::vector_store::VectorStoreConfig;

    use super::*;

    fn page(id: &str) -> Page {
        Page {
            id: PageId::new(id),
            title: "Runbook".into(),
            space: "ENG".into(),
            version: 1,
            labels: BTreeSet::new(),
            updated_at: Utc::now(),
            url: None,
            content: "crashloop pods".into(),
        }
    }

    fn chunk(page: &Page) -> Chunk {
        let now = Utc::now();
        Chunk {
            id: ChunkId::new(),
            page_id: page.id.clone(),
            space: page.space.clone(),
            title: page.title.clone(),
            section_anchor: None,
            text: page.content.clone(),
            version: page.version,
            updated_at: now,
            labels: BTreeSet::new(),
            vector: vec![1.0, 0.0, 0.0],
            url: None,
            indexed_at: now,
            metadata: ChunkMetadata::default(),
        }
    }

    fn orchestrator(dir: &tempfile::TempDir) -> ChunkOrchestrator {
        let config = VectorStoreConfig::new(dir.path().join("chunks.db"), dir.path().join("hnsw"), 3);
        ChunkOrchestrator::new(VectorStore::open(config).unwrap(), LocalDocStore::new())
    }

    #[test]
    fn index_document_populates_both_stores() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(&dir);
        let p = page("p1");
        let c = chunk(&p);

        orch.index_document(&p, std::slice::from_ref(&c)).unwrap();

        assert_eq!(orch.vector_store().stats(10).unwrap().count, 1);
        assert_eq!(orch.doc_store().size(), 1);
    }

    #[test]
    fn delete_document_clears_both_stores() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(&dir);
        let p = page("p1");
        let c = chunk(&p);
        orch.index_document(&p, std::slice::from_ref(&c)).unwrap();

        orch.delete_document(&p.id).unwrap();

        assert_eq!(orch.vector_store().stats(10).unwrap().count, 0);
        assert_eq!(orch.doc_store().size(), 0);
    }
}
