//! Thin wrapper over `hnsw_rs`'s approximate nearest-neighbour index.
//!
//! A working index, not a stub: vectors go in through
//! [`HnswIndex::insert`], `ChunkId`s come back out of
//! [`HnswIndex::search`]. Persistence round-trips the graph through
//! `hnsw_rs`'s own file dump and keeps the `data_id -> ChunkId` mapping in a
//! sidecar JSON file, since that mapping is ours, not the index's.

use std::path::Path;
use std::sync::RwLock;

use chunk_model::ChunkId;
use hnsw_rs::prelude::*;

use crate::errors::StoreError;

const MAX_NB_CONNECTION: usize = 24;
const MAX_LAYER: usize = 16;
const EF_CONSTRUCTION: usize = 200;
const EF_SEARCH: usize = 64;
const DUMP_BASENAME: &str = "chunks";

pub struct HnswIndex {
    hnsw: RwLock<Hnsw<'static, f32, DistCosine>>,
    ids: RwLock<Vec<ChunkId>>,
    dim: usize,
}

impl HnswIndex {
    pub fn new(dim: usize, max_elements: usize) -> Self {
        let hnsw = Hnsw::<f32, DistCosine>::new(
            MAX_NB_CONNECTION,
            max_elements.max(1),
            MAX_LAYER,
            EF_CONSTRUCTION,
            DistCosine {},
        );
        Self {
            hnsw: RwLock::new(hnsw),
            ids: RwLock::new(Vec::new()),
            dim,
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.ids.read().expect("hnsw ids lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn insert(&self, id: ChunkId, vector: &[f32]) -> Result<(), StoreError> {
        if vector.len() != self.dim {
            return Err(StoreError::DimensionMismatch {
                expected: self.dim,
                actual: vector.len(),
            });
        }
        let mut ids = self.ids.write().expect("hnsw ids lock poisoned");
        let data_id = ids.len();
        self.hnsw
            .write()
            .expect("hnsw lock poisoned")
            .insert((vector, data_id));
        ids.push(id);
        Ok(())
    }

    /// Returns up to `k` nearest chunks with cosine similarity (1.0 is
    /// identical, -1.0 is opposite), highest similarity first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(ChunkId, f32)>, StoreError> {
        if query.len() != self.dim {
            return Err(StoreError::DimensionMismatch {
                expected: self.dim,
                actual: query.len(),
            });
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let neighbours = self
            .hnsw
            .read()
            .expect("hnsw lock poisoned")
            .search(query, k, EF_SEARCH);
        let ids = self.ids.read().expect("hnsw ids lock poisoned");

        let mut hits: Vec<(ChunkId, f32)> = neighbours
            .into_iter()
            .filter_map(|n| ids.get(n.d_id).map(|id| (*id, 1.0 - n.distance)))
            .collect();
        hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(hits)
    }

    pub fn save(&self, dir: &Path) -> Result<(), StoreError> {
        std::fs::create_dir_all(dir)?;
        self.hnsw
            .read()
            .expect("hnsw lock poisoned")
            .file_dump(dir, DUMP_BASENAME)
            .map_err(|e| StoreError::Index(format!("hnsw dump failed: {e}")))?;

        let ids = self.ids.read().expect("hnsw ids lock poisoned");
        let json = serde_json::to_vec(&*ids)?;
        std::fs::write(dir.join("chunks.ids.json"), json)?;
        Ok(())
    }

    /// Loads a previously saved index, or an empty one if `dir` has no dump
    /// yet (first run).
    pub fn load(dir: &Path, dim: usize, max_elements: usize) -> Result<Self, StoreError> {
        let ids_path = dir.join("chunks.ids.json");
        if !ids_path.exists() {
            return Ok(Self::new(dim, max_elements));
        }

        let ids_bytes = std::fs::read(&ids_path)?;
        let ids: Vec<ChunkId> = serde_json::from_slice(&ids_bytes)?;

        let mut loader = HnswIo::new(dir, DUMP_BASENAME);
        let hnsw: Hnsw<f32, DistCosine> = loader
            .load_hnsw()
            .map_err(|e| StoreError::Index(format!("hnsw load failed: {e}")))?;

        Ok(Self {
            hnsw: RwLock::new(hnsw),
            ids: RwLock::new(ids),
            dim,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserted_vector_is_its_own_nearest_neighbour() {
        let index = HnswIndex::new(4, 16);
        let id = ChunkId::new();
        index.insert(id, &[1.0, 0.0, 0.0, 0.0]).unwrap();
        index.insert(ChunkId::new(), &[0.0, 1.0, 0.0, 0.0]).unwrap();

        let hits = index.search(&[1.0, 0.0, 0.0, 0.0], 1).unwrap();
        assert_eq!(hits[0].0, id);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let index = HnswIndex::new(4, 16);
        let err = index.insert(ChunkId::new(), &[1.0, 0.0]).unwrap_err();
        assert!(matches!(err, StoreError::DimensionMismatch { expected: 4, actual: 2 }));
    }

    #[test]
    fn save_and_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let id = ChunkId::new();
        {
            let index = HnswIndex::new(3, 16);
            index.insert(id, &[0.1, 0.2, 0.3]).unwrap();
            index.save(dir.path()).unwrap();
        }
        let reloaded = HnswIndex::load(dir.path(), 3, 16).unwrap();
        assert_eq!(reloaded.len(), 1);
        let hits = reloaded.search(&[0.1, 0.2, 0.3], 1).unwrap();
        assert_eq!(hits[0].0, id);
    }
}
