//! Persistent, filterable ANN index over chunk vectors.
//!
//! Chunk rows live in sqlite (`confluence_chunks`, per the persisted-state
//! layout); nearest-neighbour search is delegated to [`HnswIndex`]. Sqlite
//! is the source of truth for which chunks currently exist — `HnswIndex` has
//! no delete operation, so a page's stale vectors are simply never
//! resurrected: `search_similar` joins ANN hits back against the sqlite rows
//! and silently drops ids sqlite no longer has, overfetching from the ANN
//! index to compensate.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use chunk_model::{Chunk, ChunkId, ChunkMetadata, Filters, PageId};
use rusqlite::{params, Connection, OptionalExtension};

use crate::errors::StoreError;
use crate::hnsw_index::HnswIndex;

const KNOWN_COLUMNS: &[&str] = &[
    "id",
    "page_id",
    "space",
    "title",
    "section_anchor",
    "text",
    "version",
    "updated_at",
    "labels",
    "vector",
    "url",
    "indexed_at",
    "metadata_json",
];

#[derive(Debug, Clone)]
pub struct VectorStoreConfig {
    pub db_path: PathBuf,
    pub hnsw_dir: PathBuf,
    pub dimension: usize,
    pub max_elements: usize,
    pub cache_size: usize,
    /// When true, an unrecognized column in an existing `confluence_chunks`
    /// table is a hard error instead of being dropped and logged once.
    pub strict_schema: bool,
}

impl VectorStoreConfig {
    pub fn new(db_path: impl Into<PathBuf>, hnsw_dir: impl Into<PathBuf>, dimension: usize) -> Self {
        Self {
            db_path: db_path.into(),
            hnsw_dir: hnsw_dir.into(),
            dimension,
            max_elements: 200_000,
            cache_size: 128,
            strict_schema: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub count: usize,
    pub recently_indexed: Vec<ChunkId>,
}

type CacheKey = (Vec<u32>, String, usize);

pub struct VectorStore {
    conn: Mutex<Connection>,
    hnsw: HnswIndex,
    hnsw_dir: PathBuf,
    cache: Mutex<VecDeque<(CacheKey, Vec<ScoredChunk>)>>,
    cache_size: usize,
    dropped_columns: Mutex<HashSet<String>>,
    strict_schema: bool,
}

impl VectorStore {
    pub fn open(config: VectorStoreConfig) -> Result<Self, StoreError> {
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&config.db_path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS confluence_chunks (
                id TEXT PRIMARY KEY,
                page_id TEXT NOT NULL,
                space TEXT NOT NULL,
                title TEXT NOT NULL,
                section_anchor TEXT,
                text TEXT NOT NULL,
                version INTEGER NOT NULL,
                updated_at TEXT NOT NULL,
                labels TEXT NOT NULL,
                vector BLOB NOT NULL,
                url TEXT,
                indexed_at TEXT,
                metadata_json TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_confluence_chunks_page ON confluence_chunks(page_id);
            CREATE INDEX IF NOT EXISTS idx_confluence_chunks_space ON confluence_chunks(space);
            CREATE INDEX IF NOT EXISTS idx_confluence_chunks_indexed_at ON confluence_chunks(indexed_at);",
        )?;

        let dropped_columns = HashSet::new();
        let store = Self {
            hnsw: HnswIndex::load(&config.hnsw_dir, config.dimension, config.max_elements)?,
            conn: Mutex::new(conn),
            hnsw_dir: config.hnsw_dir,
            cache: Mutex::new(VecDeque::new()),
            cache_size: config.cache_size.max(1),
            dropped_columns: Mutex::new(dropped_columns),
            strict_schema: config.strict_schema,
        };
        store.check_schema_tolerance()?;
        Ok(store)
    }

    fn check_schema_tolerance(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("sqlite lock poisoned");
        let mut stmt = conn.prepare("PRAGMA table_info(confluence_chunks)")?;
        let columns: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<_, _>>()?;
        drop(stmt);

        let mut dropped = self.dropped_columns.lock().expect("dropped columns lock poisoned");
        for column in columns {
            if !KNOWN_COLUMNS.contains(&column.as_str()) {
                if self.strict_schema {
                    return Err(StoreError::NotFound(format!(
                        "unknown column `{column}` in confluence_chunks (strict mode)"
                    )));
                }
                if dropped.insert(column.clone()) {
                    tracing::warn!(column = %column, "dropping unknown confluence_chunks column");
                }
            }
        }
        Ok(())
    }

    pub fn dimension(&self) -> usize {
        self.hnsw.dim()
    }

    /// Deletes all existing rows for `page_id`, then inserts `chunks`. The
    /// delete-then-insert happens inside one sqlite transaction, and the
    /// matching HNSW inserts happen before the sqlite lock is released, so
    /// no reader observes a partial page or a page whose new vectors are
    /// committed but not yet searchable.
    pub fn upsert_by_page(&self, page_id: &PageId, chunks: &[Chunk]) -> Result<(), StoreError> {
        for chunk in chunks {
            if chunk.vector.len() != self.hnsw.dim() {
                return Err(StoreError::DimensionMismatch {
                    expected: self.hnsw.dim(),
                    actual: chunk.vector.len(),
                });
            }
        }

        {
            let mut conn = self.conn.lock().expect("sqlite lock poisoned");
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM confluence_chunks WHERE page_id = ?1",
                params![page_id.0],
            )?;
            for chunk in chunks {
                insert_chunk(&tx, chunk)?;
            }
            tx.commit()?;

            // Held across the HNSW inserts too: a concurrent `search_similar`
            // takes the same lock to hydrate rows, so it can never observe the
            // new ids committed in sqlite before they're searchable in HNSW.
            for chunk in chunks {
                self.hnsw.insert(chunk.id, &chunk.vector)?;
            }
        }

        self.invalidate_cache();
        Ok(())
    }

    pub fn delete_by_page_id(&self, page_id: &PageId) -> Result<usize, StoreError> {
        let deleted = {
            let conn = self.conn.lock().expect("sqlite lock poisoned");
            conn.execute(
                "DELETE FROM confluence_chunks WHERE page_id = ?1",
                params![page_id.0],
            )?
        };
        self.invalidate_cache();
        Ok(deleted)
    }

    /// Cosine-ranked nearest chunks matching `filters`, highest score first.
    pub fn search_similar(
        &self,
        query: &[f32],
        filters: &Filters,
        k: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.hnsw.dim() {
            return Err(StoreError::DimensionMismatch {
                expected: self.hnsw.dim(),
                actual: query.len(),
            });
        }

        let cache_key = cache_key(query, filters, k);
        if let Some(hit) = self.cache_lookup(&cache_key) {
            return Ok(hit);
        }

        let mut overfetch = (k * 4).max(k + 8);
        let max_overfetch = self.hnsw.len().max(1);
        let mut results = Vec::new();

        loop {
            let candidates = self.hnsw.search(query, overfetch.min(max_overfetch))?;
            results.clear();
            {
                let conn = self.conn.lock().expect("sqlite lock poisoned");
                for (id, score) in &candidates {
                    if let Some(chunk) = fetch_chunk_by_id(&conn, id)? {
                        if filters.matches_chunk(&chunk) {
                            results.push(ScoredChunk { chunk, score: *score });
                        }
                    }
                }
            }

            if results.len() >= k || overfetch >= max_overfetch {
                break;
            }
            overfetch = (overfetch * 2).min(max_overfetch.max(overfetch + 1));
        }

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k);

        self.cache_store(cache_key, results.clone());
        Ok(results)
    }

    pub fn stats(&self, limit: usize) -> Result<IndexStats, StoreError> {
        let conn = self.conn.lock().expect("sqlite lock poisoned");
        let count: usize = conn.query_row("SELECT COUNT(*) FROM confluence_chunks", [], |row| row.get(0))?;

        let mut stmt = conn.prepare(
            "SELECT id FROM confluence_chunks ORDER BY indexed_at DESC LIMIT ?1",
        )?;
        let recently_indexed = stmt
            .query_map(params![limit as i64], |row| {
                let text: String = row.get(0)?;
                Ok(text)
            })?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter_map(|text| text.parse::<uuid::Uuid>().ok().map(ChunkId))
            .collect();

        Ok(IndexStats { count, recently_indexed })
    }

    pub fn save_index(&self) -> Result<(), StoreError> {
        self.hnsw.save(&self.hnsw_dir)
    }

    fn invalidate_cache(&self) {
        self.cache.lock().expect("cache lock poisoned").clear();
    }

    fn cache_lookup(&self, key: &CacheKey) -> Option<Vec<ScoredChunk>> {
        let cache = self.cache.lock().expect("cache lock poisoned");
        cache.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    }

    fn cache_store(&self, key: CacheKey, value: Vec<ScoredChunk>) {
        let mut cache = self.cache.lock().expect("cache lock poisoned");
        if cache.len() >= self.cache_size {
            cache.pop_front();
        }
        cache.push_back((key, value));
    }
}

fn cache_key(query: &[f32], filters: &Filters, k: usize) -> CacheKey {
    let quantized = query.iter().map(|v| (v * 1_000_000.0) as i32 as u32).collect();
    let filters_key = format!(
        "{:?}|{:?}|{:?}",
        filters.space, filters.labels, filters.updated_after
    );
    (quantized, filters_key, k)
}

fn insert_chunk(tx: &rusqlite::Transaction<'_>, chunk: &Chunk) -> Result<(), StoreError> {
    let labels = chunk.labels.iter().cloned().collect::<Vec<_>>().join(",");
    let vector_bytes: &[u8] = bytemuck::cast_slice(&chunk.vector);
    let metadata_json = serde_json::to_string(&chunk.metadata)?;

    tx.execute(
        "INSERT INTO confluence_chunks
            (id, page_id, space, title, section_anchor, text, version, updated_at, labels, vector, url, indexed_at, metadata_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            chunk.id.0.to_string(),
            chunk.page_id.0,
            chunk.space,
            chunk.title,
            chunk.section_anchor,
            chunk.text,
            chunk.version as i64,
            chunk.updated_at.to_rfc3339(),
            labels,
            vector_bytes,
            chunk.url,
            chunk.indexed_at.to_rfc3339(),
            metadata_json,
        ],
    )?;
    Ok(())
}

fn fetch_chunk_by_id(conn: &Connection, id: &ChunkId) -> Result<Option<Chunk>, StoreError> {
    conn.query_row(
        "SELECT id, page_id, space, title, section_anchor, text, version, updated_at, labels, vector, url, indexed_at, metadata_json
         FROM confluence_chunks WHERE id = ?1",
        params![id.0.to_string()],
        row_to_chunk,
    )
    .optional()
    .map_err(StoreError::from)
}

fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chunk> {
    let id_text: String = row.get(0)?;
    let vector_bytes: Vec<u8> = row.get(9)?;
    let vector: Vec<f32> = bytemuck::cast_slice(&vector_bytes).to_vec();
    let labels_text: String = row.get(8)?;
    let metadata_json: String = row.get(12)?;
    let metadata: ChunkMetadata = serde_json::from_str(&metadata_json).unwrap_or_default();
    let updated_at_text: String = row.get(7)?;
    let indexed_at_text: String = row.get(11)?;

    Ok(Chunk {
        id: ChunkId(id_text.parse().unwrap_or_default()),
        page_id: PageId::new(row.get::<_, String>(1)?),
        space: row.get(2)?,
        title: row.get(3)?,
        section_anchor: row.get(4)?,
        text: row.get(5)?,
        version: row.get::<_, i64>(6)? as u64,
        updated_at: parse_rfc3339(&updated_at_text),
        labels: labels_text
            .split(',')
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect(),
        vector,
        url: row.get(10)?,
        indexed_at: parse_rfc3339(&indexed_at_text),
        metadata,
    })
}

fn parse_rfc3339(text: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn chunk(page_id: &str, text: &str, vector: Vec<f32>) -> Chunk {
        let now = Utc::now();
        Chunk {
            id: ChunkId::new(),
            page_id: PageId::new(page_id),
            space: "ENG".into(),
            title: "Runbook".into(),
            section_anchor: Some("intro".into()),
            text: text.into(),
            version: 1,
            updated_at: now,
            labels: BTreeSet::new(),
            vector,
            url: None,
            indexed_at: now,
            metadata: ChunkMetadata::default(),
        }
    }

    fn open_store(dir: &tempfile::TempDir) -> VectorStore {
        let config = VectorStoreConfig::new(dir.path().join("chunks.db"), dir.path().join("hnsw"), 3);
        VectorStore::open(config).unwrap()
    }

    #[test]
    fn upsert_then_search_returns_own_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let c = chunk("p1", "hello world", vec![1.0, 0.0, 0.0]);
        store.upsert_by_page(&c.page_id.clone(), std::slice::from_ref(&c)).unwrap();

        let hits = store.search_similar(&[1.0, 0.0, 0.0], &Filters::default(), 5).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.id, c.id);
        assert!(hits[0].score > 0.99);
    }

    #[test]
    fn delete_removes_chunk_from_results() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let c = chunk("p1", "hello world", vec![1.0, 0.0, 0.0]);
        let page_id = c.page_id.clone();
        store.upsert_by_page(&page_id, std::slice::from_ref(&c)).unwrap();
        store.delete_by_page_id(&page_id).unwrap();

        let hits = store.search_similar(&[1.0, 0.0, 0.0], &Filters::default(), 5).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn upsert_by_page_replaces_prior_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let page_id = PageId::new("p1");
        let old = chunk("p1", "old text", vec![1.0, 0.0, 0.0]);
        store.upsert_by_page(&page_id, std::slice::from_ref(&old)).unwrap();

        let new_chunk = chunk("p1", "new text", vec![0.0, 1.0, 0.0]);
        store.upsert_by_page(&page_id, std::slice::from_ref(&new_chunk)).unwrap();

        let stats = store.stats(10).unwrap();
        assert_eq!(stats.count, 1);
    }

    #[test]
    fn filters_restrict_results() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let mut eng = chunk("p1", "eng text", vec![1.0, 0.0, 0.0]);
        eng.space = "ENG".into();
        let mut ops = chunk("p2", "ops text", vec![1.0, 0.0, 0.0]);
        ops.space = "OPS".into();
        store.upsert_by_page(&eng.page_id.clone(), std::slice::from_ref(&eng)).unwrap();
        store.upsert_by_page(&ops.page_id.clone(), std::slice::from_ref(&ops)).unwrap();

        let filters = Filters {
            space: Some("ENG".into()),
            ..Default::default()
        };
        let hits = store.search_similar(&[1.0, 0.0, 0.0], &filters, 5).unwrap();
        assert!(hits.iter().all(|h| h.chunk.space == "ENG"));
    }
}
