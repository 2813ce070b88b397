//! JSON-backed `PageState` persistence (`ingest-state.json`):
//! `{pages: {pageId: PageState}}`, pretty-printed, rewritten atomically via
//! write-to-temp + rename so a crash mid-write never corrupts the file the
//! next tick reads.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chunk_model::PageState;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestState {
    pub pages: HashMap<String, PageState>,
}

pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<IngestState, StateError> {
        if !self.path.exists() {
            return Ok(IngestState::default());
        }
        let bytes = std::fs::read(&self.path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Writes to `<path>.tmp` then renames over `path`, so readers never
    /// observe a partially-written file.
    pub fn persist(&self, state: &IngestState) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(state)?;
        let tmp_path = tmp_path(&self.path);
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut file_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    file_name.push(".tmp");
    path.with_file_name(file_name)
}
