//! The id → chunk metadata artifact written next to the vector store.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use essayrag_core::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub content: String,
    pub filename: String,
    pub title: String,
    pub chunk_num: usize,
}

/// `ids[row]` names the vector stored at `row`; `entries` holds the metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMapping {
    pub embedder_id: String,
    pub dim: usize,
    pub created_at: DateTime<Utc>,
    pub ids: Vec<String>,
    pub entries: BTreeMap<String, MappingEntry>,
}

impl ChunkMapping {
    pub fn new(embedder_id: impl Into<String>, dim: usize) -> Self {
        Self { embedder_id: embedder_id.into(), dim, created_at: Utc::now(), ids: Vec::new(), entries: BTreeMap::new() }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn push(&mut self, id: String, entry: MappingEntry) {
        self.ids.push(id.clone());
        self.entries.insert(id, entry);
    }

    /// Entry for the vector at `row`.
    pub fn at(&self, row: usize) -> Option<(&str, &MappingEntry)> {
        let id = self.ids.get(row)?;
        self.entries.get(id).map(|e| (id.as_str(), e))
    }

    pub fn read(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Store(format!("cannot read {}: {e}", path.display())))?;
        serde_json::from_str(&raw).map_err(|e| Error::Store(format!("malformed {}: {e}", path.display())))
    }

    /// Writes through a temp file in the same directory, then renames.
    pub fn write(&self, path: &Path) -> Result<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, self).map_err(Error::store)?;
        tmp.flush()?;
        tmp.persist(path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}
