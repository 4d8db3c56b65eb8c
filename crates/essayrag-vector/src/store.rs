//! Persisted flat index: a Lance vector store plus `mappings.json`.
//!
//! The two artifacts are only meaningful together. Loading checks that they
//! agree row for row and were produced by the same embedder.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::{info, warn};

use essayrag_core::error::{Error, Result};
use essayrag_core::traits::VectorIndex;
use essayrag_core::types::{rank_neighbors, RankedResult};

use crate::lance_index::LanceIndex;
use crate::mapping::{ChunkMapping, MappingEntry};

pub const VECTORS_DIR: &str = "vectors";
pub const MAPPINGS_FILE: &str = "mappings.json";
const STAGED_DIR: &str = "index";

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// One flat-search hit with the metadata recorded at staging time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatHit {
    pub id: String,
    pub title: String,
    pub filename: String,
    pub chunk_num: usize,
    pub content: String,
}

pub struct PersistedIndex {
    dir: PathBuf,
    index: LanceIndex,
    mapping: ChunkMapping,
}

impl PersistedIndex {
    /// Starts a new, empty index under `dir`, replacing any previous one.
    pub fn create(dir: &Path, embedder_id: &str, dim: usize) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let mappings = dir.join(MAPPINGS_FILE);
        if mappings.exists() {
            std::fs::remove_file(&mappings)?;
        }
        let index = LanceIndex::create(&dir.join(VECTORS_DIR), dim)?;
        Ok(Self { dir: dir.to_path_buf(), index, mapping: ChunkMapping::new(embedder_id, dim) })
    }

    /// Starts a new index in a scratch directory beside `target`. Whatever is
    /// at `target` stays untouched until [`StagedIndex::publish`] succeeds.
    pub fn stage_for(target: &Path, embedder_id: &str, dim: usize) -> Result<StagedIndex> {
        let parent = parent_dir(target);
        fs::create_dir_all(parent)?;
        let scratch = tempfile::Builder::new().prefix(".essayrag-staging-").tempdir_in(parent)?;
        let index = Self::create(&scratch.path().join(STAGED_DIR), embedder_id, dim)?;
        Ok(StagedIndex { scratch, index })
    }

    /// Appends `(id, entry)` pairs with their vectors. Ids must be new.
    pub fn append(&mut self, entries: Vec<(String, MappingEntry)>, vectors: &[Vec<f32>]) -> Result<()> {
        if entries.len() != vectors.len() {
            return Err(Error::Store(format!("{} entries for {} vectors", entries.len(), vectors.len())));
        }
        if let Some((dup, _)) = entries.iter().find(|(id, _)| self.mapping.contains(id)) {
            return Err(Error::Store(format!("duplicate chunk id `{dup}`")));
        }
        let ids: Vec<String> = entries.iter().map(|(id, _)| id.clone()).collect();
        self.index.add_with_ids(&ids, vectors)?;
        for (id, entry) in entries {
            self.mapping.push(id, entry);
        }
        Ok(())
    }

    /// Writes the mapping artifact; vectors are already durable once appended.
    pub fn save(&self) -> Result<()> {
        self.mapping.write(&self.dir.join(MAPPINGS_FILE))?;
        info!(dir = %self.dir.display(), vectors = self.len(), "saved persisted index");
        Ok(())
    }

    /// Loads both artifacts and validates them against each other and against
    /// the embedder that will query them.
    pub fn load(dir: &Path, expected_embedder_id: &str) -> Result<Self> {
        let mappings = dir.join(MAPPINGS_FILE);
        let vectors = dir.join(VECTORS_DIR);
        if !mappings.is_file() || !vectors.is_dir() {
            return Err(Error::Store(format!(
                "{} must contain both {MAPPINGS_FILE} and {VECTORS_DIR}/",
                dir.display()
            )));
        }
        let mapping = ChunkMapping::read(&mappings)?;
        if mapping.embedder_id != expected_embedder_id {
            return Err(Error::Store(format!(
                "index was built with `{}` but the session embeds with `{expected_embedder_id}`",
                mapping.embedder_id
            )));
        }
        let index = LanceIndex::open(&vectors, mapping.dim)?;
        let stored_ids = index.read_ids()?;
        if stored_ids.len() != mapping.ids.len() {
            return Err(Error::Store(format!(
                "vector store holds {} rows but the mapping lists {}",
                stored_ids.len(),
                mapping.ids.len()
            )));
        }
        if let Some(row) = stored_ids.iter().zip(&mapping.ids).position(|(a, b)| a != b) {
            return Err(Error::Store(format!("vector store and mapping disagree at row {row}")));
        }
        if let Some(missing) = mapping.ids.iter().find(|id| !mapping.contains(id)) {
            return Err(Error::Store(format!("mapping has no entry for `{missing}`")));
        }
        info!(dir = %dir.display(), vectors = stored_ids.len(), embedder = %mapping.embedder_id, "loaded persisted index");
        Ok(Self { dir: dir.to_path_buf(), index, mapping })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn embedder_id(&self) -> &str {
        &self.mapping.embedder_id
    }

    pub fn dim(&self) -> usize {
        self.mapping.dim
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn mapping(&self) -> &ChunkMapping {
        &self.mapping
    }

    /// k-nearest chunks by L2 distance, resolved through the mapping.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<RankedResult<FlatHit>>> {
        let neighbors = self.index.search(query, k)?;
        rank_neighbors(&neighbors, |position| {
            let (id, entry) = self
                .mapping
                .at(position)
                .ok_or_else(|| Error::Store(format!("no mapping for vector row {position}")))?;
            Ok::<_, Error>(FlatHit {
                id: id.to_string(),
                title: entry.title.clone(),
                filename: entry.filename.clone(),
                chunk_num: entry.chunk_num,
                content: entry.content.clone(),
            })
        })
    }
}

/// An index being built off to the side of its final location.
pub struct StagedIndex {
    scratch: TempDir,
    index: PersistedIndex,
}

impl StagedIndex {
    pub fn append(&mut self, entries: Vec<(String, MappingEntry)>, vectors: &[Vec<f32>]) -> Result<()> {
        self.index.append(entries, vectors)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Saves the staged index, moves it over `target` and reopens it there.
    /// A previous index at `target` is only discarded once the new one is in
    /// place; if the move fails it is put back.
    pub fn publish(self, target: &Path) -> Result<PersistedIndex> {
        let Self { scratch, index } = self;
        index.save()?;
        let staged = index.dir.clone();
        let embedder_id = index.mapping.embedder_id.clone();
        drop(index);

        let retired = tempfile::Builder::new().prefix(".essayrag-retired-").tempdir_in(parent_dir(target))?;
        let previous = retired.path().join(STAGED_DIR);
        let had_previous = target.exists();
        if had_previous {
            fs::rename(target, &previous)?;
        }
        if let Err(e) = fs::rename(&staged, target) {
            if had_previous {
                if let Err(restore) = fs::rename(&previous, target) {
                    warn!(target = %target.display(), error = %restore, "could not restore previous index");
                }
            }
            return Err(e.into());
        }
        drop(scratch);
        drop(retired);
        PersistedIndex::load(target, &embedder_id)
    }
}
