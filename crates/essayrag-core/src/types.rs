//! Domain types shared by the loader, chunkers, indices and the retrieval pipeline.

use serde::{Deserialize, Serialize};

use crate::tokens::TokenCounter;

pub type DocumentId = String;

/// One corpus entry: an essay with its title, body and derived source link.
///
/// - `id`: file stem of the source file
/// - `title`: non-empty text preceding the `title\n---\nbody` delimiter
/// - `body`: everything after the delimiter
/// - `source_link`: `<base_url>/<id>.html`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    pub body: String,
    pub source_link: String,
}

/// A bounded excerpt of a parent document.
///
/// `index` is the zero-based position within the parent; `token_count` is
/// measured with the shared [`TokenCounter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub parent_id: DocumentId,
    pub index: usize,
    pub token_count: usize,
    pub text: String,
}

impl Chunk {
    /// Stable identifier used by the persisted flat index.
    pub fn key(&self) -> String {
        format!("{}_chunk_{}", self.parent_id, self.index)
    }
}

/// A hit returned by a `VectorIndex`. `position` is the insertion order of the
/// matching vector, `distance` the Euclidean distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// A ranked item: results are ordered ascending by distance, rank starts at 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedResult<T> {
    pub rank: usize,
    pub distance: f32,
    pub score: f32,
    pub item: T,
}

impl<T> RankedResult<T> {
    pub fn new(rank: usize, distance: f32, item: T) -> Self {
        Self { rank, distance, score: similarity_score(distance), item }
    }

    /// Same rank and distance, different payload.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RankedResult<U> {
        RankedResult { rank: self.rank, distance: self.distance, score: self.score, item: f(self.item) }
    }
}

/// Maps a distance onto `(0, 1]`; higher is more similar.
pub fn similarity_score(distance: f32) -> f32 {
    1.0 / (1.0 + distance)
}

/// Turns index neighbors (already sorted) into ranked results, resolving each
/// position through `resolve`. The first position that fails to resolve
/// aborts the ranking.
pub fn rank_neighbors<T, E>(
    neighbors: &[Neighbor],
    mut resolve: impl FnMut(usize) -> Result<T, E>,
) -> Result<Vec<RankedResult<T>>, E> {
    neighbors
        .iter()
        .enumerate()
        .map(|(i, n)| Ok(RankedResult::new(i + 1, n.distance, resolve(n.position)?)))
        .collect()
}

/// The assembled, citation-annotated context handed to the final prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextBlock {
    pub sources: Vec<String>,
    pub summary_text: String,
    pub token_count: usize,
}

impl ContextBlock {
    /// Builds the block and records the token count of its rendered form.
    pub fn new(sources: Vec<String>, summary_text: String, counter: &TokenCounter) -> Self {
        let mut block = Self { sources, summary_text, token_count: 0 };
        block.token_count = counter.count(&block.render());
        block
    }

    pub fn render(&self) -> String {
        format!("Sources:\n    {}\n\n    Summary: {}", self.sources.join(",\n"), self.summary_text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }
}
