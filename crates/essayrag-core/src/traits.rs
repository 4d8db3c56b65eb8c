use crate::types::{ChatMessage, Chunk, Neighbor};

/// Maps text to fixed-dimension vectors. One call returns one vector per input,
/// in input order. Vectors from different `embedder_id`s live in different
/// spaces and must never share an index.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the backend/model (e.g. `local:bge-m3:d1024`).
    fn embedder_id(&self) -> &str;
    fn dim(&self) -> usize;
    /// Maximum input length (in model tokens) before truncation.
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn embedder_id(&self) -> &str { (**self).embedder_id() }
    fn dim(&self) -> usize { (**self).dim() }
    fn max_len(&self) -> usize { (**self).max_len() }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> { (**self).embed_batch(texts) }
}

/// Append-only nearest-neighbor index over L2 distance.
///
/// `search` returns at most `k` neighbors sorted ascending by distance, ties
/// in insertion order. Searching an index that holds no vectors is
/// `Error::IndexNotBuilt`.
pub trait VectorIndex: Send + Sync {
    fn dim(&self) -> usize;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool { self.len() == 0 }
    fn add(&mut self, vectors: &[Vec<f32>]) -> crate::error::Result<()>;
    fn search(&self, query: &[f32], k: usize) -> crate::error::Result<Vec<Neighbor>>;
}

/// Chat-style text generation (summarization and final answers).
pub trait LanguageModel: Send + Sync {
    fn model_id(&self) -> &str;
    fn complete(&self, messages: &[ChatMessage], max_tokens: u32, temperature: f32) -> anyhow::Result<String>;
}

/// Splits one document's text into ordered chunks with indices starting at 0.
pub trait Chunker: Send + Sync {
    fn chunk(&self, parent_id: &str, text: &str) -> Vec<Chunk>;
}
