//! essayrag-core
//!
//! Data model, error taxonomy, configuration and capability traits shared by
//! the embedding, vector and retrieval crates, plus the corpus loader and the
//! two chunking strategies.

pub mod chunker;
pub mod config;
pub mod corpus;
pub mod error;
pub mod tokens;
pub mod traits;
pub mod types;

pub use chunker::{build_chunker, ChunkStrategy, ParagraphChunker, TokenWindowChunker};
pub use corpus::{Corpus, CorpusLoader};
pub use error::{Error, Result};
pub use tokens::TokenCounter;
pub use types::{ChatMessage, ChatRole, Chunk, ContextBlock, Document, Neighbor, RankedResult};
