//! The two chunking strategies behind the [`Chunker`] capability.
//!
//! - [`TokenWindowChunker`]: fixed-size token windows with overlap, used for
//!   the per-query chunk pass of two-stage retrieval.
//! - [`ParagraphChunker`]: greedy paragraph packing under a character budget,
//!   used when staging one flat index over the whole corpus.

use std::ops::Range;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tokens::TokenCounter;
use crate::traits::Chunker;
use crate::types::Chunk;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChunkStrategy {
    TokenWindow { chunk_size: usize, overlap: usize },
    Paragraph { max_chars: usize },
}

pub fn build_chunker(strategy: ChunkStrategy, counter: Arc<TokenCounter>) -> Result<Box<dyn Chunker>> {
    Ok(match strategy {
        ChunkStrategy::TokenWindow { chunk_size, overlap } => {
            Box::new(TokenWindowChunker::new(counter, chunk_size, overlap)?)
        }
        ChunkStrategy::Paragraph { max_chars } => Box::new(ParagraphChunker::new(counter, max_chars)?),
    })
}

pub struct TokenWindowChunker {
    counter: Arc<TokenCounter>,
    chunk_size: usize,
    overlap: usize,
}

impl TokenWindowChunker {
    /// Fails with `Error::Configuration` unless `0 <= overlap < chunk_size`.
    pub fn new(counter: Arc<TokenCounter>, chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Configuration("chunk_size must be at least 1".into()));
        }
        if overlap >= chunk_size {
            return Err(Error::Configuration(format!(
                "overlap ({overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { counter, chunk_size, overlap })
    }

    pub fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }

    /// Token ranges of the windows over a sequence of `len` tokens: starts at
    /// `0, stride, 2*stride, ...` while the start is below `len`.
    pub fn windows(&self, len: usize) -> Vec<Range<usize>> {
        (0..len)
            .step_by(self.stride())
            .map(|start| start..(start + self.chunk_size).min(len))
            .collect()
    }
}

impl Chunker for TokenWindowChunker {
    fn chunk(&self, parent_id: &str, text: &str) -> Vec<Chunk> {
        let tokens = self.counter.encode(text);
        self.windows(tokens.len())
            .into_iter()
            .enumerate()
            .map(|(index, range)| Chunk {
                parent_id: parent_id.to_string(),
                index,
                token_count: range.len(),
                text: self.counter.decode(&tokens[range]),
            })
            .collect()
    }
}

pub struct ParagraphChunker {
    counter: Arc<TokenCounter>,
    max_chars: usize,
}

impl ParagraphChunker {
    pub fn new(counter: Arc<TokenCounter>, max_chars: usize) -> Result<Self> {
        if max_chars == 0 {
            return Err(Error::Configuration("max_chars must be at least 1".into()));
        }
        Ok(Self { counter, max_chars })
    }

    /// Greedy packing: a paragraph joins the current chunk while the
    /// accumulated length stays under the budget, otherwise the chunk is
    /// flushed. A single oversized paragraph becomes its own chunk.
    pub fn split(&self, text: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut current = String::new();
        let mut current_chars = 0usize;
        for para in text.split("\n\n") {
            let para_chars = para.chars().count();
            if current_chars + para_chars >= self.max_chars {
                let flushed = current.trim();
                if !flushed.is_empty() {
                    out.push(flushed.to_string());
                }
                current.clear();
                current_chars = 0;
            }
            current.push_str(para);
            current.push_str("\n\n");
            current_chars += para_chars + 2;
        }
        let rest = current.trim();
        if !rest.is_empty() {
            out.push(rest.to_string());
        }
        out
    }
}

impl Chunker for ParagraphChunker {
    fn chunk(&self, parent_id: &str, text: &str) -> Vec<Chunk> {
        self.split(text)
            .into_iter()
            .enumerate()
            .map(|(index, text)| Chunk {
                parent_id: parent_id.to_string(),
                index,
                token_count: self.counter.count(&text),
                text,
            })
            .collect()
    }
}
