//! Formats ranked chunks with citations and produces the context block.

use essayrag_core::tokens::TokenCounter;
use essayrag_core::types::{ContextBlock, RankedResult};

use crate::retriever::ChunkHit;
use crate::summarizer::Summarizer;

pub const CHUNK_SEPARATOR: &str = "\n\n---\n\n";

/// Every chunk prefixed by its citation, joined by [`CHUNK_SEPARATOR`].
pub fn combine_chunks(chunks: &[RankedResult<ChunkHit>]) -> String {
    chunks
        .iter()
        .map(|r| format!("From {}:\n{}", r.item.citation(), r.item.chunk.text))
        .collect::<Vec<_>>()
        .join(CHUNK_SEPARATOR)
}

/// One `"title" (link)` entry per ranked chunk. Repeats are kept.
pub fn sources(chunks: &[RankedResult<ChunkHit>]) -> Vec<String> {
    chunks.iter().map(|r| r.item.source()).collect()
}

pub fn summary_directive(query: &str) -> String {
    format!("Summarize into 300-400 words, make sure to focus on stuff relevant to the user prompt: '{query}'.")
}

pub struct ContextAssembler<'a> {
    summarizer: &'a Summarizer,
    counter: &'a TokenCounter,
}

impl<'a> ContextAssembler<'a> {
    pub fn new(summarizer: &'a Summarizer, counter: &'a TokenCounter) -> Self {
        Self { summarizer, counter }
    }

    /// Summarizes the cited chunks for `query`. The returned block carries the
    /// token count of its rendered form; nothing is cut here.
    pub fn assemble(&self, chunks: &[RankedResult<ChunkHit>], query: &str) -> ContextBlock {
        let combined = combine_chunks(chunks);
        let summary = self.summarizer.summarize(&combined, &summary_directive(query));
        ContextBlock::new(sources(chunks), summary, self.counter)
    }
}
