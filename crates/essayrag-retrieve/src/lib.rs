//! essayrag-retrieve
//!
//! The query pipeline: two-stage retrieval over a corpus, context assembly
//! with citations, summarization with a truncation fallback and the final
//! prompt. Also stages a corpus into a persisted flat index for single-stage
//! search.

pub mod assembler;
pub mod llm;
pub mod prompt;
pub mod retriever;
pub mod session;
pub mod staging;
pub mod summarizer;

pub use assembler::{combine_chunks, sources, summary_directive, ContextAssembler, CHUNK_SEPARATOR};
pub use llm::{ChatModelConfig, OpenAiChatModel};
pub use prompt::{build_prompt, Persona};
pub use retriever::{ChunkHit, DocumentHit, Retrieval, RetrievalOptions, TwoStageRetriever};
pub use session::{PromptOutcome, RetrievalSession, RetrievalSessionBuilder};
pub use staging::{stage_corpus, StagingReport};
pub use summarizer::{truncate_fallback, Summarizer, TRUNCATION_MARKER};
pub use essayrag_vector::FlatHit;
