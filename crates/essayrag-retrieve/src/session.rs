//! `RetrievalSession`: the explicit owner of the embedder, chunkers,
//! summarizer and optional persisted index. Nothing is global, so several
//! sessions can live side by side in one process.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use essayrag_core::chunker::{build_chunker, ChunkStrategy};
use essayrag_core::config::Settings;
use essayrag_core::corpus::Corpus;
use essayrag_core::error::{Error, Result};
use essayrag_core::tokens::TokenCounter;
use essayrag_core::traits::{Chunker, Embedder, LanguageModel};
use essayrag_core::types::{ContextBlock, RankedResult};
use essayrag_vector::{FlatHit, PersistedIndex};

use crate::assembler::ContextAssembler;
use crate::llm::{ChatModelConfig, OpenAiChatModel};
use crate::prompt::{build_prompt, Persona};
use crate::retriever::{Retrieval, RetrievalOptions, TwoStageRetriever};
use crate::staging::{stage_corpus, StagingReport};
use crate::summarizer::Summarizer;

/// Everything the full pipeline produced for one query.
#[derive(Debug, Clone, Serialize)]
pub struct PromptOutcome {
    pub query: String,
    pub retrieval: Retrieval,
    pub context: ContextBlock,
    pub rendered_context: String,
    pub prompt: String,
}

pub struct RetrievalSessionBuilder {
    embedder: Box<dyn Embedder>,
    language_model: Option<Box<dyn LanguageModel>>,
    options: RetrievalOptions,
    chunking: ChunkStrategy,
    staging: ChunkStrategy,
    persona: Persona,
    max_tokens: u32,
    temperature: f32,
    batch_size: usize,
}

impl RetrievalSessionBuilder {
    pub fn language_model(mut self, model: Box<dyn LanguageModel>) -> Self {
        self.language_model = Some(model);
        self
    }

    pub fn options(mut self, options: RetrievalOptions) -> Self {
        self.options = options;
        self
    }

    pub fn chunking(mut self, chunk_size: usize, overlap: usize) -> Self {
        self.chunking = ChunkStrategy::TokenWindow { chunk_size, overlap };
        self
    }

    pub fn staging_strategy(mut self, strategy: ChunkStrategy) -> Self {
        self.staging = strategy;
        self
    }

    pub fn persona(mut self, persona: Persona) -> Self {
        self.persona = persona;
        self
    }

    pub fn summary_limits(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Validates options and chunking parameters, failing with
    /// `Error::Configuration` before any query runs.
    pub fn build(self) -> Result<RetrievalSession> {
        self.options.validate()?;
        if self.batch_size == 0 {
            return Err(Error::Configuration("batch_size must be at least 1".into()));
        }
        let counter = Arc::new(TokenCounter::cl100k().map_err(|e| Error::Configuration(format!("{e:#}")))?);
        let chunker = build_chunker(self.chunking, counter.clone())?;
        let staging_chunker = build_chunker(self.staging, counter.clone())?;
        let summarizer =
            Summarizer::new(self.language_model, self.persona.name.clone()).with_limits(self.max_tokens, self.temperature);
        Ok(RetrievalSession {
            embedder: self.embedder,
            chunker,
            staging_chunker,
            counter,
            summarizer,
            persona: self.persona,
            options: self.options,
            batch_size: self.batch_size,
            index: None,
        })
    }
}

pub struct RetrievalSession {
    embedder: Box<dyn Embedder>,
    chunker: Box<dyn Chunker>,
    staging_chunker: Box<dyn Chunker>,
    counter: Arc<TokenCounter>,
    summarizer: Summarizer,
    persona: Persona,
    options: RetrievalOptions,
    batch_size: usize,
    index: Option<PersistedIndex>,
}

impl RetrievalSession {
    pub fn builder(embedder: Box<dyn Embedder>) -> RetrievalSessionBuilder {
        RetrievalSessionBuilder {
            embedder,
            language_model: None,
            options: RetrievalOptions::default(),
            chunking: ChunkStrategy::TokenWindow { chunk_size: 500, overlap: 50 },
            staging: ChunkStrategy::Paragraph { max_chars: 4000 },
            persona: Persona::default(),
            max_tokens: 400,
            temperature: 0.3,
            batch_size: 64,
        }
    }

    /// Wires the configured backends. `offline` leaves the summarizer without
    /// a language model, so it always truncates.
    pub fn from_settings(settings: &Settings, offline: bool) -> Result<Self> {
        let embedder = essayrag_embed::build_embedder(&settings.embedding)
            .map_err(|e| Error::Configuration(format!("cannot build embedder: {e:#}")))?;
        let mut builder = Self::builder(embedder)
            .options(RetrievalOptions { top_docs: settings.retrieval.top_docs, top_chunks: settings.retrieval.top_chunks })
            .chunking(settings.retrieval.chunk_size, settings.retrieval.overlap)
            .staging_strategy(settings.staging_strategy())
            .persona(Persona { name: settings.prompt.persona.clone(), bio: settings.prompt.persona_bio.clone() })
            .summary_limits(settings.summarizer.max_tokens, settings.summarizer.temperature)
            .batch_size(settings.embedding.batch_size);
        if !offline {
            let model = OpenAiChatModel::new(ChatModelConfig {
                base_url: settings.summarizer.base_url.clone(),
                model: settings.summarizer.model.clone(),
                timeout_secs: settings.summarizer.timeout_secs,
                ..Default::default()
            })
            .map_err(|e| Error::Configuration(format!("{e:#}")))?;
            builder = builder.language_model(Box::new(model));
        }
        builder.build()
    }

    pub fn embedder_id(&self) -> &str {
        self.embedder.embedder_id()
    }

    pub fn options(&self) -> RetrievalOptions {
        self.options
    }

    pub fn token_counter(&self) -> &TokenCounter {
        &self.counter
    }

    pub fn summarizer(&self) -> &Summarizer {
        &self.summarizer
    }

    pub fn index(&self) -> Option<&PersistedIndex> {
        self.index.as_ref()
    }

    pub fn retrieve(&self, query: &str, corpus: &Corpus) -> Result<Retrieval> {
        self.retrieve_with(query, corpus, self.options)
    }

    pub fn retrieve_with(&self, query: &str, corpus: &Corpus, options: RetrievalOptions) -> Result<Retrieval> {
        TwoStageRetriever::new(self.embedder.as_ref(), self.chunker.as_ref(), &self.counter).retrieve(query, corpus, options)
    }

    pub fn assemble(&self, retrieval: &Retrieval, query: &str) -> ContextBlock {
        ContextAssembler::new(&self.summarizer, &self.counter).assemble(&retrieval.chunks, query)
    }

    /// Runs retrieval, assembly and summarization, then renders the final prompt.
    pub fn build_prompt_for(&self, query: &str, corpus: &Corpus) -> Result<PromptOutcome> {
        let retrieval = self.retrieve(query, corpus)?;
        let context = self.assemble(&retrieval, query);
        let example_title = retrieval.documents.first().map(|d| d.item.title.as_str()).unwrap_or_default();
        let prompt = build_prompt(&context, query, example_title, &self.persona);
        info!(query, context_tokens = context.token_count, prompt_tokens = self.counter.count(&prompt), "prompt built");
        Ok(PromptOutcome { query: query.to_string(), rendered_context: context.render(), retrieval, context, prompt })
    }

    /// Stages `corpus` into `out_dir` and swaps the new index in.
    pub fn stage(&mut self, corpus: &Corpus, out_dir: &Path) -> Result<StagingReport> {
        let (index, report) =
            stage_corpus(corpus, self.staging_chunker.as_ref(), self.embedder.as_ref(), out_dir, self.batch_size)?;
        self.index = Some(index);
        Ok(report)
    }

    pub fn load_index(&mut self, dir: &Path) -> Result<()> {
        let index = PersistedIndex::load(dir, self.embedder.embedder_id())?;
        self.attach_index(index)
    }

    /// Replaces the current index. It must come from this session's embedder.
    pub fn attach_index(&mut self, index: PersistedIndex) -> Result<()> {
        if index.embedder_id() != self.embedder.embedder_id() {
            return Err(Error::Store(format!(
                "index was built with `{}` but the session embeds with `{}`",
                index.embedder_id(),
                self.embedder.embedder_id()
            )));
        }
        if index.dim() != self.embedder.dim() {
            return Err(Error::DimensionMismatch { expected: self.embedder.dim(), actual: index.dim() });
        }
        self.index = Some(index);
        Ok(())
    }

    /// k-nearest staged chunks for `query`.
    pub fn search_flat(&self, query: &str, k: usize) -> Result<Vec<RankedResult<FlatHit>>> {
        let index = self
            .index
            .as_ref()
            .ok_or_else(|| Error::IndexNotBuilt("no persisted index loaded; stage or load one first".into()))?;
        let query_vector = self
            .embedder
            .embed_batch(&[query.to_string()])
            .map_err(Error::embedding)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("embedder returned no vector for the query".into()))?;
        index.search(&query_vector, k)
    }
}
