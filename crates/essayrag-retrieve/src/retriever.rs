//! Two-stage retrieval: rank whole documents, then rank chunks of the winners.
//!
//! Both stages build a fresh exact L2 index per call, so results depend only
//! on the corpus, the embedder and the query.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use essayrag_core::corpus::Corpus;
use essayrag_core::error::{Error, Result};
use essayrag_core::tokens::TokenCounter;
use essayrag_core::traits::{Chunker, Embedder, VectorIndex};
use essayrag_core::types::{rank_neighbors, Chunk, Document, RankedResult};
use essayrag_vector::FlatL2Index;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalOptions {
    pub top_docs: usize,
    pub top_chunks: usize,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self { top_docs: 3, top_chunks: 5 }
    }
}

impl RetrievalOptions {
    pub fn validate(&self) -> Result<()> {
        if self.top_docs == 0 || self.top_chunks == 0 {
            return Err(Error::Configuration(format!(
                "top_docs ({}) and top_chunks ({}) must be at least 1",
                self.top_docs, self.top_chunks
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentHit {
    pub id: String,
    pub title: String,
    pub source_link: String,
}

impl From<&Document> for DocumentHit {
    fn from(doc: &Document) -> Self {
        Self { id: doc.id.clone(), title: doc.title.clone(), source_link: doc.source_link.clone() }
    }
}

/// A candidate chunk together with the parent metadata needed for citations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkHit {
    pub title: String,
    pub source_link: String,
    pub chunk: Chunk,
}

impl ChunkHit {
    /// `"<title>" (<link>, Chunk <n>)`, with `n` counted from 1.
    pub fn citation(&self) -> String {
        format!("\"{}\" ({}, Chunk {})", self.title, self.source_link, self.chunk.index + 1)
    }

    /// The citation without its chunk number.
    pub fn source(&self) -> String {
        format!("\"{}\" ({})", self.title, self.source_link)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Retrieval {
    pub documents: Vec<RankedResult<DocumentHit>>,
    pub chunks: Vec<RankedResult<ChunkHit>>,
    /// Candidate chunk count per ranked document, in document rank order.
    pub chunks_per_document: Vec<(String, usize)>,
}

impl Retrieval {
    /// `(title, candidate chunk count)` per ranked document.
    pub fn chunk_counts(&self) -> Vec<(&str, usize)> {
        self.documents
            .iter()
            .zip(&self.chunks_per_document)
            .map(|(doc, (_, n))| (doc.item.title.as_str(), *n))
            .collect()
    }
}

pub struct TwoStageRetriever<'a> {
    embedder: &'a dyn Embedder,
    chunker: &'a dyn Chunker,
    counter: &'a TokenCounter,
}

impl<'a> TwoStageRetriever<'a> {
    pub fn new(embedder: &'a dyn Embedder, chunker: &'a dyn Chunker, counter: &'a TokenCounter) -> Self {
        Self { embedder, chunker, counter }
    }

    pub fn retrieve(&self, query: &str, corpus: &Corpus, options: RetrievalOptions) -> Result<Retrieval> {
        options.validate()?;
        if corpus.is_empty() {
            return Err(Error::EmptyCorpus("no documents to rank".into()));
        }
        let start = Instant::now();

        // Stage A: one vector per document body.
        let bodies: Vec<String> = corpus.documents().iter().map(|d| d.body.clone()).collect();
        let doc_vectors = self.embed(&bodies)?;
        let query_vector = self.embed(&[query.to_string()])?.remove(0);
        let doc_index = FlatL2Index::from_vectors(self.embedder.dim(), &doc_vectors)?;
        let doc_neighbors = doc_index.search(&query_vector, options.top_docs)?;
        let ranked_docs = rank_neighbors(&doc_neighbors, |position| {
            corpus
                .get(position)
                .ok_or_else(|| Error::IndexNotBuilt(format!("document index returned unknown position {position}")))
        })?;
        let top_docs: Vec<&Document> = ranked_docs.iter().map(|r| r.item).collect();
        let documents: Vec<RankedResult<DocumentHit>> =
            ranked_docs.into_iter().map(|r| r.map(DocumentHit::from)).collect();
        debug!(query, docs = documents.len(), "stage A ranked documents");

        // Stage B: chunk only the winners, rank all their chunks together.
        let mut candidates: Vec<ChunkHit> = Vec::new();
        let mut chunks_per_document = Vec::with_capacity(top_docs.len());
        for doc in &top_docs {
            let chunks = self.chunker.chunk(&doc.id, &doc.body);
            chunks_per_document.push((doc.id.clone(), chunks.len()));
            candidates.extend(chunks.into_iter().map(|chunk| ChunkHit {
                title: doc.title.clone(),
                source_link: doc.source_link.clone(),
                chunk,
            }));
        }

        let chunks = if candidates.is_empty() {
            Vec::new()
        } else {
            let texts: Vec<String> = candidates.iter().map(|c| c.chunk.text.clone()).collect();
            let chunk_vectors = self.embed(&texts)?;
            let chunk_index = FlatL2Index::from_vectors(self.embedder.dim(), &chunk_vectors)?;
            let k = options.top_chunks.min(candidates.len());
            let neighbors = chunk_index.search(&query_vector, k)?;
            rank_neighbors(&neighbors, |position| {
                candidates
                    .get(position)
                    .cloned()
                    .ok_or_else(|| Error::IndexNotBuilt(format!("chunk index returned unknown position {position}")))
            })?
        };

        info!(
            query,
            documents = documents.len(),
            candidates = candidates.len(),
            chunks = chunks.len(),
            ms = start.elapsed().as_millis() as u64,
            "retrieval finished"
        );
        Ok(Retrieval { documents, chunks, chunks_per_document })
    }

    /// Embeds `texts`, turning any provider failure or malformed output into
    /// `Error::Embedding`. Inputs longer than the embedder accepts are cut to
    /// its `max_len` first.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let clipped = self.clip_to_limit(texts);
        let vectors = self.embedder.embed_batch(&clipped).map_err(Error::embedding)?;
        if vectors.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "{} returned {} vectors for {} inputs",
                self.embedder.embedder_id(),
                vectors.len(),
                texts.len()
            )));
        }
        Ok(vectors)
    }

    fn clip_to_limit(&self, texts: &[String]) -> Vec<String> {
        let limit = self.embedder.max_len();
        if limit == usize::MAX {
            return texts.to_vec();
        }
        texts
            .iter()
            .map(|text| {
                let tokens = self.counter.encode(text);
                if tokens.len() <= limit {
                    return text.clone();
                }
                debug!(tokens = tokens.len(), limit, "clipping embedder input");
                self.counter.decode(&tokens[..limit])
            })
            .collect()
    }
}
