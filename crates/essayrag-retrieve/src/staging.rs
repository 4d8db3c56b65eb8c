//! Whole-corpus staging into the persisted flat index.

use std::path::{Path, PathBuf};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{info, warn};

use essayrag_core::corpus::Corpus;
use essayrag_core::error::{Error, Result};
use essayrag_core::traits::{Chunker, Embedder};
use essayrag_vector::{MappingEntry, PersistedIndex};

#[derive(Debug, Clone, Serialize)]
pub struct StagingReport {
    pub dir: PathBuf,
    pub documents: usize,
    pub chunks: usize,
    pub embedded: usize,
    pub skipped_batches: usize,
    pub elapsed_ms: u64,
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Chunks every document, embeds the chunks in batches of `batch_size` and
/// writes them to a new persisted index at `out_dir`.
///
/// A batch the embedder rejects is logged and skipped. Staging only fails
/// outright when not a single chunk could be embedded. The new index is built
/// beside `out_dir` and only replaces an existing one there on success.
pub fn stage_corpus(
    corpus: &Corpus,
    chunker: &dyn Chunker,
    embedder: &dyn Embedder,
    out_dir: &Path,
    batch_size: usize,
) -> Result<(PersistedIndex, StagingReport)> {
    if corpus.is_empty() {
        return Err(Error::EmptyCorpus("nothing to stage".into()));
    }
    if batch_size == 0 {
        return Err(Error::Configuration("batch_size must be at least 1".into()));
    }
    let start = Instant::now();

    let mut pending: Vec<(String, MappingEntry)> = Vec::new();
    for doc in corpus.documents() {
        for chunk in chunker.chunk(&doc.id, &doc.body) {
            pending.push((
                chunk.key(),
                MappingEntry { filename: format!("{}.txt", doc.id), title: doc.title.clone(), chunk_num: chunk.index, content: chunk.text },
            ));
        }
    }
    info!(documents = corpus.len(), chunks = pending.len(), embedder = embedder.embedder_id(), "staging corpus");

    let mut staged = PersistedIndex::stage_for(out_dir, embedder.embedder_id(), embedder.dim())?;
    let pb = progress_bar(pending.len());
    let total = pending.len();
    let mut skipped_batches = 0usize;
    let mut remaining = pending.into_iter().peekable();
    while remaining.peek().is_some() {
        let batch: Vec<(String, MappingEntry)> = remaining.by_ref().take(batch_size).collect();
        let texts: Vec<String> = batch.iter().map(|(_, e)| e.content.clone()).collect();
        let first_id = batch[0].0.clone();
        pb.inc(batch.len() as u64);
        match embedder.embed_batch(&texts) {
            Ok(vectors) if vectors.len() == texts.len() => {
                pb.set_message(first_id);
                staged.append(batch, &vectors)?;
            }
            Ok(vectors) => {
                warn!(batch_start = %first_id, got = vectors.len(), want = texts.len(), "embedder returned wrong vector count; skipping batch");
                skipped_batches += 1;
            }
            Err(e) => {
                warn!(batch_start = %first_id, error = %format!("{e:#}"), "embedding failed; skipping batch");
                skipped_batches += 1;
            }
        }
    }

    if staged.is_empty() {
        pb.abandon_with_message("❌ nothing embedded");
        return Err(Error::EmptyCorpus(format!("none of the {total} chunks could be embedded")));
    }
    let index = staged.publish(out_dir)?;
    pb.finish_with_message("✅ staging completed!");

    let report = StagingReport {
        dir: out_dir.to_path_buf(),
        documents: corpus.len(),
        chunks: total,
        embedded: index.len(),
        skipped_batches,
        elapsed_ms: start.elapsed().as_millis() as u64,
    };
    info!(embedded = report.embedded, skipped_batches, ms = report.elapsed_ms, "📊 staging finished");
    Ok((index, report))
}
