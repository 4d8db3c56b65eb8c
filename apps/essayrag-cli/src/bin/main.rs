use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use essayrag_core::config::{expand_path, Config, Settings};
use essayrag_core::{Corpus, CorpusLoader};
use essayrag_retrieve::{PromptOutcome, RetrievalOptions, RetrievalSession};

#[derive(Parser)]
#[command(name = "essayrag")]
#[command(about = "Grounded prompts from a corpus of essays", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Print results as JSON on stdout
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Two-stage retrieval, summarization and final prompt for a query
    Prompt {
        query: String,
        /// Directory of prepared `.txt` essays
        #[arg(long)]
        corpus: Option<String>,
        #[arg(long)]
        top_docs: Option<usize>,
        #[arg(long)]
        top_chunks: Option<usize>,
        /// Skip the hosted language model; the summary degrades to truncation
        #[arg(long)]
        offline: bool,
    },
    /// Chunk and embed the whole corpus into a persisted flat index
    Stage {
        #[arg(long)]
        corpus: Option<String>,
        #[arg(long)]
        out: Option<String>,
    },
    /// Nearest staged chunks for a query
    Search {
        query: String,
        #[arg(long)]
        index: Option<String>,
        #[arg(short, default_value = "3")]
        k: usize,
    },
    /// List loaded documents with their token counts
    Inspect {
        #[arg(long)]
        corpus: Option<String>,
    },
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn load_corpus(settings: &Settings, dir: Option<&str>) -> anyhow::Result<Corpus> {
    let dir = expand_path(dir.unwrap_or(settings.data.corpus_dir.as_str()));
    Ok(CorpusLoader::new(&settings.prompt.source_base_url).load_dir(&dir)?)
}

fn preview(text: &str, chars: usize) -> String {
    let mut out: String = text.chars().take(chars).collect();
    if text.chars().count() > chars {
        out.push_str("...");
    }
    out
}

fn print_outcome(outcome: &PromptOutcome) {
    let retrieval = &outcome.retrieval;
    println!("\nTop {} most similar essays:", retrieval.documents.len());
    for d in &retrieval.documents {
        println!("{}. {} ({}) (distance: {:.2})", d.rank, d.item.title, d.item.source_link, d.distance);
    }
    println!();
    for (i, (title, n)) in retrieval.chunk_counts().into_iter().enumerate() {
        println!("Essay {} ({}) split into {} chunks", i + 1, title, n);
    }
    println!("\nTop chunks selected:");
    for c in &retrieval.chunks {
        println!("{}. {} (distance: {:.2}, tokens: {})", c.rank, c.item.citation(), c.distance, c.item.chunk.token_count);
    }
    println!("\nTotal tokens in final context: {}", outcome.context.token_count);
    println!("{}", "-".repeat(80));
    println!("{}", outcome.rendered_context);
    println!("{}", "-".repeat(80));
    println!("\nThis prompt would be sent to the LLM:");
    println!("{}", "-".repeat(80));
    println!("{}", outcome.prompt);
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {e:#}");
        e
    })?;
    let mut settings = config.settings()?;

    match cli.command {
        Commands::Prompt { query, corpus, top_docs, top_chunks, offline } => {
            if let Some(n) = top_docs {
                settings.retrieval.top_docs = n;
            }
            if let Some(n) = top_chunks {
                settings.retrieval.top_chunks = n;
            }
            let corpus = load_corpus(&settings, corpus.as_deref())?;
            let session = RetrievalSession::from_settings(&settings, offline)?;
            let RetrievalOptions { top_docs, top_chunks } = session.options();
            tracing::info!(top_docs, top_chunks, embedder = session.embedder_id(), "🔍 running query");
            let outcome = session.build_prompt_for(&query, &corpus)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_outcome(&outcome);
            }
        }
        Commands::Stage { corpus, out } => {
            let corpus = load_corpus(&settings, corpus.as_deref())?;
            let out = expand_path(out.as_deref().unwrap_or(settings.data.index_dir.as_str()));
            let mut session = RetrievalSession::from_settings(&settings, true)?;
            let report = session.stage(&corpus, &out)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "✅ Staged {} of {} chunks from {} essays into {} ({} batches skipped)",
                    report.embedded,
                    report.chunks,
                    report.documents,
                    report.dir.display(),
                    report.skipped_batches
                );
            }
        }
        Commands::Search { query, index, k } => {
            let dir: PathBuf = expand_path(index.as_deref().unwrap_or(settings.data.index_dir.as_str()));
            let mut session = RetrievalSession::from_settings(&settings, true)?;
            session.load_index(&dir)?;
            let hits = session.search_flat(&query, k)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else {
                for hit in &hits {
                    println!("\nTitle: {} (Chunk {})", hit.item.title, hit.item.chunk_num);
                    println!("Score: {:.3}", hit.score);
                    println!("Preview: {}", preview(&hit.item.content, 200));
                }
            }
        }
        Commands::Inspect { corpus } => {
            let corpus = load_corpus(&settings, corpus.as_deref())?;
            let counter = essayrag_core::TokenCounter::cl100k()?;
            let tokens: Vec<usize> = corpus.documents().iter().map(|d| counter.count(&d.body)).collect();
            if cli.json {
                let rows: Vec<serde_json::Value> = corpus
                    .documents()
                    .iter()
                    .zip(&tokens)
                    .map(|(d, t)| serde_json::json!({ "id": d.id, "title": d.title, "source_link": d.source_link, "tokens": t }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                for (doc, t) in corpus.documents().iter().zip(&tokens) {
                    println!("{:<32} {:>7} tokens  {}", doc.id, t, doc.title);
                }
                println!("📊 {} essays", corpus.len());
            }
        }
    }
    Ok(())
}
