#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use essayrag_core::corpus::source_link;
use essayrag_core::traits::{Embedder, LanguageModel};
use essayrag_core::types::{ChatMessage, Document};
use essayrag_core::{Corpus, TokenCounter};

pub const BASE_URL: &str = "https://paulgraham.com";

/// One axis per keyword plus a small bias axis, L2-normalized. Texts about
/// different keywords end up far apart, which makes rankings predictable.
pub struct KeywordEmbedder {
    keywords: Vec<&'static str>,
    id: String,
    pub calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new(keywords: &[&'static str]) -> Self {
        Self { keywords: keywords.to_vec(), id: format!("keyword:d{}", keywords.len() + 1), calls: AtomicUsize::new(0) }
    }

    pub fn essays() -> Self {
        Self::new(&["cook", "startup", "paint"])
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let mut v: Vec<f32> = self.keywords.iter().map(|k| lower.matches(k).count() as f32).collect();
        v.push(0.1);
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        v.iter().map(|x| x / norm).collect()
    }
}

impl Embedder for KeywordEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }
    fn dim(&self) -> usize {
        self.keywords.len() + 1
    }
    fn max_len(&self) -> usize {
        usize::MAX
    }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

pub struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn embedder_id(&self) -> &str {
        "failing:d4"
    }
    fn dim(&self) -> usize {
        4
    }
    fn max_len(&self) -> usize {
        512
    }
    fn embed_batch(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        anyhow::bail!("connection refused")
    }
}

/// Wraps `KeywordEmbedder` but refuses any input over `limit` tokens, the
/// way hosted endpoints reject oversized requests.
pub struct LimitedEmbedder {
    inner: KeywordEmbedder,
    counter: TokenCounter,
    limit: usize,
    pub longest: AtomicUsize,
}

impl LimitedEmbedder {
    pub fn new(limit: usize) -> Self {
        Self {
            inner: KeywordEmbedder::essays(),
            counter: TokenCounter::cl100k().expect("tokenizer"),
            limit,
            longest: AtomicUsize::new(0),
        }
    }
}

impl Embedder for LimitedEmbedder {
    fn embedder_id(&self) -> &str {
        "limited:d4"
    }
    fn dim(&self) -> usize {
        self.inner.dim()
    }
    fn max_len(&self) -> usize {
        self.limit
    }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        for text in texts {
            let tokens = self.counter.count(text);
            self.longest.fetch_max(tokens, Ordering::SeqCst);
            if tokens > self.limit {
                anyhow::bail!("input of {tokens} tokens exceeds the {} token limit", self.limit);
            }
        }
        self.inner.embed_batch(texts)
    }
}

pub struct FailingModel;

impl LanguageModel for FailingModel {
    fn model_id(&self) -> &str {
        "failing-llm"
    }
    fn complete(&self, _messages: &[ChatMessage], _max_tokens: u32, _temperature: f32) -> anyhow::Result<String> {
        anyhow::bail!("rate limited")
    }
}

pub struct EchoModel;

impl LanguageModel for EchoModel {
    fn model_id(&self) -> &str {
        "echo"
    }
    fn complete(&self, messages: &[ChatMessage], _max_tokens: u32, _temperature: f32) -> anyhow::Result<String> {
        Ok(format!("SUMMARY({} messages)", messages.len()))
    }
}

pub fn doc(id: &str, title: &str, body: &str) -> Document {
    Document { id: id.into(), title: title.into(), body: body.into(), source_link: source_link(BASE_URL, id) }
}

/// Three essays on separate topics; the second one is long enough to span
/// several small chunks.
pub fn essay_corpus() -> Corpus {
    let startup_body = (0..12)
        .map(|i| format!("Startups grow fast when founders talk to users, lesson {i}."))
        .collect::<Vec<_>>()
        .join(" ");
    Corpus::from_documents(vec![
        doc("cooking", "How to Cook", "Cook slowly. A good cook tastes everything while cooking dinner."),
        doc("startups", "How Startups Grow", &startup_body),
        doc("painting", "Hackers and Painters", "Painters paint every day. Painting teaches you to paint what you see."),
    ])
}
