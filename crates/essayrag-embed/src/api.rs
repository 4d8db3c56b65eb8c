//! Hosted embeddings over an OpenAI-compatible `/embeddings` endpoint.
//!
//! Works against any server speaking the same request/response shape. The key
//! comes from the config or the `OPENAI_API_KEY` environment variable; a
//! missing key only surfaces when a batch is actually embedded.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use essayrag_core::traits::Embedder;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ApiEmbedderConfig {
    /// Falls back to `OPENAI_API_KEY`.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub dimension: usize,
    pub timeout_secs: u64,
    /// Maximum texts per request.
    pub max_batch_size: usize,
}

impl Default for ApiEmbedderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimension: 1536,
            timeout_secs: 30,
            max_batch_size: 2048,
        }
    }
}

impl ApiEmbedderConfig {
    fn api_key(&self) -> Result<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| anyhow!("API key not set. Set OPENAI_API_KEY or configure an api_key"))
    }
}

pub struct ApiEmbedder {
    config: ApiEmbedderConfig,
    client: reqwest::blocking::Client,
    id: String,
}

impl ApiEmbedder {
    pub fn new(config: ApiEmbedderConfig) -> Result<Self> {
        if config.max_batch_size == 0 {
            bail!("max_batch_size must be at least 1");
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("building HTTP client")?;
        let id = format!("api:{}:d{}", config.model, config.dimension);
        Ok(Self { config, client, id })
    }

    fn call_embeddings_api(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let api_key = self.config.api_key()?;
        let url = format!("{}/embeddings", self.config.base_url.trim_end_matches('/'));
        let request = EmbeddingsRequest { model: &self.config.model, input: texts };

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .context("embedding API request failed")?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_else(|_| "unable to read response body".to_string());
            bail!("embedding API returned {}: {}", status, body);
        }
        let result: EmbeddingsResponse = response.json().context("failed to parse embedding response")?;

        let mut data = result.data;
        data.sort_by_key(|d| d.index);
        if data.len() != texts.len() {
            bail!("embedding API returned {} vectors for {} inputs", data.len(), texts.len());
        }
        if let Some(bad) = data.iter().find(|d| d.embedding.len() != self.config.dimension) {
            bail!("embedding API returned dimension {}, expected {}", bad.embedding.len(), self.config.dimension);
        }
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

impl Embedder for ApiEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.config.dimension
    }

    fn max_len(&self) -> usize {
        8191
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.max_batch_size) {
            debug!(batch = batch.len(), model = %self.config.model, "requesting embeddings");
            out.extend(self.call_embeddings_api(batch)?);
        }
        Ok(out)
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
