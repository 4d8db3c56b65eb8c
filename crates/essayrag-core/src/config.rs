//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (nested keys split on `__`, e.g.
//! `APP_RETRIEVAL__TOP_DOCS=5`). Credentials are never read from here: the
//! hosted clients take `OPENAI_API_KEY` from the environment.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::chunker::ChunkStrategy;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub embedding: EmbeddingSettings,
    pub retrieval: RetrievalSettings,
    pub staging: StagingSettings,
    pub summarizer: SummarizerSettings,
    pub prompt: PromptSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub corpus_dir: String,
    pub index_dir: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self { corpus_dir: "extracted".into(), index_dir: "index".into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Sentence encoder running in-process.
    Local,
    /// Hosted OpenAI-compatible `/embeddings` endpoint.
    Api,
    /// Hashed bag-of-words vectors for tests and offline development.
    Fake,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub backend: EmbeddingBackend,
    pub model_dir: Option<String>,
    pub api_model: String,
    pub api_base_url: String,
    pub api_dimension: usize,
    pub batch_size: usize,
    pub cache: bool,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Local,
            model_dir: None,
            api_model: "text-embedding-3-small".into(),
            api_base_url: "https://api.openai.com/v1".into(),
            api_dimension: 1536,
            batch_size: 64,
            cache: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_docs: usize,
    pub top_chunks: usize,
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_docs: 3, top_chunks: 5, chunk_size: 500, overlap: 50 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagingStrategy {
    Paragraph,
    TokenWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingSettings {
    pub strategy: StagingStrategy,
    pub max_chars: usize,
}

impl Default for StagingSettings {
    fn default() -> Self {
        Self { strategy: StagingStrategy::Paragraph, max_chars: 4000 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerSettings {
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for SummarizerSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o".into(),
            base_url: "https://api.openai.com/v1".into(),
            max_tokens: 400,
            temperature: 0.3,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    pub persona: String,
    pub persona_bio: String,
    pub source_base_url: String,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            persona: "Paul Graham".into(),
            persona_bio: "founder of Y Combinator and essayist".into(),
            source_base_url: "https://paulgraham.com".into(),
        }
    }
}

impl Settings {
    /// Chunking strategy for the per-query chunk pass.
    pub fn retrieval_strategy(&self) -> ChunkStrategy {
        ChunkStrategy::TokenWindow { chunk_size: self.retrieval.chunk_size, overlap: self.retrieval.overlap }
    }

    /// Chunking strategy for whole-corpus staging.
    pub fn staging_strategy(&self) -> ChunkStrategy {
        match self.staging.strategy {
            StagingStrategy::Paragraph => ChunkStrategy::Paragraph { max_chars: self.staging.max_chars },
            StagingStrategy::TokenWindow => self.retrieval_strategy(),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let r = &self.retrieval;
        if r.top_docs == 0 || r.top_chunks == 0 {
            anyhow::bail!("retrieval.top_docs and retrieval.top_chunks must be at least 1");
        }
        if r.chunk_size == 0 || r.overlap >= r.chunk_size {
            anyhow::bail!("retrieval.overlap ({}) must be smaller than retrieval.chunk_size ({})", r.overlap, r.chunk_size);
        }
        if self.embedding.batch_size == 0 {
            anyhow::bail!("embedding.batch_size must be at least 1");
        }
        if self.staging.max_chars == 0 {
            anyhow::bail!("staging.max_chars must be at least 1");
        }
        Ok(())
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate_for_env(&env_name)?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn settings(&self) -> anyhow::Result<Settings> {
        self.figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to extract settings: {}", e))
    }

    fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        let settings = self.settings()?;
        settings.validate()?;
        if matches!(env, "prod" | "production") && settings.embedding.backend == EmbeddingBackend::Fake {
            anyhow::bail!("embedding.backend = \"fake\" is not allowed in production");
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
