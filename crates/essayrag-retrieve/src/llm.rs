//! Chat completions over an OpenAI-compatible `/chat/completions` endpoint.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use essayrag_core::traits::LanguageModel;
use essayrag_core::types::ChatMessage;

#[derive(Debug, Clone)]
pub struct ChatModelConfig {
    /// Falls back to `OPENAI_API_KEY`.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for ChatModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            timeout_secs: 60,
        }
    }
}

pub struct OpenAiChatModel {
    config: ChatModelConfig,
    client: reqwest::blocking::Client,
}

impl OpenAiChatModel {
    pub fn new(config: ChatModelConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("building HTTP client")?;
        Ok(Self { config, client })
    }

    fn api_key(&self) -> Result<String> {
        self.config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| anyhow!("API key not set. Set OPENAI_API_KEY or configure an api_key"))
    }
}

impl LanguageModel for OpenAiChatModel {
    fn model_id(&self) -> &str {
        &self.config.model
    }

    fn complete(&self, messages: &[ChatMessage], max_tokens: u32, temperature: f32) -> Result<String> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let request = ChatRequest { model: &self.config.model, messages, max_tokens, temperature };
        debug!(model = %self.config.model, messages = messages.len(), max_tokens, "requesting completion");

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key()?)
            .json(&request)
            .send()
            .context("chat completion request failed")?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_else(|_| "unable to read response body".to_string());
            bail!("chat completion API returned {}: {}", status, body);
        }
        let parsed: ChatResponse = response.json().context("failed to parse chat completion response")?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("chat completion response had no content"))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}
