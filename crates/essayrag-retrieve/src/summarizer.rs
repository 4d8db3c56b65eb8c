use tracing::{debug, warn};

use essayrag_core::traits::LanguageModel;
use essayrag_core::types::ChatMessage;

pub const TRUNCATION_MARKER: &str = "... [truncated due to summarization error]";

/// First `max_tokens * 4` characters of `text`, followed by the marker.
pub fn truncate_fallback(text: &str, max_tokens: u32) -> String {
    let limit = max_tokens as usize * 4;
    let mut out: String = text.chars().take(limit).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

pub fn system_prompt(persona: &str) -> String {
    format!(
        "You are a helpful assistant that summarizes {persona}'s essays into key points and quotes. \
         Focus on the main things {persona} is trying to say / give advice on. \
         Prioritize direct advice / what {persona} would've said if they had to summarize their own text."
    )
}

/// Compresses the combined chunk text through a language model. Never fails:
/// without a model, or when the model errors, it degrades to truncation.
pub struct Summarizer {
    model: Option<Box<dyn LanguageModel>>,
    persona: String,
    max_tokens: u32,
    temperature: f32,
}

impl Summarizer {
    pub fn new(model: Option<Box<dyn LanguageModel>>, persona: impl Into<String>) -> Self {
        Self { model, persona: persona.into(), max_tokens: 400, temperature: 0.3 }
    }

    pub fn with_limits(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn is_offline(&self) -> bool {
        self.model.is_none()
    }

    pub fn summarize(&self, text: &str, directive: &str) -> String {
        let Some(model) = &self.model else {
            debug!("no language model configured; truncating context");
            return truncate_fallback(text, self.max_tokens);
        };
        let messages = [
            ChatMessage::system(system_prompt(&self.persona)),
            ChatMessage::user(format!("{directive}\n\n{text}")),
        ];
        match model.complete(&messages, self.max_tokens, self.temperature) {
            Ok(summary) if !summary.trim().is_empty() => summary.trim().to_string(),
            Ok(_) => {
                warn!(model = model.model_id(), "summarizer returned an empty completion; truncating context");
                truncate_fallback(text, self.max_tokens)
            }
            Err(e) => {
                warn!(model = model.model_id(), error = %format!("{e:#}"), "summarization failed; truncating context");
                truncate_fallback(text, self.max_tokens)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_counts_characters_not_bytes() {
        let text = "é".repeat(10);
        let out = truncate_fallback(&text, 1);
        assert_eq!(out, format!("éééé{TRUNCATION_MARKER}"));
    }

    #[test]
    fn short_text_is_kept_whole() {
        assert_eq!(truncate_fallback("abc", 400), format!("abc{TRUNCATION_MARKER}"));
    }
}
