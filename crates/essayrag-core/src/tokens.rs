//! Token counting and windowing with tiktoken's `cl100k_base` encoding
//! (the GPT-4 tokenizer).

use anyhow::Result;
use tiktoken_rs::CoreBPE;

pub struct TokenCounter {
    bpe: CoreBPE,
}

impl TokenCounter {
    pub fn cl100k() -> Result<Self> {
        Ok(Self { bpe: tiktoken_rs::cl100k_base()? })
    }

    pub fn encode(&self, text: &str) -> Vec<u32> {
        self.bpe.encode_ordinary(text)
    }

    /// Decodes a token window back to text. A window that cuts a multi-byte
    /// character is decoded token by token with U+FFFD for the broken pieces.
    pub fn decode(&self, tokens: &[u32]) -> String {
        match self.bpe.decode(tokens.to_vec()) {
            Ok(text) => text,
            Err(_) => tokens
                .iter()
                .map(|t| self.bpe.decode(vec![*t]).unwrap_or_else(|_| char::REPLACEMENT_CHARACTER.to_string()))
                .collect(),
        }
    }

    pub fn count(&self, text: &str) -> usize {
        self.encode(text).len()
    }
}
