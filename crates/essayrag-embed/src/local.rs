//! In-process BGE-M3 sentence encoder (XLM-RoBERTa weights via candle).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use essayrag_core::traits::Embedder;
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::tokenize_batch_on_device;

const DEFAULT_MAX_LEN: usize = 512;

pub struct BgeM3Embedder {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    max_len: usize,
    id: String,
}

impl BgeM3Embedder {
    /// Loads tokenizer, config and weights from `model_dir`, or from the first
    /// directory found by [`resolve_model_dir`].
    pub fn new(model_dir: Option<&Path>) -> Result<Self> {
        let device = select_device();
        let model_dir = match model_dir {
            Some(dir) => dir.to_path_buf(),
            None => resolve_model_dir()?,
        };
        info!(dir = %model_dir.display(), "🔄 Loading BGE-M3 model");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;

        let config_path = model_dir.join("config.json");
        let raw_config = std::fs::read_to_string(&config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        let config: XLMRobertaConfig = serde_json::from_str(&raw_config)?;
        let shape: serde_json::Value = serde_json::from_str(&raw_config)?;
        let dim = shape["hidden_size"].as_u64().map_or(1024, |d| d as usize);
        let max_len = shape["max_position_embeddings"]
            .as_u64()
            .map_or(DEFAULT_MAX_LEN, |p| (p as usize).saturating_sub(2).min(DEFAULT_MAX_LEN));

        let weights_path = model_dir.join("pytorch_model.bin");
        let weights = candle_core::pickle::read_all(&weights_path)
            .with_context(|| format!("reading {}", weights_path.display()))?;
        let weights_map: HashMap<String, Tensor> = weights.into_iter().collect();
        let vb = VarBuilder::from_tensors(weights_map, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;
        info!(dim, max_len, "✅ BGE-M3 model loaded");

        Ok(Self { model, tokenizer, device, dim, max_len, id: format!("local:bge-m3:d{dim}") })
    }
}

impl Embedder for BgeM3Embedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        self.max_len
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize_batch_on_device(&self.tokenizer, texts, self.max_len, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let vectors: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_vec2()?;
        if vectors.iter().any(|v| v.len() != self.dim) {
            return Err(anyhow!("model produced vectors of unexpected width (expected {})", self.dim));
        }
        let elapsed = start.elapsed();
        debug!(batch = texts.len(), ms = elapsed.as_millis() as u64, "embedded batch");
        if elapsed.as_millis() > 100 * texts.len() as u128 {
            warn!(batch = texts.len(), ms = elapsed.as_millis() as u64, "⚠️  Slow embedding");
        }
        Ok(vectors)
    }
}

/// Looks for the model under `APP_MODEL_DIR`, `MODEL_DIR`, `../models/bge-m3`
/// then `models/bge-m3`.
pub fn resolve_model_dir() -> Result<PathBuf> {
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let p = PathBuf::from(&dir);
            if p.exists() {
                debug!(var, dir = %p.display(), "📦 Using model dir from env");
                return Ok(p);
            }
        }
    }
    for candidate in ["../models/bge-m3", "models/bge-m3"] {
        let p = Path::new(candidate);
        if p.exists() {
            debug!(dir = %p.display(), "📦 Using model dir");
            return Ok(p.to_path_buf());
        }
    }
    Err(anyhow!("Could not locate BGE-M3 model directory (set APP_MODEL_DIR or embedding.model_dir)"))
}
