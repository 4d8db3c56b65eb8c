//! essayrag-embed
//!
//! Embedding backends behind `essayrag_core::traits::Embedder`: the in-process
//! BGE-M3 encoder, a hosted OpenAI-compatible client, a hashed fake for tests,
//! and a memoizing wrapper.

pub mod api;
pub mod cache;
pub mod device;
pub mod fake;
pub mod local;
pub mod pool;
pub mod tokenize;

use anyhow::Result;
use essayrag_core::config::{EmbeddingBackend, EmbeddingSettings};
use essayrag_core::traits::Embedder;
use tracing::info;

pub use api::{ApiEmbedder, ApiEmbedderConfig};
pub use cache::CachedEmbedder;
pub use fake::FakeEmbedder;
pub use local::BgeM3Embedder;
pub use pool::masked_mean_l2;

pub const FAKE_DIM: usize = 1024;

/// `APP_USE_FAKE_EMBEDDINGS=1` (or `true`) forces the fake backend.
pub fn fake_forced() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Builds the configured backend, wrapped in a [`CachedEmbedder`] when
/// `settings.cache` is set.
pub fn build_embedder(settings: &EmbeddingSettings) -> Result<Box<dyn Embedder>> {
    let backend = if fake_forced() { EmbeddingBackend::Fake } else { settings.backend };
    let embedder: Box<dyn Embedder> = match backend {
        EmbeddingBackend::Fake => {
            info!("🧪 Using FakeEmbedder");
            Box::new(FakeEmbedder::new(FAKE_DIM))
        }
        EmbeddingBackend::Local => {
            let dir = settings.model_dir.as_deref().map(essayrag_core::config::expand_path);
            Box::new(BgeM3Embedder::new(dir.as_deref())?)
        }
        EmbeddingBackend::Api => Box::new(ApiEmbedder::new(ApiEmbedderConfig {
            base_url: settings.api_base_url.clone(),
            model: settings.api_model.clone(),
            dimension: settings.api_dimension,
            max_batch_size: settings.batch_size,
            ..Default::default()
        })?),
    };
    info!(embedder = embedder.embedder_id(), dim = embedder.dim(), "embedder ready");
    if settings.cache {
        Ok(Box::new(CachedEmbedder::new(embedder)))
    } else {
        Ok(embedder)
    }
}
