use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use essayrag_core::traits::Embedder;

/// Memoizes vectors by content hash for the lifetime of the wrapper.
///
/// Keys combine the inner `embedder_id` with the blake3 hash of the text, so
/// one cache never mixes vector spaces. Failed batches are not cached.
pub struct CachedEmbedder<E> {
    inner: E,
    cache: Mutex<HashMap<blake3::Hash, Vec<f32>>>,
}

impl<E: Embedder> CachedEmbedder<E> {
    pub fn new(inner: E) -> Self {
        Self { inner, cache: Mutex::new(HashMap::new()) }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    pub fn cached_len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    fn key(&self, text: &str) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.inner.embedder_id().as_bytes());
        hasher.update(&[0]);
        hasher.update(text.as_bytes());
        hasher.finalize()
    }
}

impl<E: Embedder> Embedder for CachedEmbedder<E> {
    fn embedder_id(&self) -> &str {
        self.inner.embedder_id()
    }

    fn dim(&self) -> usize {
        self.inner.dim()
    }

    fn max_len(&self) -> usize {
        self.inner.max_len()
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let keys: Vec<blake3::Hash> = texts.iter().map(|t| self.key(t)).collect();
        let mut out: Vec<Option<Vec<f32>>> = {
            let cache = self.cache.lock().map_err(|_| anyhow::anyhow!("embedding cache poisoned"))?;
            keys.iter().map(|k| cache.get(k).cloned()).collect()
        };

        let missing: Vec<usize> = (0..texts.len()).filter(|&i| out[i].is_none()).collect();
        if !missing.is_empty() {
            let pending: Vec<String> = missing.iter().map(|&i| texts[i].clone()).collect();
            let fresh = self.inner.embed_batch(&pending)?;
            if fresh.len() != pending.len() {
                anyhow::bail!("embedder returned {} vectors for {} inputs", fresh.len(), pending.len());
            }
            let mut cache = self.cache.lock().map_err(|_| anyhow::anyhow!("embedding cache poisoned"))?;
            for (&i, vector) in missing.iter().zip(fresh) {
                cache.insert(keys[i], vector.clone());
                out[i] = Some(vector);
            }
        }
        Ok(out.into_iter().flatten().collect())
    }
}
