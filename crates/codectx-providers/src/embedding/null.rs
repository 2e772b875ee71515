//! Deterministic null embedding provider for tests
//!
//! Vectors are derived from a content hash, so identical text always embeds
//! identically without any network dependency.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use codectx_domain::error::Result;
use codectx_domain::ports::EmbeddingProvider;
use codectx_domain::types::Embedding;

/// Hash-derived embeddings with a configurable dimensionality
pub struct NullEmbeddingProvider {
    dimensions: usize,
}

impl NullEmbeddingProvider {
    /// Provider emitting vectors of `dimensions` values
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn embed_one(&self, text: &str) -> Embedding {
        let mut vector = Vec::with_capacity(self.dimensions);
        let mut counter: u32 = 0;
        while vector.len() < self.dimensions {
            let mut hasher = Sha256::new();
            hasher.update(text.as_bytes());
            hasher.update(counter.to_le_bytes());
            for byte in hasher.finalize() {
                if vector.len() == self.dimensions {
                    break;
                }
                vector.push(f32::from(byte) / 255.0 - 0.5);
            }
            counter += 1;
        }
        Embedding {
            vector,
            model: "null".to_string(),
            dimensions: self.dimensions,
        }
    }
}

impl Default for NullEmbeddingProvider {
    fn default() -> Self {
        Self::new(4)
    }
}

#[async_trait]
impl EmbeddingProvider for NullEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn provider_name(&self) -> &str {
        "null"
    }

    fn max_batch_size(&self) -> usize {
        64
    }

    fn max_tokens(&self) -> usize {
        8192
    }

    fn preferred_concurrency(&self) -> usize {
        4
    }
}
