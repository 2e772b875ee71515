//! Ollama local embedding provider
//!
//! Talks to a local Ollama daemon; no credentials involved, so every HTTP
//! failure is transport-class.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use codectx_domain::error::{Error, Result};
use codectx_domain::ports::EmbeddingProvider;
use codectx_domain::types::Embedding;

use crate::constants::{CONCURRENCY_OLLAMA, EMBEDDING_DIMENSION_OLLAMA, MAX_BATCH_OLLAMA};
use crate::embedding::helpers;

/// Ollama embedding provider
pub struct OllamaEmbeddingProvider {
    base_url: String,
    model: String,
    timeout: Duration,
    http_client: Client,
}

impl OllamaEmbeddingProvider {
    /// Create a new Ollama embedding provider
    pub fn new(
        base_url: Option<String>,
        model: String,
        timeout: Duration,
        http_client: Client,
    ) -> Self {
        Self {
            base_url: base_url.unwrap_or_else(|| "http://localhost:11434".to_string()),
            model,
            timeout,
            http_client,
        }
    }

    async fn fetch_embeddings(&self, texts: Vec<String>) -> Result<Vec<Embedding>> {
        let payload = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .http_client
            .post(format!("{}/api/embed", self.base_url))
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| helpers::transport_error("Ollama", e))?;

        let body = helpers::check_and_parse("Ollama", response).await?;
        let embeddings = body["embeddings"].as_array().ok_or_else(|| {
            Error::embedding_invalid_response("Ollama response is missing the embeddings array")
        })?;

        embeddings
            .iter()
            .map(|item| {
                let vector = helpers::parse_vector("Ollama", item)?;
                let dimensions = vector.len();
                Ok(Embedding {
                    vector,
                    model: self.model.clone(),
                    dimensions,
                })
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let prepared = helpers::prepare_inputs(texts, self.max_tokens());
        helpers::embed_in_slices("Ollama", &prepared, self.max_batch_size(), |batch| {
            self.fetch_embeddings(batch)
        })
        .await
    }

    fn dimensions(&self) -> usize {
        EMBEDDING_DIMENSION_OLLAMA
    }

    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn max_batch_size(&self) -> usize {
        MAX_BATCH_OLLAMA
    }

    fn max_tokens(&self) -> usize {
        8192
    }

    fn preferred_concurrency(&self) -> usize {
        CONCURRENCY_OLLAMA
    }
}
