//! VoyageAI embedding provider
//!
//! Voyage models are tuned for code retrieval; inputs are submitted with
//! `input_type: document` so queries embed symmetrically elsewhere.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use codectx_domain::error::{Error, Result};
use codectx_domain::ports::EmbeddingProvider;
use codectx_domain::types::Embedding;

use crate::constants::{CONCURRENCY_VOYAGE, EMBEDDING_DIMENSION_VOYAGE, MAX_BATCH_VOYAGE};
use crate::embedding::helpers;

/// VoyageAI embedding provider
pub struct VoyageAIEmbeddingProvider {
    api_key: String,
    base_url: Option<String>,
    model: String,
    timeout: Duration,
    http_client: Client,
}

impl VoyageAIEmbeddingProvider {
    /// Create a new VoyageAI embedding provider
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        model: String,
        timeout: Duration,
        http_client: Client,
    ) -> Self {
        Self {
            api_key,
            base_url,
            model,
            timeout,
            http_client,
        }
    }

    /// Get the base URL for this provider
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or("https://api.voyageai.com/v1")
    }

    async fn fetch_embeddings(&self, texts: Vec<String>) -> Result<Vec<Embedding>> {
        let payload = serde_json::json!({
            "input": texts,
            "model": self.model,
            "input_type": "document"
        });

        let response = self
            .http_client
            .post(format!("{}/embeddings", self.base_url()))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| helpers::transport_error("VoyageAI", e))?;

        let body = helpers::check_and_parse("VoyageAI", response).await?;
        let data = body["data"].as_array().ok_or_else(|| {
            Error::embedding_invalid_response("VoyageAI response is missing the data array")
        })?;

        data.iter()
            .map(|item| {
                let vector = helpers::parse_vector("VoyageAI", &item["embedding"])?;
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
impl EmbeddingProvider for VoyageAIEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let prepared = helpers::prepare_inputs(texts, self.max_tokens());
        helpers::embed_in_slices("VoyageAI", &prepared, self.max_batch_size(), |batch| {
            self.fetch_embeddings(batch)
        })
        .await
    }

    fn dimensions(&self) -> usize {
        match self.model.as_str() {
            "voyage-code-2" => 1536,
            _ => EMBEDDING_DIMENSION_VOYAGE,
        }
    }

    fn provider_name(&self) -> &str {
        "voyageai"
    }

    fn max_batch_size(&self) -> usize {
        MAX_BATCH_VOYAGE
    }

    fn max_tokens(&self) -> usize {
        16_000
    }

    fn preferred_concurrency(&self) -> usize {
        CONCURRENCY_VOYAGE
    }
}
