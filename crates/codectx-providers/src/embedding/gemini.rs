//! Gemini (Google AI) embedding provider

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use codectx_domain::error::{Error, Result};
use codectx_domain::ports::EmbeddingProvider;
use codectx_domain::types::Embedding;

use crate::constants::{CONCURRENCY_GEMINI, EMBEDDING_DIMENSION_GEMINI, MAX_BATCH_GEMINI};
use crate::embedding::helpers;

/// Gemini embedding provider
pub struct GeminiEmbeddingProvider {
    api_key: String,
    base_url: Option<String>,
    model: String,
    timeout: Duration,
    http_client: Client,
}

impl GeminiEmbeddingProvider {
    /// Create a new Gemini embedding provider
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

    /// Get the effective base URL
    fn effective_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or("https://generativelanguage.googleapis.com")
    }

    /// Get the model name for API calls (remove prefix if present)
    pub fn api_model_name(&self) -> &str {
        self.model.strip_prefix("models/").unwrap_or(&self.model)
    }

    async fn fetch_embeddings(&self, texts: Vec<String>) -> Result<Vec<Embedding>> {
        let model = format!("models/{}", self.api_model_name());
        let requests: Vec<serde_json::Value> = texts
            .iter()
            .map(|text| {
                serde_json::json!({
                    "model": model,
                    "content": { "parts": [ { "text": text } ] }
                })
            })
            .collect();

        let url = format!(
            "{}/v1beta/models/{}:batchEmbedContents?key={}",
            self.effective_base_url(),
            self.api_model_name(),
            self.api_key
        );

        let response = self
            .http_client
            .post(&url)
            .timeout(self.timeout)
            .json(&serde_json::json!({ "requests": requests }))
            .send()
            .await
            .map_err(|e| helpers::transport_error("Gemini", e))?;

        let body = helpers::check_and_parse("Gemini", response).await?;
        let embeddings = body["embeddings"].as_array().ok_or_else(|| {
            Error::embedding_invalid_response("Gemini response is missing the embeddings array")
        })?;

        embeddings
            .iter()
            .map(|item| {
                let vector = helpers::parse_vector("Gemini", &item["values"])?;
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
impl EmbeddingProvider for GeminiEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let prepared = helpers::prepare_inputs(texts, self.max_tokens());
        helpers::embed_in_slices("Gemini", &prepared, self.max_batch_size(), |batch| {
            self.fetch_embeddings(batch)
        })
        .await
    }

    fn dimensions(&self) -> usize {
        EMBEDDING_DIMENSION_GEMINI
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }

    fn max_batch_size(&self) -> usize {
        MAX_BATCH_GEMINI
    }

    fn max_tokens(&self) -> usize {
        2048
    }

    fn preferred_concurrency(&self) -> usize {
        CONCURRENCY_GEMINI
    }
}
