//! OpenAI embedding provider
//!
//! Implements the EmbeddingProvider port using OpenAI's embedding API.
//! Supports text-embedding-3-small, text-embedding-3-large, and ada-002.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use codectx_domain::error::{Error, Result};
use codectx_domain::ports::EmbeddingProvider;
use codectx_domain::types::Embedding;

use crate::constants::{
    CONCURRENCY_OPENAI, EMBEDDING_DIMENSION_OPENAI_ADA, EMBEDDING_DIMENSION_OPENAI_LARGE,
    EMBEDDING_DIMENSION_OPENAI_SMALL, MAX_BATCH_OPENAI,
};
use crate::embedding::helpers;

/// OpenAI embedding provider
pub struct OpenAIEmbeddingProvider {
    api_key: String,
    base_url: Option<String>,
    model: String,
    timeout: Duration,
    http_client: Client,
}

impl OpenAIEmbeddingProvider {
    /// Create a new OpenAI embedding provider
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
            .unwrap_or("https://api.openai.com/v1")
    }

    /// Get the model name
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn fetch_embeddings(&self, texts: Vec<String>) -> Result<Vec<Embedding>> {
        let payload = serde_json::json!({
            "input": texts,
            "model": self.model,
            "encoding_format": "float"
        });

        let response = self
            .http_client
            .post(format!("{}/embeddings", self.base_url()))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| helpers::transport_error("OpenAI", e))?;

        let body = helpers::check_and_parse("OpenAI", response).await?;
        let data = body["data"].as_array().ok_or_else(|| {
            Error::embedding_invalid_response("OpenAI response is missing the data array")
        })?;

        data.iter()
            .map(|item| {
                let vector = helpers::parse_vector("OpenAI", &item["embedding"])?;
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
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let prepared = helpers::prepare_inputs(texts, self.max_tokens());
        helpers::embed_in_slices("OpenAI", &prepared, self.max_batch_size(), |batch| {
            self.fetch_embeddings(batch)
        })
        .await
    }

    fn dimensions(&self) -> usize {
        match self.model.as_str() {
            "text-embedding-3-small" => EMBEDDING_DIMENSION_OPENAI_SMALL,
            "text-embedding-3-large" => EMBEDDING_DIMENSION_OPENAI_LARGE,
            "text-embedding-ada-002" => EMBEDDING_DIMENSION_OPENAI_ADA,
            _ => EMBEDDING_DIMENSION_OPENAI_SMALL,
        }
    }

    fn provider_name(&self) -> &str {
        "openai"
    }

    fn max_batch_size(&self) -> usize {
        MAX_BATCH_OPENAI
    }

    fn max_tokens(&self) -> usize {
        8192
    }

    fn preferred_concurrency(&self) -> usize {
        CONCURRENCY_OPENAI
    }
}
