//! Embedding provider adapters and their factory

mod gemini;
mod helpers;
mod null;
mod ollama;
mod openai;
mod voyageai;

use std::sync::Arc;
use std::time::Duration;

use codectx_domain::error::{Error, Result};
use codectx_domain::ports::EmbeddingProvider;
use codectx_domain::types::{EmbeddingConfig, EmbeddingProviderKind};

use crate::constants::EMBEDDING_TIMEOUT_SECS;

pub use gemini::GeminiEmbeddingProvider;
pub use null::NullEmbeddingProvider;
pub use ollama::OllamaEmbeddingProvider;
pub use openai::OpenAIEmbeddingProvider;
pub use voyageai::VoyageAIEmbeddingProvider;

/// Construct the embedding provider selected by `config`
pub fn create_embedding_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let timeout = Duration::from_secs(EMBEDDING_TIMEOUT_SECS);
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::internal(format!("Failed to create HTTP client: {e}")))?;

    let require_key = || {
        config.api_key.clone().ok_or_else(|| {
            Error::config(format!("Provider '{}' requires an API key", config.provider))
        })
    };

    let provider: Arc<dyn EmbeddingProvider> = match config.provider {
        EmbeddingProviderKind::OpenAI => Arc::new(OpenAIEmbeddingProvider::new(
            require_key()?,
            config.base_url.clone(),
            config
                .model
                .clone()
                .unwrap_or_else(|| "text-embedding-3-small".to_string()),
            timeout,
            http_client,
        )),
        EmbeddingProviderKind::VoyageAI => Arc::new(VoyageAIEmbeddingProvider::new(
            require_key()?,
            config.base_url.clone(),
            config
                .model
                .clone()
                .unwrap_or_else(|| "voyage-code-3".to_string()),
            timeout,
            http_client,
        )),
        EmbeddingProviderKind::Gemini => Arc::new(GeminiEmbeddingProvider::new(
            require_key()?,
            config.base_url.clone(),
            config
                .model
                .clone()
                .unwrap_or_else(|| "text-embedding-004".to_string()),
            timeout,
            http_client,
        )),
        EmbeddingProviderKind::Ollama => Arc::new(OllamaEmbeddingProvider::new(
            config.base_url.clone(),
            config
                .model
                .clone()
                .unwrap_or_else(|| "nomic-embed-text".to_string()),
            timeout,
            http_client,
        )),
        EmbeddingProviderKind::Null => Arc::new(NullEmbeddingProvider::default()),
    };

    Ok(provider)
}
