//! Embedding provider port

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::types::Embedding;

/// Contract for services that turn text into dense embeddings.
///
/// Implementations MUST preserve input order in `embed_batch`, including when
/// they split an oversized input into provider-sized sub-batches, and MUST
/// surface authentication failures distinctly from transport failures (see
/// [`crate::error::EmbeddingErrorKind`]).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Get embedding for a single text (default implementation provided)
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::embedding_invalid_response("No embedding returned"))
    }

    /// Get embeddings for multiple texts, in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Dimensionality of embeddings produced by this provider
    fn dimensions(&self) -> usize;

    /// Probe the provider with a short text and return the observed dimension
    async fn detect_dimension(&self) -> Result<usize> {
        let probe = self.embed("dimension probe").await?;
        Ok(probe.vector.len())
    }

    /// Name/identifier of this provider implementation
    fn provider_name(&self) -> &str;

    /// Largest batch the provider accepts in a single call
    fn max_batch_size(&self) -> usize;

    /// Token budget per input text
    fn max_tokens(&self) -> usize;

    /// Embedding batches this provider tolerates in flight concurrently
    fn preferred_concurrency(&self) -> usize;
}
