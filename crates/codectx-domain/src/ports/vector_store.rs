//! Vector store port

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChunkDocument, SearchHit};

/// One row returned by a scalar-filter query: field name to JSON value
pub type QueryRow = HashMap<String, serde_json::Value>;

/// A document paired with its similarity score
pub type ScoredDoc = SearchHit;

/// Options for a dense search
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Number of nearest neighbours to return
    pub top_k: usize,
    /// Hits scoring below this are dropped
    pub threshold: Option<f32>,
    /// Optional scalar filter expression
    pub filter_expr: Option<String>,
}

/// A hybrid (dense + sparse) search request, fused with RRF by the adapter
#[derive(Debug, Clone)]
pub struct HybridQuery {
    /// Dense query vector
    pub vector: Vec<f32>,
    /// Query text for the sparse (lexical) leg
    pub text: String,
    /// Per-leg candidate depth
    pub top_k: usize,
    /// RRF constant
    pub rrf_k: u32,
    /// Fused output length
    pub limit: usize,
    /// Optional scalar filter expression applied to both legs
    pub filter_expr: Option<String>,
}

/// Contract for the vector database adapter.
///
/// Implementations MUST be safe for concurrent use on different documents and
/// MUST surface the backend's collection ceiling as
/// [`crate::error::Error::CollectionLimitReached`] rather than a generic
/// failure. For hybrid collections the sparse representation is computed by
/// the adapter from `content` with a deterministic tokenizer.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Whether a collection with this name exists
    async fn has_collection(&self, name: &str) -> Result<bool>;

    /// Create a dense-only collection; existing name is an error
    async fn create_collection(&self, name: &str, dimension: usize, description: &str)
        -> Result<()>;

    /// Create a collection carrying both a dense and a sparse vector field
    async fn create_hybrid_collection(
        &self,
        name: &str,
        dimension: usize,
        description: &str,
    ) -> Result<()>;

    /// Drop a collection and all its documents
    async fn drop_collection(&self, name: &str) -> Result<()>;

    /// Names of all collections
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// Returns false, without side effects, when the backend has reached its
    /// account-level collection ceiling
    async fn check_collection_limit(&self) -> Result<bool>;

    /// Insert documents into a dense collection
    async fn insert(&self, name: &str, docs: &[ChunkDocument]) -> Result<()>;

    /// Insert documents into a hybrid collection (adapter computes sparse)
    async fn insert_hybrid(&self, name: &str, docs: &[ChunkDocument]) -> Result<()>;

    /// Insert documents into a hybrid collection, splitting the payload so a
    /// single RPC stays under the backend's per-call size limit
    async fn insert_hybrid_batched(&self, name: &str, docs: &[ChunkDocument]) -> Result<()>;

    /// Scalar-filter query returning the requested output fields
    async fn query(
        &self,
        name: &str,
        filter_expr: &str,
        output_fields: &[&str],
        limit: usize,
    ) -> Result<Vec<QueryRow>>;

    /// Dense nearest-neighbour search
    async fn search(
        &self,
        name: &str,
        vector: &[f32],
        options: &SearchOptions,
    ) -> Result<Vec<ScoredDoc>>;

    /// Hybrid dense + sparse search fused with Reciprocal Rank Fusion
    async fn hybrid_search(&self, name: &str, query: &HybridQuery) -> Result<Vec<ScoredDoc>>;

    /// Delete documents by id
    async fn delete(&self, name: &str, ids: &[String]) -> Result<()>;
}
