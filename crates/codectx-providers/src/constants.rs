//! Provider-specific constants

// ============================================================================
// EMBEDDING DIMENSIONS
// ============================================================================

/// text-embedding-3-small
pub const EMBEDDING_DIMENSION_OPENAI_SMALL: usize = 1536;

/// text-embedding-3-large
pub const EMBEDDING_DIMENSION_OPENAI_LARGE: usize = 3072;

/// text-embedding-ada-002
pub const EMBEDDING_DIMENSION_OPENAI_ADA: usize = 1536;

/// voyage-code-3 / voyage-3
pub const EMBEDDING_DIMENSION_VOYAGE: usize = 1024;

/// Gemini text-embedding-004
pub const EMBEDDING_DIMENSION_GEMINI: usize = 768;

/// nomic-embed-text and most Ollama embedding models
pub const EMBEDDING_DIMENSION_OLLAMA: usize = 768;

// ============================================================================
// PER-PROVIDER BATCH AND CONCURRENCY CONTRACTS
// ============================================================================

/// OpenAI accepts up to 2048 inputs per embeddings call
pub const MAX_BATCH_OPENAI: usize = 2048;

/// VoyageAI accepts up to 128 inputs per call
pub const MAX_BATCH_VOYAGE: usize = 128;

/// Gemini batchEmbedContents accepts up to 100 requests per call
pub const MAX_BATCH_GEMINI: usize = 100;

/// Ollama is local; bounded to keep single requests reasonable
pub const MAX_BATCH_OLLAMA: usize = 256;

/// Embedding batches tolerated in flight, per provider
pub const CONCURRENCY_OPENAI: usize = 5;
pub const CONCURRENCY_VOYAGE: usize = 3;
pub const CONCURRENCY_GEMINI: usize = 2;
pub const CONCURRENCY_OLLAMA: usize = 10;

// ============================================================================
// HTTP
// ============================================================================

/// Request timeout for embedding calls, seconds
pub const EMBEDDING_TIMEOUT_SECS: u64 = 60;

/// Request timeout for vector store calls, seconds
pub const STORE_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// MILVUS ADAPTER
// ============================================================================

/// Documents per insert RPC; keeps a single call under the gRPC/REST body cap
pub const MILVUS_INSERT_BATCH: usize = 500;

/// VarChar capacity of the content field
pub const MILVUS_CONTENT_MAX_LENGTH: usize = 65_535;

/// VarChar capacity of path-like fields
pub const MILVUS_PATH_MAX_LENGTH: usize = 1024;

// ============================================================================
// BM25 SPARSE ENCODING
// ============================================================================

/// Term frequency saturation
pub const BM25_K1: f32 = 1.2;

/// Document length normalization
pub const BM25_B: f32 = 0.75;

/// Tokens at or below this length are dropped
pub const BM25_TOKEN_MIN_LENGTH: usize = 2;

/// Sparse dimensionality; terms hash into this space deterministically
pub const BM25_SPARSE_DIM: u32 = 1 << 20;

/// Assumed average document length for per-document scoring
pub const BM25_AVG_DOC_LEN: f32 = 120.0;
