//! Domain layer constants
//!
//! Contains constants that are part of the indexing domain logic and are used
//! by the application layer. Infrastructure-specific constants (paths,
//! timeouts of concrete backends) live with their adapters.

// ============================================================================
// COLLECTION NAMING
// ============================================================================

/// Collection name prefix when hybrid (dense + sparse) mode is on
pub const COLLECTION_PREFIX_HYBRID: &str = "hybrid_code_chunks";

/// Collection name prefix for dense-only collections
pub const COLLECTION_PREFIX_DENSE: &str = "code_chunks";

/// Hex characters of the path digest appended to the prefix
pub const COLLECTION_DIGEST_LEN: usize = 8;

/// Extended digest length used when two roots collide on the short prefix
pub const COLLECTION_DIGEST_LEN_EXTENDED: usize = 16;

// ============================================================================
// CHUNKING
// ============================================================================

/// Maximum chunk size in bytes for the character-window splitter
pub const CHUNK_WINDOW_SIZE: usize = 2500;

/// Overlap in bytes between adjacent character-window chunks
pub const CHUNK_WINDOW_OVERLAP: usize = 300;

/// Prefix of every persisted chunk document id
pub const CHUNK_ID_PREFIX: &str = "chunk_";

/// Hex characters of the content digest kept in a chunk id
pub const CHUNK_ID_DIGEST_LEN: usize = 16;

// ============================================================================
// PIPELINE LIMITS
// ============================================================================

/// Hard ceiling of chunks persisted per codebase per run
pub const MAX_CHUNKS_PER_RUN: usize = 450_000;

/// Fixed progress share consumed by the scan/preparation phase
pub const SCAN_PROGRESS_BUDGET: u8 = 15;

/// Upper bound on concurrent file read+split tasks
pub const FILE_CONCURRENCY_CAP: usize = 20;

/// Upper bound on concurrent embedding batches in flight
pub const API_CONCURRENCY_CAP: usize = 10;

/// Insert queue depth as a multiple of the embedding concurrency
pub const INSERT_QUEUE_FACTOR: usize = 2;

/// Default memory budget for the pipeline, in megabytes
pub const MEMORY_LIMIT_MB_DEFAULT: u64 = 1536;

/// Above this share of the memory budget, batch thresholds halve
pub const MEMORY_PRESSURE_SOFT: f64 = 0.80;

/// Above this share of the memory budget, buffered chunks flush immediately
pub const MEMORY_PRESSURE_HARD: f64 = 0.90;

/// Above this share after a batch, a best-effort GC hint is requested
pub const MEMORY_PRESSURE_GC: f64 = 0.70;

/// Canonical message surfaced when the backend refuses another collection
/// and offers no message of its own
pub const COLLECTION_LIMIT_MESSAGE: &str =
    "Your account has reached its collection limit. Clear an existing index before creating a new one.";

// ============================================================================
// SEARCH
// ============================================================================

/// Default minimum score for a hit to be returned
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.3;

/// Reciprocal Rank Fusion constant for hybrid reranking
pub const RRF_K: u32 = 100;

/// Hard cap on the caller-supplied search limit
pub const MAX_SEARCH_LIMIT: usize = 50;

/// Default number of hits when the caller does not supply a limit
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

// ============================================================================
// RECONCILER
// ============================================================================

/// Seconds between background reconcile ticks
pub const RECONCILE_INTERVAL_SECS: u64 = 300;

/// Seconds before the first reconcile tick after startup
pub const RECONCILE_INITIAL_DELAY_SECS: u64 = 5;

// ============================================================================
// CROSS-PROCESS COORDINATION
// ============================================================================

/// Age after which an advisory lock with a dead or unknown owner is reclaimed
pub const LOCK_STALE_TIMEOUT_SECS: u64 = 30 * 60;

/// Age after which a semaphore slot with a dead or unknown owner is reclaimed
pub const SEMAPHORE_STALE_TIMEOUT_SECS: u64 = 2 * 60 * 60;

// ============================================================================
// EMBEDDING RETRY POLICY
// ============================================================================

/// Maximum retries for a transient embedding failure
pub const EMBED_MAX_RETRIES: u32 = 3;

/// Base backoff between embedding retries, in milliseconds (doubles per retry)
pub const EMBED_BACKOFF_BASE_MS: u64 = 500;

/// Characters of input kept per text, as a multiple of the token budget
pub const EMBED_CHARS_PER_TOKEN: usize = 4;
