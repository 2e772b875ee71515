//! Batch configuration for a pipeline run
//!
//! Derived once per run from provider capability, host resources and
//! environment overrides; every override is clamped to its cap.

use codectx_domain::constants::{
    API_CONCURRENCY_CAP, FILE_CONCURRENCY_CAP, INSERT_QUEUE_FACTOR,
};
use codectx_domain::ports::EmbeddingProvider;
use codectx_infrastructure::config::PipelineSettings;
use codectx_infrastructure::memory;

/// Default chunks per embedding batch when nothing narrower applies
const DEFAULT_EMBEDDING_BATCH: usize = 100;

/// Effective concurrency and batching knobs for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    /// Chunks per embedding batch
    pub embedding_batch_size: usize,
    /// Concurrent file read+split tasks
    pub file_concurrency: usize,
    /// Embedding batches in flight
    pub api_concurrency: usize,
    /// Insert queue depth (producers block beyond this)
    pub insert_queue_depth: usize,
    /// Memory budget in megabytes
    pub memory_limit_mb: u64,
}

impl BatchPlan {
    /// Compute the plan for `provider` under `settings`
    pub fn compute(provider: &dyn EmbeddingProvider, settings: &PipelineSettings) -> Self {
        let cpus = num_cpus::get().max(1);

        let file_concurrency = settings
            .file_concurrency
            .unwrap_or_else(|| (cpus * 2).min(FILE_CONCURRENCY_CAP))
            .clamp(1, FILE_CONCURRENCY_CAP);

        let api_concurrency = settings
            .api_concurrency
            .unwrap_or_else(|| provider.preferred_concurrency())
            .clamp(1, API_CONCURRENCY_CAP);

        let embedding_batch_size = settings
            .embedding_batch_size
            .unwrap_or(DEFAULT_EMBEDDING_BATCH)
            .min(provider.max_batch_size())
            .max(1);

        // Env override or default, raised on hosts with room to spare
        let memory_limit_mb = settings
            .memory_limit_mb
            .max(memory::system_memory_mb() / 4);

        Self {
            embedding_batch_size,
            file_concurrency,
            api_concurrency,
            insert_queue_depth: INSERT_QUEUE_FACTOR * api_concurrency,
            memory_limit_mb,
        }
    }
}
