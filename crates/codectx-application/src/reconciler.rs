//! Background reconciler
//!
//! Fixed-cadence loop that applies snapshot diffs through the pipeline to
//! keep every indexed codebase current. At most one pass is active
//! system-wide; a tick arriving while one runs is silently skipped, and ticks
//! are skipped entirely while the registry is empty.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use codectx_domain::constants::{RECONCILE_INITIAL_DELAY_SECS, RECONCILE_INTERVAL_SECS};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::context::CodeContext;

/// Periodic change-driven re-indexing driver
pub struct Reconciler {
    context: Arc<CodeContext>,
    interval: Duration,
    initial_delay: Duration,
    running: Arc<AtomicBool>,
}

impl Reconciler {
    /// Reconciler with the default cadence
    pub fn new(context: Arc<CodeContext>) -> Self {
        Self {
            context,
            interval: Duration::from_secs(RECONCILE_INTERVAL_SECS),
            initial_delay: Duration::from_secs(RECONCILE_INITIAL_DELAY_SECS),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Override the cadence (tests run at millisecond scale)
    pub fn with_cadence(mut self, initial_delay: Duration, interval: Duration) -> Self {
        self.initial_delay = initial_delay;
        self.interval = interval;
        self
    }

    /// Spawn the loop; it stops when `cancel` fires
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(self.initial_delay) => {}
            }
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                self.run_once().await;
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => {}
                }
            }
        })
    }

    /// One guarded pass; skipped while another pass runs or nothing is
    /// registered
    pub async fn run_once(&self) {
        if self.context.registry().is_empty().await {
            tracing::debug!("Reconciler idle: no codebases registered");
            return;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::debug!("Reconcile tick skipped: previous pass still running");
            return;
        }
        self.context.reconcile_all().await;
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codectx_domain::constants::MEMORY_LIMIT_MB_DEFAULT;
    use codectx_domain::types::{
        EmbeddingConfig, EmbeddingProviderKind, VectorStoreConfig, VectorStoreKind,
    };
    use codectx_domain::ports::VectorStore;
    use codectx_infrastructure::config::{Config, PipelineSettings};
    use crate::context::SplitterSet;
    use codectx_providers::embedding::NullEmbeddingProvider;
    use codectx_providers::splitter::{CodeSplitter, WindowSplitter};
    use codectx_providers::vector_store::InMemoryVectorStore;
    use tempfile::TempDir;

    async fn context(data: &TempDir) -> (Arc<CodeContext>, Arc<InMemoryVectorStore>) {
        let config = Config {
            hybrid_mode: true,
            embedding: EmbeddingConfig {
                provider: EmbeddingProviderKind::Null,
                model: None,
                api_key: None,
                base_url: None,
            },
            store: VectorStoreConfig {
                kind: VectorStoreKind::InMemory,
                address: String::new(),
                token: None,
                collection_limit: None,
            },
            pipeline: PipelineSettings {
                embedding_batch_size: Some(4),
                api_concurrency: Some(2),
                file_concurrency: Some(4),
                memory_limit_mb: MEMORY_LIMIT_MB_DEFAULT,
            },
            custom_extensions: Vec::new(),
            custom_ignore_patterns: Vec::new(),
            data_dir: data.path().to_path_buf(),
        };
        let store = Arc::new(InMemoryVectorStore::new(None));
        let context = CodeContext::new(
            config,
            Arc::new(NullEmbeddingProvider::new(4)),
            store.clone(),
            SplitterSet::new(
                Arc::new(CodeSplitter::new()),
                Arc::new(WindowSplitter::new()),
            ),
        )
        .await
        .unwrap();
        (context, store)
    }

    #[tokio::test]
    async fn loop_picks_up_changes_and_stops_on_cancel() {
        let data = TempDir::new().unwrap();
        let tree = TempDir::new().unwrap();
        std::fs::write(tree.path().join("a.py"), "def f():\n    return 1\n").unwrap();

        let (context, store) = context(&data).await;
        context
            .index_codebase(tree.path(), false, &[], &[], None, None)
            .await
            .unwrap();

        std::fs::write(tree.path().join("b.py"), "def g():\n    return 2\n").unwrap();

        let cancel = CancellationToken::new();
        let handle = Reconciler::new(Arc::clone(&context))
            .with_cadence(Duration::from_millis(10), Duration::from_millis(50))
            .spawn(cancel.clone());

        // wait for the loop to reconcile the new file
        let collection = {
            let canonical = tree.path().canonicalize().unwrap();
            context
                .registry()
                .info(&canonical.to_string_lossy())
                .await
                .unwrap()
                .collection_name
        };
        let mut found = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let rows = store
                .query(&collection, "relative_path == \"b.py\"", &["id"], 10)
                .await
                .unwrap();
            if !rows.is_empty() {
                found = true;
                break;
            }
        }
        assert!(found, "reconciler never indexed the new file");

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn empty_registry_skips_the_pass() {
        let data = TempDir::new().unwrap();
        let (context, _) = context(&data).await;
        let reconciler = Reconciler::new(context);
        // must return immediately without touching anything
        reconciler.run_once().await;
        assert!(!reconciler.running.load(Ordering::SeqCst));
    }
}
