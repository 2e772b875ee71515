//! The context façade
//!
//! One per-process service wiring registry, locks, walker, splitter,
//! embedding provider and vector store into the four public operations:
//! index, search, clear and status. The server surface is a thin shell over
//! this type.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use codectx_domain::constants::COLLECTION_LIMIT_MESSAGE;
use codectx_domain::error::{Error, Result};
use codectx_domain::types::{
    CodebaseRecord, IndexOutcome, IndexRunStatus, IndexStats, ProgressEvent, SearchHit,
};
use codectx_infrastructure::config::Config;
use codectx_infrastructure::fsutil;
use codectx_infrastructure::ignore_rules::IgnoreRules;
use codectx_infrastructure::locks::{LockOptions, LockService};
use codectx_infrastructure::memory::MemoryProbe;
use codectx_infrastructure::registry::CodebaseRegistry;
use codectx_infrastructure::snapshot::Synchronizer;
use codectx_infrastructure::walker::FileWalker;
use codectx_domain::ports::{EmbeddingProvider, Splitter, VectorStore};
use serde_json::json;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::batching::BatchPlan;
use crate::pipeline::{IndexingPipeline, ProgressCallback};
use crate::search::QueryRouter;

/// Answer to a status request
#[derive(Debug, Clone)]
pub enum StatusReport {
    /// Aggregate report over every registered codebase
    All(Vec<CodebaseRecord>),
    /// The record of the queried path itself
    One(CodebaseRecord),
    /// The path is covered by an indexed ancestor
    CoveredBy {
        /// The queried path
        path: String,
        /// The covering registered record
        ancestor: CodebaseRecord,
    },
    /// Nothing registered covers the path
    NotFound(String),
}

/// The splitter strategies a context can dispatch between.
///
/// The syntax-aware splitter is the default; the window splitter is selected
/// when a caller passes the `window` hint.
pub struct SplitterSet {
    /// Syntax-aware splitter with its own window fallback
    pub syntax: Arc<dyn Splitter>,
    /// Pure character-window splitter
    pub window: Arc<dyn Splitter>,
}

impl SplitterSet {
    /// Set over the two injected strategies
    pub fn new(syntax: Arc<dyn Splitter>, window: Arc<dyn Splitter>) -> Self {
        Self { syntax, window }
    }
}

impl StatusReport {
    /// JSON rendering used by the server surface
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::All(records) => json!({ "codebases": records }),
            Self::One(record) => json!({ "codebase": record }),
            Self::CoveredBy { path, ancestor } => json!({
                "path": path,
                "covered_by": ancestor,
            }),
            Self::NotFound(path) => json!({
                "path": path,
                "status": "not_found",
            }),
        }
    }
}

/// The per-process engine façade
pub struct CodeContext {
    config: Config,
    registry: Arc<CodebaseRegistry>,
    locks: Arc<LockService>,
    memory: Arc<MemoryProbe>,
    embedding: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    splitters: SplitterSet,
    router: QueryRouter,
    active_runs: Mutex<HashMap<String, CancellationToken>>,
}

impl CodeContext {
    /// Wire the façade from configuration and injected collaborators
    pub async fn new(
        config: Config,
        embedding: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        splitters: SplitterSet,
    ) -> Result<Arc<Self>> {
        let registry = Arc::new(CodebaseRegistry::open(&config.data_dir).await?);
        let locks = Arc::new(LockService::new(&config.data_dir)?);
        let router = QueryRouter::new(
            Arc::clone(&registry),
            Arc::clone(&store),
            Arc::clone(&embedding),
            config.hybrid_mode,
        );
        Ok(Arc::new(Self {
            config,
            registry,
            locks,
            memory: Arc::new(MemoryProbe::new()),
            embedding,
            store,
            splitters,
            router,
            active_runs: Mutex::new(HashMap::new()),
        }))
    }

    /// The registry backing this context
    pub fn registry(&self) -> &Arc<CodebaseRegistry> {
        &self.registry
    }

    /// The lock service backing this context
    pub fn locks(&self) -> &Arc<LockService> {
        &self.locks
    }

    /// The effective configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn walker_for(&self, custom_extensions: &[String]) -> FileWalker {
        let mut extra = self.config.custom_extensions.clone();
        extra.extend(custom_extensions.iter().cloned());
        FileWalker::new(&extra)
    }

    fn rules_for(&self, root: &Path, custom_ignores: &[String]) -> IgnoreRules {
        let mut extra = self.config.custom_ignore_patterns.clone();
        extra.extend(custom_ignores.iter().cloned());
        IgnoreRules::resolve(root, &self.config.data_dir, &extra)
    }

    /// Index the codebase rooted at `path`.
    ///
    /// Registers it (state machine enforced), creates the collection if
    /// needed, and runs the pipeline under the cross-process lock for the
    /// root. On failure the record transitions to `indexfailed` with the last
    /// observed percent; cancellation leaves it `indexing` so a subsequent
    /// registration resumes forward.
    #[allow(clippy::too_many_arguments)]
    pub async fn index_codebase(
        &self,
        path: &Path,
        force: bool,
        custom_extensions: &[String],
        custom_ignores: &[String],
        splitter_hint: Option<&str>,
        progress: Option<ProgressCallback>,
    ) -> Result<IndexOutcome> {
        validate_directory(path)?;
        let canonical = fsutil::canonical_string(path)?;

        let was_registered = self.registry.info(&canonical).await.is_some();
        let record = self
            .registry
            .register(&canonical, self.config.hybrid_mode, force)
            .await?;

        let collection_exists = self.store.has_collection(&record.collection_name).await?;
        if !collection_exists && !self.store.check_collection_limit().await? {
            // Surfaced verbatim and terminal; undo a registration we created
            if !was_registered {
                self.registry.remove(&canonical).await?;
            }
            return Err(Error::CollectionLimitReached {
                message: COLLECTION_LIMIT_MESSAGE.to_string(),
            });
        }

        let cancel = CancellationToken::new();
        self.active_runs
            .lock()
            .await
            .insert(canonical.clone(), cancel.clone());

        let result = self
            .locks
            .with_lock(&canonical, &LockOptions::default(), async {
                self.run_index(
                    &canonical,
                    &record,
                    force,
                    custom_extensions,
                    custom_ignores,
                    splitter_hint,
                    progress,
                    &cancel,
                )
                .await
            })
            .await;

        self.active_runs.lock().await.remove(&canonical);

        match result {
            Ok(outcome) => Ok(outcome),
            Err(Error::IndexCancelled) => {
                // state stays `indexing` at the last observed percent
                Err(Error::IndexCancelled)
            }
            Err(e) => {
                let percent = self
                    .registry
                    .info(&canonical)
                    .await
                    .map(|r| r.progress_percent)
                    .unwrap_or(0);
                let _ = self
                    .registry
                    .set_indexfailed(&canonical, &e.to_string(), percent)
                    .await;
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_index(
        &self,
        canonical: &str,
        record: &CodebaseRecord,
        force: bool,
        custom_extensions: &[String],
        custom_ignores: &[String],
        splitter_hint: Option<&str>,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<IndexOutcome> {
        let root = PathBuf::from(canonical);
        let collection = &record.collection_name;

        if force && self.store.has_collection(collection).await? {
            self.store.drop_collection(collection).await?;
            Synchronizer::delete_snapshot(&self.config.data_dir, &root).await?;
        }
        if !self.store.has_collection(collection).await? {
            let dimension = match self.embedding.detect_dimension().await {
                Ok(dimension) => dimension,
                Err(e) => {
                    tracing::warn!("Dimension probe failed ({}); using the declared value", e);
                    self.embedding.dimensions()
                }
            };
            let description = format!("codectx index of {canonical}");
            if self.config.hybrid_mode {
                self.store
                    .create_hybrid_collection(collection, dimension, &description)
                    .await?;
            } else {
                self.store
                    .create_collection(collection, dimension, &description)
                    .await?;
            }
        }

        let walker = self.walker_for(custom_extensions);
        let rules = self.rules_for(&root, custom_ignores);
        let pipeline = self.pipeline(self.splitter_for(splitter_hint));
        let callback = self.progress_with_registry(canonical, progress);

        let outcome = pipeline
            .index_codebase(
                &root,
                collection,
                self.config.hybrid_mode,
                &walker,
                &rules,
                Some(callback),
                cancel,
            )
            .await?;

        // Snapshot once indexed, so the reconciler diffs against this run.
        // A limit-cut run must not snapshot: the unprocessed tail would
        // otherwise read as already indexed on the next diff.
        if outcome.status == IndexRunStatus::Completed {
            let mut synchronizer = Synchronizer::initialize(&root, &self.config.data_dir).await?;
            synchronizer.check_for_changes(&walker, &rules).await?;
            synchronizer.commit().await?;
        }

        self.registry
            .set_indexed(
                canonical,
                IndexStats {
                    files: outcome.indexed_files,
                    chunks: outcome.total_chunks,
                },
            )
            .await?;
        Ok(outcome)
    }

    /// Semantic search under `path`
    pub async fn search(
        &self,
        path: &Path,
        query: &str,
        limit: usize,
        threshold: Option<f32>,
        extension_filter: &[String],
    ) -> Result<Vec<SearchHit>> {
        self.router
            .semantic_search(path, query, limit, threshold, extension_filter)
            .await
    }

    /// Remove collection, snapshot and registry entry for `path`
    pub async fn clear_index(&self, path: &Path) -> Result<()> {
        let canonical = fsutil::canonical_string(path)
            .unwrap_or_else(|_| path.to_string_lossy().to_string());
        let record = self
            .registry
            .info(&canonical)
            .await
            .ok_or_else(|| Error::NotIndexed {
                root: canonical.clone(),
            })?;

        if let Some(cancel) = self.active_runs.lock().await.get(&canonical) {
            cancel.cancel();
        }

        self.locks
            .with_lock(&canonical, &LockOptions::default(), async {
                self.store.drop_collection(&record.collection_name).await?;
                Synchronizer::delete_snapshot(&self.config.data_dir, Path::new(&canonical)).await?;
                self.registry.remove(&canonical).await
            })
            .await
    }

    /// Per-codebase state or aggregate report
    pub async fn status(&self, path: Option<&Path>) -> Result<StatusReport> {
        match path {
            None => Ok(StatusReport::All(self.registry.all().await)),
            Some(path) => {
                let canonical = fsutil::canonical_string(path)
                    .unwrap_or_else(|_| path.to_string_lossy().to_string());
                if let Some(record) = self.registry.info(&canonical).await {
                    return Ok(StatusReport::One(record));
                }
                match self.registry.find_containing_index(&canonical).await {
                    Some(ancestor) => Ok(StatusReport::CoveredBy {
                        path: canonical,
                        ancestor,
                    }),
                    None => Ok(StatusReport::NotFound(canonical)),
                }
            }
        }
    }

    /// One reconcile pass over every indexed codebase; per-codebase errors
    /// are isolated and logged.
    pub async fn reconcile_all(&self) {
        for record in self.registry.all_indexed().await {
            if let Err(e) = self.reconcile_codebase(&record).await {
                tracing::warn!("Reconcile of {} failed: {}", record.root_path, e);
            }
        }
    }

    async fn reconcile_codebase(&self, record: &CodebaseRecord) -> Result<()> {
        let root = PathBuf::from(&record.root_path);
        if !root.is_dir() {
            tracing::warn!(
                "Indexed root {} no longer exists on disk; leaving the record in place",
                record.root_path
            );
            return Ok(());
        }

        // Externally deleted collection: drop the snapshot so the next
        // registration indexes from scratch.
        if !self.store.has_collection(&record.collection_name).await? {
            tracing::warn!(
                "Collection {} disappeared; deleting snapshot for {}",
                record.collection_name,
                record.root_path
            );
            return Synchronizer::delete_snapshot(&self.config.data_dir, &root).await;
        }

        if !self
            .locks
            .try_acquire(&record.root_path, &LockOptions::default())
            .await?
        {
            tracing::debug!(
                "Skipping reconcile of {}; locked by another process",
                record.root_path
            );
            return Ok(());
        }

        let result = async {
            let walker = self.walker_for(&[]);
            let rules = self.rules_for(&root, &[]);
            let mut synchronizer =
                Synchronizer::initialize(&root, &self.config.data_dir).await?;
            let pipeline = self.pipeline(Arc::clone(&self.splitters.syntax));
            let changes = pipeline
                .reindex_by_change(
                    &record.collection_name,
                    self.config.hybrid_mode,
                    &mut synchronizer,
                    &walker,
                    &rules,
                    None,
                    &CancellationToken::new(),
                )
                .await?;
            if changes.has_changes() {
                tracing::info!(
                    "Reconciled {}: {} added, {} removed, {} modified",
                    record.root_path,
                    changes.added.len(),
                    changes.removed.len(),
                    changes.modified.len()
                );
            }
            Ok(())
        }
        .await;

        if let Err(e) = self.locks.release(&record.root_path).await {
            tracing::warn!("Failed to release reconcile lock: {}", e);
        }
        result
    }

    /// Cancel every in-flight run and release all held locks
    pub async fn shutdown(&self) {
        for cancel in self.active_runs.lock().await.values() {
            cancel.cancel();
        }
        self.locks.release_all();
    }

    fn pipeline(&self, splitter: Arc<dyn Splitter>) -> IndexingPipeline {
        let plan = BatchPlan::compute(&*self.embedding, &self.config.pipeline);
        IndexingPipeline::new(
            splitter,
            Arc::clone(&self.embedding),
            Arc::clone(&self.store),
            Arc::clone(&self.memory),
            plan,
        )
    }

    fn splitter_for(&self, hint: Option<&str>) -> Arc<dyn Splitter> {
        match hint.map(|h| h.trim().to_lowercase()) {
            Some(hint) if hint == "window" || hint == "chars" || hint == "langchain" => {
                Arc::clone(&self.splitters.window)
            }
            Some(hint) if hint == "ast" || hint == "auto" || hint.is_empty() => {
                Arc::clone(&self.splitters.syntax)
            }
            Some(hint) => {
                tracing::warn!("Unknown splitter hint '{}'; using the default", hint);
                Arc::clone(&self.splitters.syntax)
            }
            None => Arc::clone(&self.splitters.syntax),
        }
    }

    /// Wrap the caller's callback so registry progress tracks the run
    fn progress_with_registry(
        &self,
        root: &str,
        caller: Option<ProgressCallback>,
    ) -> ProgressCallback {
        let registry = Arc::clone(&self.registry);
        let root = root.to_string();
        Arc::new(move |event: ProgressEvent| {
            if let Some(callback) = &caller {
                callback(event.clone());
            }
            let registry = Arc::clone(&registry);
            let root = root.clone();
            let percent = event.percent;
            tokio::spawn(async move {
                let _ = registry.set_indexing(&root, percent).await;
            });
        })
    }
}

fn validate_directory(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(Error::path(format!("{} does not exist", path.display())));
    }
    if !path.is_dir() {
        return Err(Error::path(format!("{} is not a directory", path.display())));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use codectx_domain::constants::MEMORY_LIMIT_MB_DEFAULT;
    use codectx_domain::types::{
        CodebaseStatus, EmbeddingConfig, EmbeddingProviderKind, VectorStoreConfig,
        VectorStoreKind,
    };
    use codectx_infrastructure::config::PipelineSettings;
    use codectx_providers::embedding::NullEmbeddingProvider;
    use codectx_providers::splitter::{CodeSplitter, WindowSplitter};
    use codectx_providers::vector_store::InMemoryVectorStore;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    struct Fixture {
        tree: TempDir,
        _data: TempDir,
        context: Arc<CodeContext>,
        store: Arc<InMemoryVectorStore>,
    }

    async fn fixture_with_limit(collection_limit: Option<usize>) -> Fixture {
        let tree = TempDir::new().unwrap();
        let data = TempDir::new().unwrap();
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
                collection_limit,
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
        let store = Arc::new(InMemoryVectorStore::new(collection_limit));
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
        Fixture {
            tree,
            _data: data,
            context,
            store,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with_limit(None).await
    }

    impl Fixture {
        fn write(&self, rel: &str, content: &str) {
            let path = self.tree.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }

        async fn record(&self) -> CodebaseRecord {
            let canonical = self.tree.path().canonicalize().unwrap();
            self.context
                .registry()
                .info(&canonical.to_string_lossy())
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn index_search_status_clear_roundtrip() {
        let fx = fixture().await;
        fx.write("a.py", "def read_config(path):\n    return path\n");
        fx.write("pkg/b.py", "def write_report(data):\n    return data\n");

        let outcome = fx
            .context
            .index_codebase(fx.tree.path(), false, &[], &[], None, None)
            .await
            .unwrap();
        assert_eq!(outcome.indexed_files, 2);
        assert_eq!(outcome.total_chunks, 2);

        let record = fx.record().await;
        assert_eq!(record.status, CodebaseStatus::Indexed);
        assert_eq!(record.progress_percent, 100);
        assert_eq!(record.stats, Some(IndexStats { files: 2, chunks: 2 }));
        assert!(record.collection_name.starts_with("hybrid_code_chunks_"));

        let hits = fx
            .context
            .search(fx.tree.path(), "def read_config(path):\n    return path\n", 10, None, &[])
            .await
            .unwrap();
        assert!(!hits.is_empty());

        // subtree search through the parent index
        let hits = fx
            .context
            .search(&fx.tree.path().join("pkg"), "write_report", 10, None, &[])
            .await
            .unwrap();
        assert!(hits.iter().all(|h| h.relative_path.starts_with("pkg/")));

        fx.context.clear_index(fx.tree.path()).await.unwrap();
        let report = fx.context.status(Some(fx.tree.path())).await.unwrap();
        assert!(matches!(report, StatusReport::NotFound(_)));
        assert!(fx.store.list_collections().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn double_index_needs_force_and_force_reindexes() {
        let fx = fixture().await;
        fx.write("a.py", "def f():\n    return 1\n");

        fx.context
            .index_codebase(fx.tree.path(), false, &[], &[], None, None)
            .await
            .unwrap();
        let err = fx
            .context
            .index_codebase(fx.tree.path(), false, &[], &[], None, None)
            .await;
        assert!(matches!(err, Err(Error::AlreadyIndexed { .. })));

        let outcome = fx
            .context
            .index_codebase(fx.tree.path(), true, &[], &[], None, None)
            .await
            .unwrap();
        assert_eq!(outcome.total_chunks, 1);
        assert_eq!(fx.record().await.status, CodebaseStatus::Indexed);
    }

    #[tokio::test]
    async fn collection_limit_is_terminal_and_leaves_no_record() {
        let fx = fixture_with_limit(Some(0)).await;
        fx.write("a.py", "def f():\n    return 1\n");

        let err = fx
            .context
            .index_codebase(fx.tree.path(), false, &[], &[], None, None)
            .await;
        match err {
            Err(Error::CollectionLimitReached { message }) => {
                assert_eq!(message, COLLECTION_LIMIT_MESSAGE);
            }
            other => panic!("expected CollectionLimitReached, got {other:?}"),
        }
        // no dangling registration, no collection created
        let report = fx.context.status(Some(fx.tree.path())).await.unwrap();
        assert!(matches!(report, StatusReport::NotFound(_)));
        assert!(fx.store.list_collections().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn status_reports_coverage_by_ancestor() {
        let fx = fixture().await;
        fx.write("pkg/a.py", "def f():\n    return 1\n");
        fx.context
            .index_codebase(fx.tree.path(), false, &[], &[], None, None)
            .await
            .unwrap();

        let report = fx
            .context
            .status(Some(&fx.tree.path().join("pkg")))
            .await
            .unwrap();
        match report {
            StatusReport::CoveredBy { ancestor, .. } => {
                assert_eq!(ancestor.status, CodebaseStatus::Indexed);
            }
            other => panic!("expected CoveredBy, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reconcile_applies_incremental_changes() {
        let fx = fixture().await;
        fx.write("a.py", "def f():\n    return 1\n");
        fx.context
            .index_codebase(fx.tree.path(), false, &[], &[], None, None)
            .await
            .unwrap();

        fx.write("b.py", "def g():\n    return 2\n");
        fx.context.reconcile_all().await;

        let record = fx.record().await;
        let rows = fx
            .store
            .query(
                &record.collection_name,
                "relative_path == \"b.py\"",
                &["id"],
                100,
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn reconcile_of_missing_collection_drops_snapshot() {
        let fx = fixture().await;
        fx.write("a.py", "def f():\n    return 1\n");
        fx.context
            .index_codebase(fx.tree.path(), false, &[], &[], None, None)
            .await
            .unwrap();

        let record = fx.record().await;
        fx.store
            .drop_collection(&record.collection_name)
            .await
            .unwrap();
        fx.context.reconcile_all().await;

        // record survives; snapshot is gone so a forced run rebuilds fully
        assert_eq!(fx.record().await.status, CodebaseStatus::Indexed);
    }

    #[tokio::test]
    async fn indexing_a_subtree_of_registered_root_is_rejected() {
        let fx = fixture().await;
        fx.write("pkg/a.py", "def f():\n    return 1\n");
        fx.context
            .index_codebase(fx.tree.path(), false, &[], &[], None, None)
            .await
            .unwrap();

        let err = fx
            .context
            .index_codebase(&fx.tree.path().join("pkg"), false, &[], &[], None, None)
            .await;
        assert!(matches!(err, Err(Error::SubtreeCovered { .. })));
    }
}
