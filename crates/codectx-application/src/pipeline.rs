//! The indexing pipeline
//!
//! Orchestrates walk → split → embed → persist as communicating stages over
//! bounded channels: a file-processing pool feeds a chunk channel; a batcher
//! freezes chunks into pending batches on size or memory pressure; embedding
//! workers consume batches concurrently and push documents into a bounded
//! insert queue. Backpressure is channel capacity. Progress is reported from
//! one call site and is monotone non-decreasing within a run.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use codectx_domain::constants::{
    MAX_CHUNKS_PER_RUN, MEMORY_PRESSURE_GC, MEMORY_PRESSURE_HARD, MEMORY_PRESSURE_SOFT,
    SCAN_PROGRESS_BUDGET,
};
use codectx_domain::error::{Error, Result};
use codectx_domain::ports::{EmbeddingProvider, Splitter, VectorStore};
use codectx_domain::types::{
    Chunk, ChunkDocument, IndexOutcome, IndexRunStatus, Language, ProgressEvent, SnapshotChanges,
};
use codectx_infrastructure::fsutil;
use codectx_infrastructure::ignore_rules::IgnoreRules;
use codectx_infrastructure::memory::MemoryProbe;
use codectx_infrastructure::snapshot::Synchronizer;
use codectx_infrastructure::walker::FileWalker;
use futures::stream::{self, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::batching::BatchPlan;

/// Callback invoked with each progress event
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Insert attempts before a store failure aborts the run
const INSERT_RETRIES: u32 = 3;

/// Base backoff between insert retries, milliseconds
const INSERT_BACKOFF_BASE_MS: u64 = 500;

/// Rows fetched per scalar query when collecting ids to delete
const DELETE_QUERY_PAGE: usize = 1000;

/// A chunk travelling the pipeline with its position in its file
struct PendingChunk {
    chunk: Chunk,
    index: usize,
}

/// Monotone progress reporter; the only place callbacks are invoked
struct ProgressReporter {
    callback: Option<ProgressCallback>,
    last_percent: AtomicU8,
}

impl ProgressReporter {
    fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            callback,
            last_percent: AtomicU8::new(0),
        }
    }

    fn emit(&self, phase: &str, current: usize, total: usize, percent: u8) {
        let requested = percent.min(100);
        let previous = self.last_percent.fetch_max(requested, Ordering::SeqCst);
        let effective = requested.max(previous);
        if let Some(callback) = &self.callback {
            callback(ProgressEvent {
                phase: phase.to_string(),
                current,
                total,
                percent: effective,
            });
        }
    }
}

/// The two-stage indexing pipeline
pub struct IndexingPipeline {
    splitter: Arc<dyn Splitter>,
    embedding: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    memory: Arc<MemoryProbe>,
    plan: BatchPlan,
    chunk_limit: usize,
}

impl IndexingPipeline {
    /// Pipeline over the given collaborators and batch plan
    pub fn new(
        splitter: Arc<dyn Splitter>,
        embedding: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        memory: Arc<MemoryProbe>,
        plan: BatchPlan,
    ) -> Self {
        Self {
            splitter,
            embedding,
            store,
            memory,
            plan,
            chunk_limit: MAX_CHUNKS_PER_RUN,
        }
    }

    /// Override the per-run chunk ceiling (tests exercise the cutoff at a
    /// tractable scale)
    pub fn with_chunk_limit(mut self, chunk_limit: usize) -> Self {
        self.chunk_limit = chunk_limit.max(1);
        self
    }

    /// The active batch plan
    pub fn plan(&self) -> &BatchPlan {
        &self.plan
    }

    /// Index every supported file under `root` into `collection`
    pub async fn index_codebase(
        &self,
        root: &Path,
        collection: &str,
        hybrid: bool,
        walker: &FileWalker,
        rules: &IgnoreRules,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<IndexOutcome> {
        let reporter = Arc::new(ProgressReporter::new(progress));
        reporter.emit("Preparing", 0, 0, 1);

        // The walker yields canonical paths; relative paths must strip
        // against the same form.
        let root = root
            .canonicalize()
            .map_err(|e| Error::path(format!("Cannot canonicalize {}: {}", root.display(), e)))?;
        let root = root.as_path();

        let files = {
            let walker = walker.clone();
            let rules = rules.clone();
            let root = root.to_path_buf();
            tokio::task::spawn_blocking(move || walker.walk(&root, &rules))
                .await
                .map_err(|e| Error::internal(format!("Scan task failed: {e}")))??
        };

        if files.is_empty() {
            reporter.emit("No files to index", 0, 0, 100);
            return Ok(IndexOutcome {
                indexed_files: 0,
                total_chunks: 0,
                status: IndexRunStatus::Completed,
            });
        }

        reporter.emit("Scanned files", files.len(), files.len(), SCAN_PROGRESS_BUDGET);
        self.process_files(root, collection, hybrid, files, reporter, cancel)
            .await
    }

    /// Apply a snapshot diff: delete documents of removed and modified paths,
    /// then index added and modified files. The snapshot is committed only on
    /// clean completion.
    #[allow(clippy::too_many_arguments)]
    pub async fn reindex_by_change(
        &self,
        collection: &str,
        hybrid: bool,
        synchronizer: &mut Synchronizer,
        walker: &FileWalker,
        rules: &IgnoreRules,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<SnapshotChanges> {
        let reporter = Arc::new(ProgressReporter::new(progress));
        let root = synchronizer.root().to_path_buf();
        let root = root.as_path();
        let changes = synchronizer.check_for_changes(walker, rules).await?;

        if !changes.has_changes() {
            reporter.emit("No changes detected", 0, 0, 100);
            return Ok(changes);
        }
        tracing::info!(
            added = changes.added.len(),
            removed = changes.removed.len(),
            modified = changes.modified.len(),
            "applying snapshot diff to {}",
            collection
        );

        for relative in changes.removed.iter().chain(&changes.modified) {
            self.delete_documents_for_path(collection, relative).await?;
        }

        let files: Vec<PathBuf> = changes
            .added
            .iter()
            .chain(&changes.modified)
            .map(|relative| root.join(relative))
            .collect();
        if files.is_empty() {
            reporter.emit("Removed stale documents", 0, 0, 100);
        } else {
            let outcome = self
                .process_files(root, collection, hybrid, files, reporter, cancel)
                .await?;
            if outcome.status == IndexRunStatus::LimitReached {
                // Do not snapshot a partially applied diff; the next pass
                // must re-detect the unprocessed tail.
                return Ok(changes);
            }
        }

        synchronizer.commit().await?;
        Ok(changes)
    }

    /// Delete every document whose `relative_path` equals `relative`
    async fn delete_documents_for_path(&self, collection: &str, relative: &str) -> Result<()> {
        let filter = format!("relative_path == \"{}\"", filter_escape(relative));
        loop {
            let rows = self
                .store
                .query(collection, &filter, &["id"], DELETE_QUERY_PAGE)
                .await?;
            if rows.is_empty() {
                return Ok(());
            }
            let ids: Vec<String> = rows
                .iter()
                .filter_map(|row| row.get("id").and_then(|v| v.as_str()).map(String::from))
                .collect();
            let fetched = rows.len();
            self.store.delete(collection, &ids).await?;
            if fetched < DELETE_QUERY_PAGE {
                return Ok(());
            }
        }
    }

    /// Run the staged pipeline over an explicit file list
    async fn process_files(
        &self,
        root: &Path,
        collection: &str,
        hybrid: bool,
        files: Vec<PathBuf>,
        reporter: Arc<ProgressReporter>,
        cancel: &CancellationToken,
    ) -> Result<IndexOutcome> {
        let total_files = files.len();
        let codebase_path = root.to_string_lossy().to_string();

        // The run token observes external cancellation and is cancelled
        // internally when an insert failure aborts the run.
        let run = cancel.child_token();

        let (chunk_tx, chunk_rx) = mpsc::channel::<PendingChunk>(self.plan.embedding_batch_size * 2);
        let (batch_tx, batch_rx) = mpsc::channel::<Vec<PendingChunk>>(self.plan.api_concurrency);
        let (insert_tx, insert_rx) =
            mpsc::channel::<Vec<ChunkDocument>>(self.plan.insert_queue_depth);

        let chunk_count = Arc::new(AtomicUsize::new(0));
        let persisted = Arc::new(AtomicUsize::new(0));
        let limit_hit = Arc::new(AtomicBool::new(false));

        let batcher = tokio::spawn(batcher_stage(
            chunk_rx,
            batch_tx,
            Arc::clone(&self.memory),
            self.plan.embedding_batch_size,
            self.plan.memory_limit_mb,
        ));

        let batch_rx = Arc::new(Mutex::new(batch_rx));
        let mut embed_workers = Vec::with_capacity(self.plan.api_concurrency);
        for _ in 0..self.plan.api_concurrency {
            embed_workers.push(tokio::spawn(embed_worker(
                Arc::clone(&batch_rx),
                insert_tx.clone(),
                Arc::clone(&self.embedding),
                codebase_path.clone(),
                run.clone(),
            )));
        }
        // Workers own the only receiver handles from here on; when the last
        // worker exits, the batcher's sends fail instead of blocking.
        drop(batch_rx);
        drop(insert_tx);

        let inserter = tokio::spawn(insert_stage(
            insert_rx,
            Arc::clone(&self.store),
            collection.to_string(),
            hybrid,
            Arc::clone(&persisted),
            run.clone(),
        ));

        // File-level concurrent processing; progress is driven here, after
        // each file completes, and nowhere else.
        let mut indexed_files = 0usize;
        let mut files_done = 0usize;
        {
            let splitter = Arc::clone(&self.splitter);
            let chunk_limit = self.chunk_limit;
            let mut completions = stream::iter(files.into_iter())
                .map(|path| {
                    process_one_file(
                        path,
                        root.to_path_buf(),
                        Arc::clone(&splitter),
                        chunk_tx.clone(),
                        Arc::clone(&chunk_count),
                        Arc::clone(&limit_hit),
                        chunk_limit,
                        run.clone(),
                    )
                })
                .buffer_unordered(self.plan.file_concurrency);

            while let Some(chunks_sent) = completions.next().await {
                files_done += 1;
                if chunks_sent > 0 {
                    indexed_files += 1;
                }
                let percent = SCAN_PROGRESS_BUDGET
                    + ((100 - SCAN_PROGRESS_BUDGET) as usize * files_done / total_files) as u8;
                reporter.emit("Indexing files", files_done, total_files, percent);
            }
        }
        drop(chunk_tx);

        // Final drain: remainder batches and all outstanding inserts
        batcher
            .await
            .map_err(|e| Error::internal(format!("Batcher task failed: {e}")))?;
        for worker in embed_workers {
            worker
                .await
                .map_err(|e| Error::internal(format!("Embedding worker failed: {e}")))?;
        }
        inserter
            .await
            .map_err(|e| Error::internal(format!("Insert task failed: {e}")))??;

        if cancel.is_cancelled() {
            return Err(Error::IndexCancelled);
        }

        let status = if limit_hit.load(Ordering::SeqCst) {
            tracing::warn!(
                "chunk limit of {} reached for {}; stopping at the boundary",
                self.chunk_limit,
                codebase_path
            );
            IndexRunStatus::LimitReached
        } else {
            IndexRunStatus::Completed
        };
        reporter.emit("Indexing complete", files_done, total_files, 100);

        Ok(IndexOutcome {
            indexed_files,
            total_chunks: persisted.load(Ordering::SeqCst),
            status,
        })
    }
}

/// Read and split one file, pushing its chunks downstream.
/// Returns the number of chunks submitted.
#[allow(clippy::too_many_arguments)]
async fn process_one_file(
    path: PathBuf,
    root: PathBuf,
    splitter: Arc<dyn Splitter>,
    chunk_tx: mpsc::Sender<PendingChunk>,
    chunk_count: Arc<AtomicUsize>,
    limit_hit: Arc<AtomicBool>,
    chunk_limit: usize,
    run: CancellationToken,
) -> usize {
    if run.is_cancelled() || limit_hit.load(Ordering::SeqCst) {
        return 0;
    }

    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!("Skipping unreadable file {}: {}", path.display(), e);
            return 0;
        }
    };

    let relative = fsutil::to_posix(path.strip_prefix(&root).unwrap_or(&path));
    let language = Language::from_extension(
        path.extension().and_then(|e| e.to_str()).unwrap_or(""),
    );

    let chunks = {
        let splitter = Arc::clone(&splitter);
        let relative = relative.clone();
        tokio::task::spawn_blocking(move || splitter.split(&content, language, &relative)).await
    };
    let chunks = match chunks {
        Ok(Ok(chunks)) => chunks,
        Ok(Err(e)) => {
            tracing::warn!("Split failed for {}; skipping: {}", relative, e);
            return 0;
        }
        Err(e) => {
            tracing::warn!("Split task failed for {}; skipping: {}", relative, e);
            return 0;
        }
    };

    let mut sent = 0usize;
    for (index, chunk) in chunks.into_iter().enumerate() {
        if run.is_cancelled() {
            break;
        }
        // Landing exactly on the ceiling still submits that final chunk but
        // raises the flag; exactly one task observes the boundary value.
        let produced = chunk_count.fetch_add(1, Ordering::SeqCst) + 1;
        if produced > chunk_limit {
            break;
        }
        if produced == chunk_limit {
            limit_hit.store(true, Ordering::SeqCst);
        }
        if chunk_tx.send(PendingChunk { chunk, index }).await.is_err() {
            break;
        }
        sent += 1;
    }
    sent
}

/// Accumulate chunks and freeze pending batches on size or memory pressure
async fn batcher_stage(
    mut chunk_rx: mpsc::Receiver<PendingChunk>,
    batch_tx: mpsc::Sender<Vec<PendingChunk>>,
    memory: Arc<MemoryProbe>,
    batch_size: usize,
    memory_limit_mb: u64,
) {
    let mut buffer: Vec<PendingChunk> = Vec::with_capacity(batch_size);
    while let Some(pending) = chunk_rx.recv().await {
        buffer.push(pending);

        let pressure = memory.pressure(memory_limit_mb);
        let mut threshold = batch_size;
        if pressure > MEMORY_PRESSURE_SOFT {
            threshold = (threshold / 2).max(1);
        }

        if buffer.len() >= threshold || pressure > MEMORY_PRESSURE_HARD {
            if batch_tx.send(std::mem::take(&mut buffer)).await.is_err() {
                return;
            }
            if memory.pressure(memory_limit_mb) > MEMORY_PRESSURE_GC {
                memory.request_gc_hint();
            }
        }
    }
    if !buffer.is_empty() {
        let _ = batch_tx.send(buffer).await;
    }
}

/// Stage A: embed pending batches. A batch whose embedding fails after the
/// provider's retries is dropped with a warning; indexing proceeds.
async fn embed_worker(
    batch_rx: Arc<Mutex<mpsc::Receiver<Vec<PendingChunk>>>>,
    insert_tx: mpsc::Sender<Vec<ChunkDocument>>,
    embedding: Arc<dyn EmbeddingProvider>,
    codebase_path: String,
    run: CancellationToken,
) {
    loop {
        if run.is_cancelled() {
            return;
        }
        let batch = { batch_rx.lock().await.recv().await };
        let Some(batch) = batch else {
            return;
        };

        let texts: Vec<String> = batch.iter().map(|p| p.chunk.content.clone()).collect();
        match embedding.embed_batch(&texts).await {
            Ok(embeddings) if embeddings.len() == batch.len() => {
                let docs: Vec<ChunkDocument> = batch
                    .iter()
                    .zip(embeddings)
                    .map(|(pending, embedding)| {
                        ChunkDocument::from_chunk(
                            &pending.chunk,
                            embedding.vector,
                            &codebase_path,
                            pending.index,
                        )
                    })
                    .collect();
                if insert_tx.send(docs).await.is_err() {
                    return;
                }
            }
            Ok(embeddings) => {
                tracing::warn!(
                    "Dropping batch: provider returned {} embeddings for {} chunks",
                    embeddings.len(),
                    batch.len()
                );
            }
            Err(e) => {
                tracing::warn!("Dropping batch of {} chunks: {}", batch.len(), e);
            }
        }
    }
}

/// Stage B: persist documents. A store failure after retries aborts the run.
async fn insert_stage(
    mut insert_rx: mpsc::Receiver<Vec<ChunkDocument>>,
    store: Arc<dyn VectorStore>,
    collection: String,
    hybrid: bool,
    persisted: Arc<AtomicUsize>,
    run: CancellationToken,
) -> Result<()> {
    while let Some(docs) = insert_rx.recv().await {
        match insert_with_retries(&*store, &collection, hybrid, &docs).await {
            Ok(()) => {
                persisted.fetch_add(docs.len(), Ordering::SeqCst);
            }
            Err(e) => {
                tracing::error!("Insert failed after retries; aborting run: {}", e);
                run.cancel();
                // Drain remaining queue so producers unblock
                while insert_rx.recv().await.is_some() {}
                return Err(e);
            }
        }
    }
    Ok(())
}

async fn insert_with_retries(
    store: &dyn VectorStore,
    collection: &str,
    hybrid: bool,
    docs: &[ChunkDocument],
) -> Result<()> {
    let mut attempt: u32 = 0;
    loop {
        let result = if hybrid {
            store.insert_hybrid_batched(collection, docs).await
        } else {
            store.insert(collection, docs).await
        };
        match result {
            Ok(()) => return Ok(()),
            Err(e) if attempt + 1 < INSERT_RETRIES => {
                let delay =
                    std::time::Duration::from_millis(INSERT_BACKOFF_BASE_MS << attempt);
                tracing::warn!(
                    "Insert attempt {} failed ({}); retrying in {:?}",
                    attempt + 1,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Escape a value for the scalar filter dialect
fn filter_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
