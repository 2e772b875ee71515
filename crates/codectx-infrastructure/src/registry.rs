//! Durable codebase registry and lifecycle state machine
//!
//! In-memory map of canonical root path to [`CodebaseRecord`], persisted as a
//! single JSON file rewritten atomically on every mutation. One in-process
//! mutex serializes mutations; cross-process write conflicts on the same
//! codebase are prevented by the advisory locks held during any mutation of
//! that codebase.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use codectx_domain::constants::{
    COLLECTION_DIGEST_LEN, COLLECTION_DIGEST_LEN_EXTENDED, COLLECTION_PREFIX_DENSE,
    COLLECTION_PREFIX_HYBRID,
};
use codectx_domain::error::{Error, Result};
use codectx_domain::types::{CodebaseRecord, CodebaseStatus, IndexStats};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::fsutil;

/// Registry file name under the data directory
const REGISTRY_FILE: &str = "registry.json";

/// On-disk format version
const REGISTRY_VERSION: u32 = 1;

/// On-disk shape: indexed and in-flight codebases kept disjoint
#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    version: u32,
    last_updated_ms: u64,
    indexes: Vec<CodebaseRecord>,
    active_indexing: Vec<CodebaseRecord>,
}

/// Registry of all codebases known to this user
pub struct CodebaseRegistry {
    path: PathBuf,
    inner: Mutex<HashMap<String, CodebaseRecord>>,
}

impl CodebaseRegistry {
    /// Open (or create) the registry persisted under `data_dir`
    pub async fn open(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(REGISTRY_FILE);
        let records = match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<RegistryFile>(&content) {
                Ok(file) => file
                    .indexes
                    .into_iter()
                    .chain(file.active_indexing)
                    .map(|r| (r.root_path.clone(), r))
                    .collect(),
                Err(e) => {
                    tracing::warn!("Corrupt registry {}; starting empty: {}", path.display(), e);
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Ok(Self {
            path,
            inner: Mutex::new(records),
        })
    }

    /// Register `root` for indexing, enforcing the lifecycle state machine.
    ///
    /// Fails with `AlreadyIndexing` when a run is in flight, `AlreadyIndexed`
    /// when indexed and `force` is false, and `SubtreeCovered` when an
    /// ancestor of `root` is already registered. A record in `indexfailed`
    /// always transitions back to `indexing` (retry).
    pub async fn register(&self, root: &str, hybrid: bool, force: bool) -> Result<CodebaseRecord> {
        let mut records = self.inner.lock().await;

        if let Some(ancestor) = find_containing(&records, root) {
            if ancestor.root_path != root {
                return Err(Error::SubtreeCovered {
                    root: root.to_string(),
                    ancestor: ancestor.root_path.clone(),
                });
            }
        }

        let record = match records.get(root) {
            Some(existing) => match existing.status {
                CodebaseStatus::Indexing => {
                    return Err(Error::AlreadyIndexing {
                        root: root.to_string(),
                    });
                }
                CodebaseStatus::Indexed if !force => {
                    return Err(Error::AlreadyIndexed {
                        root: root.to_string(),
                    });
                }
                // force reindex or retry after failure
                CodebaseStatus::Indexed | CodebaseStatus::IndexFailed => {
                    let mut record = existing.clone();
                    record.status = CodebaseStatus::Indexing;
                    record.progress_percent = 0;
                    record.stats = None;
                    record.error_message = None;
                    record.last_attempted_percent = None;
                    record.last_updated_ms = fsutil::now_ms();
                    record
                }
            },
            None => {
                let digest = fsutil::path_digest(root);
                let collection_name = pick_collection_name(&records, root, &digest, hybrid);
                CodebaseRecord {
                    root_path: root.to_string(),
                    status: CodebaseStatus::Indexing,
                    progress_percent: 0,
                    last_updated_ms: fsutil::now_ms(),
                    collection_name,
                    path_digest: digest,
                    stats: None,
                    error_message: None,
                    last_attempted_percent: None,
                }
            }
        };

        records.insert(root.to_string(), record.clone());
        self.persist(&records).await;
        Ok(record)
    }

    /// Record indexing progress; percent is monotone non-decreasing.
    ///
    /// A no-op when the codebase already left the `indexing` state, so a
    /// straggling progress update cannot flip a terminal record back.
    pub async fn set_indexing(&self, root: &str, percent: u8) -> Result<()> {
        let mut records = self.inner.lock().await;
        let record = records.get_mut(root).ok_or_else(|| Error::NotIndexed {
            root: root.to_string(),
        })?;
        if record.status != CodebaseStatus::Indexing {
            return Ok(());
        }
        record.progress_percent = record.progress_percent.max(percent.min(100));
        record.last_updated_ms = fsutil::now_ms();
        self.persist(&records).await;
        Ok(())
    }

    /// Transition to `indexed` with final stats
    pub async fn set_indexed(&self, root: &str, stats: IndexStats) -> Result<()> {
        let mut records = self.inner.lock().await;
        let record = records.get_mut(root).ok_or_else(|| Error::NotIndexed {
            root: root.to_string(),
        })?;
        record.status = CodebaseStatus::Indexed;
        record.progress_percent = 100;
        record.stats = Some(stats);
        record.error_message = None;
        record.last_attempted_percent = None;
        record.last_updated_ms = fsutil::now_ms();
        self.persist(&records).await;
        Ok(())
    }

    /// Transition to `indexfailed`, recording the failure context
    pub async fn set_indexfailed(
        &self,
        root: &str,
        error_message: &str,
        last_percent: u8,
    ) -> Result<()> {
        let mut records = self.inner.lock().await;
        let record = records.get_mut(root).ok_or_else(|| Error::NotIndexed {
            root: root.to_string(),
        })?;
        record.status = CodebaseStatus::IndexFailed;
        record.error_message = Some(error_message.to_string());
        record.last_attempted_percent = Some(last_percent.min(100));
        record.last_updated_ms = fsutil::now_ms();
        self.persist(&records).await;
        Ok(())
    }

    /// Remove a codebase from the registry
    pub async fn remove(&self, root: &str) -> Result<()> {
        let mut records = self.inner.lock().await;
        records.remove(root);
        self.persist(&records).await;
        Ok(())
    }

    /// Lifecycle state of `root`, if registered
    pub async fn status(&self, root: &str) -> Option<CodebaseStatus> {
        self.inner.lock().await.get(root).map(|r| r.status)
    }

    /// Full record of `root`, if registered
    pub async fn info(&self, root: &str) -> Option<CodebaseRecord> {
        self.inner.lock().await.get(root).cloned()
    }

    /// All registered codebases
    pub async fn all(&self) -> Vec<CodebaseRecord> {
        let mut records: Vec<_> = self.inner.lock().await.values().cloned().collect();
        records.sort_by(|a, b| a.root_path.cmp(&b.root_path));
        records
    }

    /// Codebases in the `indexed` state
    pub async fn all_indexed(&self) -> Vec<CodebaseRecord> {
        self.filtered(CodebaseStatus::Indexed).await
    }

    /// Codebases in the `indexing` state
    pub async fn all_indexing(&self) -> Vec<CodebaseRecord> {
        self.filtered(CodebaseStatus::Indexing).await
    }

    /// Whether the registry holds no codebases
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    /// Longest registered root containing `path` (equality counts)
    pub async fn find_containing_index(&self, path: &str) -> Option<CodebaseRecord> {
        let records = self.inner.lock().await;
        find_containing(&records, path).cloned()
    }

    async fn filtered(&self, status: CodebaseStatus) -> Vec<CodebaseRecord> {
        let mut records: Vec<_> = self
            .inner
            .lock()
            .await
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.root_path.cmp(&b.root_path));
        records
    }

    /// Write the registry file atomically; one retry, then log and carry on
    /// with consistent in-memory state.
    async fn persist(&self, records: &HashMap<String, CodebaseRecord>) {
        let mut file = RegistryFile {
            version: REGISTRY_VERSION,
            last_updated_ms: fsutil::now_ms(),
            indexes: Vec::new(),
            active_indexing: Vec::new(),
        };
        let mut sorted: Vec<_> = records.values().cloned().collect();
        sorted.sort_by(|a, b| a.root_path.cmp(&b.root_path));
        for record in sorted {
            if record.status == CodebaseStatus::Indexing {
                file.active_indexing.push(record);
            } else {
                file.indexes.push(record);
            }
        }

        let bytes = match serde_json::to_vec_pretty(&file) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!("Failed to serialize registry: {}", e);
                return;
            }
        };

        for attempt in 0..2 {
            match fsutil::atomic_write(&self.path, bytes.clone()).await {
                Ok(()) => return,
                Err(e) if attempt == 0 => {
                    tracing::warn!("Registry write failed, retrying once: {}", e);
                }
                Err(e) => {
                    tracing::error!("Registry write failed after retry: {}", e);
                }
            }
        }
    }
}

/// Longest root `r` with `r == path` or `path` under `r`
fn find_containing<'a>(
    records: &'a HashMap<String, CodebaseRecord>,
    path: &str,
) -> Option<&'a CodebaseRecord> {
    records
        .values()
        .filter(|r| {
            path == r.root_path
                || path.starts_with(&format!("{}{}", r.root_path, std::path::MAIN_SEPARATOR))
        })
        .max_by_key(|r| r.root_path.len())
}

/// Deterministic collection name, extending the digest prefix when two
/// distinct roots collide on the short form. A silent shared collection is
/// never acceptable.
fn pick_collection_name(
    records: &HashMap<String, CodebaseRecord>,
    root: &str,
    digest: &str,
    hybrid: bool,
) -> String {
    let prefix = if hybrid {
        COLLECTION_PREFIX_HYBRID
    } else {
        COLLECTION_PREFIX_DENSE
    };
    let short = format!("{}_{}", prefix, &digest[..COLLECTION_DIGEST_LEN]);
    let collides = records
        .values()
        .any(|r| r.root_path != root && r.collection_name == short);
    if collides {
        tracing::warn!(
            "Collection name collision on '{}' for root '{}'; using extended digest",
            short,
            root
        );
        format!("{}_{}", prefix, &digest[..COLLECTION_DIGEST_LEN_EXTENDED])
    } else {
        short
    }
}
