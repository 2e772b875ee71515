//! Content-addressed codebase snapshots and change detection
//!
//! A snapshot is the mapping of every indexable relative path to the SHA-256
//! of its content, plus a Merkle aggregate over the sorted entries used as a
//! fast whole-tree equality check. Snapshots are committed atomically and
//! only after a run completes cleanly, so a crashed run re-detects its work.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use codectx_domain::error::{Error, Result};
use codectx_domain::types::SnapshotChanges;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::fsutil;
use crate::ignore_rules::IgnoreRules;
use crate::walker::FileWalker;

/// Directory under the data dir holding one snapshot file per codebase
const SNAPSHOT_DIR: &str = "snapshots";

/// On-disk shape of a snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SnapshotFile {
    /// Aggregate hash over the sorted entries
    merkle_root: String,
    /// Relative path (`/`-separated) to content SHA-256
    entries: BTreeMap<String, String>,
}

/// Per-codebase synchronizer: persisted hashes plus on-demand diffing
pub struct Synchronizer {
    root: PathBuf,
    snapshot_path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl Synchronizer {
    /// Load the persisted snapshot for `root` if present, else start empty
    pub async fn initialize(root: &Path, data_dir: &Path) -> Result<Self> {
        let root = root
            .canonicalize()
            .map_err(|e| Error::path(format!("Cannot canonicalize {}: {}", root.display(), e)))?;
        let snapshot_path = snapshot_path_for(data_dir, &root);

        let entries = match tokio::fs::read_to_string(&snapshot_path).await {
            Ok(content) => match serde_json::from_str::<SnapshotFile>(&content) {
                Ok(file) => file.entries,
                Err(e) => {
                    tracing::warn!(
                        "Corrupt snapshot {}; starting empty: {}",
                        snapshot_path.display(),
                        e
                    );
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };

        Ok(Self {
            root,
            snapshot_path,
            entries,
        })
    }

    /// Canonical root this synchronizer tracks
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Current in-memory entries
    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    /// Walk the root, hash every indexable file and diff against the held
    /// state. Updates the in-memory state to the observed tree on success;
    /// nothing touches disk until [`Self::commit`].
    ///
    /// Single unreadable files are skipped with a warning and do not fail
    /// the diff. Running this twice with no filesystem mutation yields empty
    /// sets on the second call.
    pub async fn check_for_changes(
        &mut self,
        walker: &FileWalker,
        rules: &IgnoreRules,
    ) -> Result<SnapshotChanges> {
        let root = self.root.clone();
        let walker = walker.clone();
        let rules = rules.clone();

        let current = tokio::task::spawn_blocking(move || hash_tree(&root, &walker, &rules))
            .await
            .map_err(|e| Error::internal(format!("Snapshot hashing task failed: {e}")))??;

        // Merkle short-circuit: identical aggregate means identical tree
        if merkle_root(&current) == merkle_root(&self.entries) {
            self.entries = current;
            return Ok(SnapshotChanges::default());
        }

        let mut changes = SnapshotChanges::default();
        for (path, hash) in &current {
            match self.entries.get(path) {
                None => changes.added.push(path.clone()),
                Some(previous) if previous != hash => changes.modified.push(path.clone()),
                Some(_) => {}
            }
        }
        for path in self.entries.keys() {
            if !current.contains_key(path) {
                changes.removed.push(path.clone());
            }
        }

        self.entries = current;
        Ok(changes)
    }

    /// Atomically replace the on-disk snapshot with the in-memory state
    pub async fn commit(&self) -> Result<()> {
        let file = SnapshotFile {
            merkle_root: merkle_root(&self.entries),
            entries: self.entries.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&file)?;
        fsutil::atomic_write(&self.snapshot_path, bytes).await
    }

    /// Remove the on-disk snapshot for `root`, if any
    pub async fn delete_snapshot(data_dir: &Path, root: &Path) -> Result<()> {
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        let path = snapshot_path_for(data_dir, &root);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io_with_source(
                format!("Failed to remove snapshot {}", path.display()),
                e,
            )),
        }
    }
}

/// Snapshot file path derived deterministically from the canonical root
fn snapshot_path_for(data_dir: &Path, root: &Path) -> PathBuf {
    let digest = fsutil::path_digest(&root.to_string_lossy());
    data_dir.join(SNAPSHOT_DIR).join(format!("{digest}.json"))
}

/// Hash every indexable file under `root`
fn hash_tree(
    root: &Path,
    walker: &FileWalker,
    rules: &IgnoreRules,
) -> Result<BTreeMap<String, String>> {
    let files = walker.walk(root, rules)?;
    let mut entries = BTreeMap::new();
    for file in files {
        let content = match std::fs::read(&file) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("Skipping unreadable file {}: {}", file.display(), e);
                continue;
            }
        };
        let Ok(relative) = file.strip_prefix(root) else {
            continue;
        };
        let mut hasher = Sha256::new();
        hasher.update(&content);
        entries.insert(fsutil::to_posix(relative), hex::encode(hasher.finalize()));
    }
    Ok(entries)
}

/// Aggregate hash over the sorted entries
fn merkle_root(entries: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    for (path, hash) in entries {
        hasher.update(path.as_bytes());
        hasher.update([0u8]);
        hasher.update(hash.as_bytes());
        hasher.update([b'\n']);
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        tree: TempDir,
        data: TempDir,
        walker: FileWalker,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                tree: TempDir::new().unwrap(),
                data: TempDir::new().unwrap(),
                walker: FileWalker::new(&[]),
            }
        }

        fn rules(&self) -> IgnoreRules {
            IgnoreRules::resolve(self.tree.path(), self.data.path(), &[])
        }

        fn write(&self, rel: &str, content: &str) {
            let path = self.tree.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }

        async fn sync(&self) -> Synchronizer {
            Synchronizer::initialize(self.tree.path(), self.data.path())
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn first_diff_reports_everything_as_added() {
        let fx = Fixture::new();
        fx.write("a.py", "print('a')\n");
        fx.write("src/b.py", "print('b')\n");

        let mut sync = fx.sync().await;
        let changes = sync.check_for_changes(&fx.walker, &fx.rules()).await.unwrap();
        assert_eq!(changes.added, vec!["a.py", "src/b.py"]);
        assert!(changes.removed.is_empty());
        assert!(changes.modified.is_empty());
    }

    #[tokio::test]
    async fn second_diff_without_mutation_is_empty() {
        let fx = Fixture::new();
        fx.write("a.py", "print('a')\n");

        let mut sync = fx.sync().await;
        let first = sync.check_for_changes(&fx.walker, &fx.rules()).await.unwrap();
        assert!(first.has_changes());
        let second = sync.check_for_changes(&fx.walker, &fx.rules()).await.unwrap();
        assert!(!second.has_changes());
    }

    #[tokio::test]
    async fn diff_sets_are_disjoint_and_correct() {
        let fx = Fixture::new();
        fx.write("keep.py", "keep\n");
        fx.write("edit.py", "v1\n");
        fx.write("drop.py", "bye\n");

        let mut sync = fx.sync().await;
        sync.check_for_changes(&fx.walker, &fx.rules()).await.unwrap();
        sync.commit().await.unwrap();

        fx.write("edit.py", "v2\n");
        fx.write("new.py", "hi\n");
        std::fs::remove_file(fx.tree.path().join("drop.py")).unwrap();

        let changes = sync.check_for_changes(&fx.walker, &fx.rules()).await.unwrap();
        assert_eq!(changes.added, vec!["new.py"]);
        assert_eq!(changes.modified, vec!["edit.py"]);
        assert_eq!(changes.removed, vec!["drop.py"]);
        for a in &changes.added {
            assert!(!changes.removed.contains(a));
            assert!(!changes.modified.contains(a));
        }
        for r in &changes.removed {
            assert!(!changes.modified.contains(r));
        }
    }

    #[tokio::test]
    async fn commit_persists_across_reload() {
        let fx = Fixture::new();
        fx.write("a.py", "print('a')\n");

        let mut sync = fx.sync().await;
        sync.check_for_changes(&fx.walker, &fx.rules()).await.unwrap();
        sync.commit().await.unwrap();
        drop(sync);

        let mut reloaded = fx.sync().await;
        let changes = reloaded
            .check_for_changes(&fx.walker, &fx.rules())
            .await
            .unwrap();
        assert!(!changes.has_changes());
    }

    #[tokio::test]
    async fn uncommitted_state_is_redetected_after_reload() {
        let fx = Fixture::new();
        fx.write("a.py", "print('a')\n");

        let mut sync = fx.sync().await;
        sync.check_for_changes(&fx.walker, &fx.rules()).await.unwrap();
        // no commit: a crashed run must re-detect on the next initialize
        drop(sync);

        let mut reloaded = fx.sync().await;
        let changes = reloaded
            .check_for_changes(&fx.walker, &fx.rules())
            .await
            .unwrap();
        assert_eq!(changes.added, vec!["a.py"]);
    }

    #[tokio::test]
    async fn delete_snapshot_resets_state() {
        let fx = Fixture::new();
        fx.write("a.py", "print('a')\n");

        let mut sync = fx.sync().await;
        sync.check_for_changes(&fx.walker, &fx.rules()).await.unwrap();
        sync.commit().await.unwrap();

        Synchronizer::delete_snapshot(fx.data.path(), fx.tree.path())
            .await
            .unwrap();
        // deleting a missing snapshot is fine too
        Synchronizer::delete_snapshot(fx.data.path(), fx.tree.path())
            .await
            .unwrap();

        let mut reloaded = fx.sync().await;
        let changes = reloaded
            .check_for_changes(&fx.walker, &fx.rules())
            .await
            .unwrap();
        assert_eq!(changes.added, vec!["a.py"]);
    }
}
