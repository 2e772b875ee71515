//! Cross-process advisory coordination
//!
//! A named lock and a counting semaphore backed by atomic file creation under
//! the shared lock directory. Lock files carry `{pid, start_time_ms,
//! hostname}`; a holder that crashed is reclaimed once its PID is dead or the
//! file exceeds the stale timeout. Only the owning PID may release.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use codectx_domain::constants::{LOCK_STALE_TIMEOUT_SECS, SEMAPHORE_STALE_TIMEOUT_SECS};
use codectx_domain::error::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::fsutil;

/// Directory under the data dir holding lock and semaphore files
const LOCK_DIR: &str = "locks";

/// Unparseable lock files younger than this are assumed mid-write, not stale
const CORRUPT_GRACE_SECS: u64 = 10;

/// Identity written into every lock and slot file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockOwner {
    /// Holder process id
    pub pid: u32,
    /// Unix milliseconds at acquisition
    pub start_time_ms: u64,
    /// Holder host name
    pub hostname: String,
}

impl LockOwner {
    fn current() -> Self {
        Self {
            pid: std::process::id(),
            start_time_ms: fsutil::now_ms(),
            hostname: hostname::get()
                .map(|h| h.to_string_lossy().to_string())
                .unwrap_or_else(|_| "unknown".to_string()),
        }
    }

    fn is_current_process(&self) -> bool {
        self.pid == std::process::id() && self.hostname == LockOwner::current().hostname
    }
}

/// Acquisition options
#[derive(Debug, Clone)]
pub struct LockOptions {
    /// Age after which a lock with an unverifiable owner is reclaimed
    pub stale_timeout: Duration,
    /// Extra acquisition attempts after the first (default: none)
    pub retries: u32,
    /// Sleep between attempts
    pub retry_delay: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            stale_timeout: Duration::from_secs(LOCK_STALE_TIMEOUT_SECS),
            retries: 0,
            retry_delay: Duration::from_millis(250),
        }
    }
}

impl LockOptions {
    /// Options with a custom stale timeout
    pub fn with_stale_timeout(stale_timeout: Duration) -> Self {
        Self {
            stale_timeout,
            ..Self::default()
        }
    }
}

/// Per-process lock service; owns nothing but gates mutation by name
pub struct LockService {
    dir: PathBuf,
    held: Mutex<HashSet<PathBuf>>,
}

impl LockService {
    /// Service writing under `data_dir/locks`
    pub fn new(data_dir: &Path) -> Result<Self> {
        let dir = data_dir.join(LOCK_DIR);
        std::fs::create_dir_all(&dir)
            .map_err(|e| Error::io_with_source(format!("Failed to create {}", dir.display()), e))?;
        Ok(Self {
            dir,
            held: Mutex::new(HashSet::new()),
        })
    }

    fn lock_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.lock", fsutil::path_digest(name)))
    }

    /// Try to acquire the named lock. Returns false when another live
    /// process holds it after the configured attempts.
    pub async fn try_acquire(&self, name: &str, options: &LockOptions) -> Result<bool> {
        let path = self.lock_path(name);
        for attempt in 0..=options.retries {
            if acquire_file(&path, options.stale_timeout)? {
                self.track(&path);
                tracing::debug!("Acquired lock '{}'", name);
                return Ok(true);
            }
            if attempt < options.retries {
                tokio::time::sleep(options.retry_delay).await;
            }
        }
        Ok(false)
    }

    /// Release the named lock; verified against the file's recorded owner
    pub async fn release(&self, name: &str) -> Result<()> {
        let path = self.lock_path(name);
        release_file(&path)?;
        self.untrack(&path);
        tracing::debug!("Released lock '{}'", name);
        Ok(())
    }

    /// Run `fut` while holding the named lock; fails fast when the lock is
    /// held elsewhere
    pub async fn with_lock<T, F>(&self, name: &str, options: &LockOptions, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        if !self.try_acquire(name, options).await? {
            return Err(Error::lock(format!(
                "'{name}' is locked by another process"
            )));
        }
        let result = fut.await;
        if let Err(e) = self.release(name).await {
            tracing::warn!("Failed to release lock '{}': {}", name, e);
        }
        result
    }

    /// Release every lock and slot held by this process. Called from the
    /// termination-signal handlers.
    pub fn release_all(&self) {
        let paths: Vec<PathBuf> = match self.held.lock() {
            Ok(mut held) => held.drain().collect(),
            Err(_) => return,
        };
        for path in paths {
            if let Err(e) = release_file(&path) {
                tracing::warn!("Shutdown release of {} failed: {}", path.display(), e);
            }
        }
    }

    /// Open a counting semaphore namespaced under this service
    pub fn semaphore(&self, name: &str, permits: usize) -> Result<SlotSemaphore> {
        let dir = self.dir.join(format!("{}.slots", fsutil::path_digest(name)));
        std::fs::create_dir_all(&dir)
            .map_err(|e| Error::io_with_source(format!("Failed to create {}", dir.display()), e))?;
        Ok(SlotSemaphore {
            dir,
            permits,
            stale_timeout: Duration::from_secs(SEMAPHORE_STALE_TIMEOUT_SECS),
        })
    }

    fn track(&self, path: &Path) {
        if let Ok(mut held) = self.held.lock() {
            held.insert(path.to_path_buf());
        }
    }

    fn untrack(&self, path: &Path) {
        if let Ok(mut held) = self.held.lock() {
            held.remove(path);
        }
    }
}

/// Counting semaphore of N filesystem slots
pub struct SlotSemaphore {
    dir: PathBuf,
    permits: usize,
    stale_timeout: Duration,
}

impl SlotSemaphore {
    /// Acquire the first free or stale slot; `None` when all are held
    pub fn try_acquire(&self) -> Result<Option<usize>> {
        for slot in 0..self.permits {
            let path = self.slot_path(slot);
            if acquire_file(&path, self.stale_timeout)? {
                tracing::debug!("Acquired semaphore slot {}", slot);
                return Ok(Some(slot));
            }
        }
        Ok(None)
    }

    /// Release a slot previously acquired by this process
    pub fn release(&self, slot: usize) -> Result<()> {
        release_file(&self.slot_path(slot))
    }

    fn slot_path(&self, slot: usize) -> PathBuf {
        self.dir.join(format!("slot-{slot}.lock"))
    }
}

/// Atomically create the lock file, reclaiming a stale holder once
fn acquire_file(path: &Path, stale_timeout: Duration) -> Result<bool> {
    for _ in 0..2 {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                let owner = LockOwner::current();
                let body = serde_json::to_vec(&owner)?;
                file.write_all(&body).map_err(|e| {
                    Error::io_with_source(format!("Failed to write {}", path.display()), e)
                })?;
                return Ok(true);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                if !is_stale(path, stale_timeout) {
                    return Ok(false);
                }
                tracing::warn!("Reclaiming stale lock {}", path.display());
                let _ = std::fs::remove_file(path);
                // loop once more to race for the freed slot
            }
            Err(e) => {
                return Err(Error::io_with_source(
                    format!("Failed to create lock {}", path.display()),
                    e,
                ));
            }
        }
    }
    Ok(false)
}

/// Remove the lock file iff this process is the recorded owner
fn release_file(path: &Path) -> Result<()> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(Error::io_with_source(
                format!("Failed to read lock {}", path.display()),
                e,
            ));
        }
    };
    let owner: LockOwner = serde_json::from_str(&content)
        .map_err(|e| Error::lock(format!("Corrupt lock file {}: {}", path.display(), e)))?;
    if !owner.is_current_process() {
        return Err(Error::lock(format!(
            "Lock {} is owned by pid {}, not this process",
            path.display(),
            owner.pid
        )));
    }
    std::fs::remove_file(path)
        .map_err(|e| Error::io_with_source(format!("Failed to remove {}", path.display()), e))?;
    Ok(())
}

/// A lock is stale when its owning PID is dead on this host or the file
/// exceeds the timeout
fn is_stale(path: &Path, stale_timeout: Duration) -> bool {
    let age = file_age(path);
    match std::fs::read_to_string(path)
        .ok()
        .and_then(|c| serde_json::from_str::<LockOwner>(&c).ok())
    {
        Some(owner) => {
            let same_host = hostname::get()
                .map(|h| h.to_string_lossy() == owner.hostname.as_str())
                .unwrap_or(false);
            if same_host && !pid_alive(owner.pid) {
                return true;
            }
            age.map(|a| a > stale_timeout).unwrap_or(false)
        }
        // Unreadable or mid-write: only age can decide
        None => age
            .map(|a| a > Duration::from_secs(CORRUPT_GRACE_SECS).max(stale_timeout))
            .unwrap_or(false),
    }
}

fn file_age(path: &Path) -> Option<Duration> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|m| std::time::SystemTime::now().duration_since(m).ok())
}

#[cfg(unix)]
fn pid_alive(pid: u32) -> bool {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    match kill(Pid::from_raw(pid as i32), None::<Signal>) {
        Ok(()) => true,
        Err(nix::errno::Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn pid_alive(_pid: u32) -> bool {
    // No cheap liveness probe; fall back to the age timeout
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn service(dir: &TempDir) -> LockService {
        LockService::new(dir.path()).unwrap()
    }

    /// PID of a process that has already exited
    fn dead_pid() -> u32 {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();
        pid
    }

    #[tokio::test]
    async fn acquire_release_roundtrip() {
        let dir = TempDir::new().unwrap();
        let locks = service(&dir);
        let opts = LockOptions::default();

        assert!(locks.try_acquire("repo", &opts).await.unwrap());
        // second acquisition by the same path name fails while held
        assert!(!locks.try_acquire("repo", &opts).await.unwrap());
        locks.release("repo").await.unwrap();
        assert!(locks.try_acquire("repo", &opts).await.unwrap());
        locks.release("repo").await.unwrap();
    }

    #[tokio::test]
    async fn stale_dead_owner_is_reclaimed() {
        let dir = TempDir::new().unwrap();
        let locks = service(&dir);
        let path = locks.lock_path("repo");

        let stale = LockOwner {
            pid: dead_pid(),
            start_time_ms: 0,
            hostname: LockOwner::current().hostname,
        };
        std::fs::write(&path, serde_json::to_vec(&stale).unwrap()).unwrap();

        assert!(locks
            .try_acquire("repo", &LockOptions::default())
            .await
            .unwrap());
        let owner: LockOwner =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(owner.pid, std::process::id());
    }

    #[tokio::test]
    async fn live_foreign_owner_is_respected() {
        let dir = TempDir::new().unwrap();
        let locks = service(&dir);
        let path = locks.lock_path("repo");

        // PID 1 is always alive; fresh file, so not stale
        let foreign = LockOwner {
            pid: 1,
            start_time_ms: fsutil::now_ms(),
            hostname: LockOwner::current().hostname,
        };
        std::fs::write(&path, serde_json::to_vec(&foreign).unwrap()).unwrap();

        assert!(!locks
            .try_acquire("repo", &LockOptions::default())
            .await
            .unwrap());
        assert!(locks.release("repo").await.is_err());
    }

    #[tokio::test]
    async fn with_lock_releases_on_completion_and_on_error() {
        let dir = TempDir::new().unwrap();
        let locks = service(&dir);
        let opts = LockOptions::default();

        let out: i32 = locks
            .with_lock("repo", &opts, async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(out, 7);

        let err = locks
            .with_lock::<(), _>("repo", &opts, async { Err(Error::internal("boom")) })
            .await;
        assert!(err.is_err());

        // lock is free again after both
        assert!(locks.try_acquire("repo", &opts).await.unwrap());
    }

    #[tokio::test]
    async fn semaphore_caps_holders() {
        let dir = TempDir::new().unwrap();
        let locks = service(&dir);
        let sem = locks.semaphore("embed", 2).unwrap();

        let a = sem.try_acquire().unwrap().unwrap();
        let b = sem.try_acquire().unwrap().unwrap();
        assert_ne!(a, b);
        assert!(sem.try_acquire().unwrap().is_none());

        sem.release(a).unwrap();
        let c = sem.try_acquire().unwrap().unwrap();
        assert_eq!(c, a);
    }

    #[tokio::test]
    async fn release_all_frees_held_locks() {
        let dir = TempDir::new().unwrap();
        let locks = service(&dir);
        let opts = LockOptions::default();
        assert!(locks.try_acquire("one", &opts).await.unwrap());
        assert!(locks.try_acquire("two", &opts).await.unwrap());

        locks.release_all();
        assert!(locks.try_acquire("one", &opts).await.unwrap());
        assert!(locks.try_acquire("two", &opts).await.unwrap());
    }
}
