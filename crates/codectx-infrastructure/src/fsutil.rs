//! Shared filesystem utilities
//!
//! Path normalization, the per-user data directory, millisecond clocks and
//! the atomic write-temp-then-rename primitive every persisted artifact uses.

use std::path::{Path, PathBuf};

use codectx_domain::error::{Error, Result};

/// Name of the per-user data directory under `$HOME`
const DATA_DIR_NAME: &str = ".codectx";

/// Resolve the per-user data directory, creating it if needed
pub fn data_dir() -> Result<PathBuf> {
    let dir = dirs::home_dir()
        .ok_or_else(|| Error::internal("Cannot determine home directory"))?
        .join(DATA_DIR_NAME);
    std::fs::create_dir_all(&dir)
        .map_err(|e| Error::io_with_source(format!("Failed to create {}", dir.display()), e))?;
    Ok(dir)
}

/// Current time as Unix milliseconds
pub fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Full MD5 digest of a canonical path string, hex encoded
pub fn path_digest(canonical: &str) -> String {
    format!("{:x}", md5::compute(canonical.as_bytes()))
}

/// Render a relative path with `/` separators regardless of host.
///
/// All ignore matching, snapshot keys and persisted relative paths use this
/// form; platform separators exist only at the filesystem boundary.
pub fn to_posix(path: &Path) -> String {
    let mut out = String::new();
    for component in path.components() {
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(&component.as_os_str().to_string_lossy());
    }
    out
}

/// Canonicalize a path and render it as a string
pub fn canonical_string(path: &Path) -> Result<String> {
    let canonical = path
        .canonicalize()
        .map_err(|e| Error::path(format!("Cannot canonicalize {}: {}", path.display(), e)))?;
    Ok(canonical.to_string_lossy().to_string())
}

/// Atomically replace `path` with `bytes` (write temp, then rename).
///
/// Concurrent writers race on the rename, which is last-writer-wins; callers
/// that need stronger exclusion hold a [`crate::locks::LockService`] lock.
pub async fn atomic_write(path: &Path, bytes: Vec<u8>) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::io(format!("No parent directory for {}", path.display())))?;
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| Error::io_with_source(format!("Failed to create {}", parent.display()), e))?;

    let file_name = path
        .file_name()
        .ok_or_else(|| Error::io(format!("No file name in {}", path.display())))?
        .to_string_lossy()
        .to_string();
    let tmp = parent.join(format!(".{}.{}.tmp", file_name, std::process::id()));

    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| Error::io_with_source(format!("Failed to write {}", tmp.display()), e))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(Error::io_with_source(
            format!("Failed to rename {} into place", tmp.display()),
            e,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn atomic_write_replaces_content() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("state.json");

        atomic_write(&target, b"first".to_vec()).await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"first");

        atomic_write(&target, b"second".to_vec()).await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"second");

        // No temp file left behind
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn posix_rendering() {
        let p = Path::new("src").join("nested").join("mod.rs");
        assert_eq!(to_posix(&p), "src/nested/mod.rs");
    }

    #[test]
    fn digest_is_stable() {
        assert_eq!(path_digest("/repo"), path_digest("/repo"));
        assert_ne!(path_digest("/repo"), path_digest("/repo2"));
        assert_eq!(path_digest("/repo").len(), 32);
    }
}
