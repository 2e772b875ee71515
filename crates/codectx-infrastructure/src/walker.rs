//! Supported-file discovery under an ignore set
//!
//! Recursively enumerates regular files whose extension is supported and
//! whose relative path is not excluded. Ignored directories are pruned, not
//! descended. Symlinks are followed only while the target stays inside the
//! root, which also prevents cycles from escaping the tree.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use codectx_domain::error::{Error, Result};
use walkdir::WalkDir;

use crate::fsutil;
use crate::ignore_rules::IgnoreRules;

/// Default supported extensions: mainstream source languages plus Markdown
/// and notebooks
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "jsx", "mjs", "ts", "tsx", "go", "java", "c", "h", "cpp", "cc", "cxx",
    "hpp", "cs", "php", "rb", "swift", "kt", "kts", "scala", "sh", "sql", "html", "md",
    "markdown", "ipynb",
];

/// Recursive walker producing the indexable files of a root
#[derive(Clone)]
pub struct FileWalker {
    extensions: HashSet<String>,
}

impl FileWalker {
    /// Walker with the default extension set plus `extra` extensions
    pub fn new(extra: &[String]) -> Self {
        let mut extensions: HashSet<String> =
            DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect();
        for ext in extra {
            extensions.insert(ext.trim_start_matches('.').to_lowercase());
        }
        Self { extensions }
    }

    /// Walker accepting exactly `extensions`, replacing the defaults
    pub fn with_extensions(extensions: &[String]) -> Self {
        Self {
            extensions: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    /// Whether a file extension is in the supported set
    pub fn supports_extension(&self, ext: &str) -> bool {
        self.extensions.contains(&ext.to_lowercase())
    }

    /// Enumerate supported files under `root`, honoring `rules`.
    ///
    /// Output is sorted by path so identical trees produce identical
    /// sequences.
    pub fn walk(&self, root: &Path, rules: &IgnoreRules) -> Result<Vec<PathBuf>> {
        let root = root
            .canonicalize()
            .map_err(|e| Error::path(format!("Cannot canonicalize {}: {}", root.display(), e)))?;
        if !root.is_dir() {
            return Err(Error::path(format!("{} is not a directory", root.display())));
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(&root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| keep_entry(entry, &root, rules));

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Error walking directory: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let ext = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("");
            if !self.supports_extension(ext) {
                continue;
            }
            files.push(entry.path().to_path_buf());
        }

        files.sort();
        Ok(files)
    }
}

/// Directory/file predicate: prunes ignored paths and out-of-root symlinks
fn keep_entry(entry: &walkdir::DirEntry, root: &Path, rules: &IgnoreRules) -> bool {
    if entry.depth() == 0 {
        return true;
    }
    let Ok(relative) = entry.path().strip_prefix(root) else {
        return false;
    };
    let relative = fsutil::to_posix(relative);
    if rules.ignores(&relative, entry.file_type().is_dir()) {
        return false;
    }
    if entry.path_is_symlink() {
        // Follow only when the target resolves back inside the root
        return match entry.path().canonicalize() {
            Ok(target) => target.starts_with(root),
            Err(_) => false,
        };
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "content\n").unwrap();
    }

    fn walk_relative(dir: &TempDir, walker: &FileWalker) -> Vec<String> {
        let rules = IgnoreRules::resolve(dir.path(), &dir.path().join(".no-data"), &[]);
        let root = dir.path().canonicalize().unwrap();
        walker
            .walk(dir.path(), &rules)
            .unwrap()
            .into_iter()
            .map(|p| fsutil::to_posix(p.strip_prefix(&root).unwrap()))
            .collect()
    }

    #[test]
    fn finds_supported_files_and_skips_unknown_extensions() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("src/main.rs"));
        touch(&dir.path().join("src/util.py"));
        touch(&dir.path().join("notes.md"));
        touch(&dir.path().join("binary.bin"));

        let walker = FileWalker::new(&[]);
        let files = walk_relative(&dir, &walker);
        assert_eq!(files, vec!["notes.md", "src/main.rs", "src/util.py"]);
    }

    #[test]
    fn prunes_ignored_directories() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("node_modules/pkg/index.js"));
        touch(&dir.path().join("src/app.js"));

        let walker = FileWalker::new(&[]);
        let files = walk_relative(&dir, &walker);
        assert_eq!(files, vec!["src/app.js"]);
    }

    #[test]
    fn custom_extensions_extend_the_default_set() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("build.zig"));
        touch(&dir.path().join("main.rs"));

        let walker = FileWalker::new(&["zig".to_string()]);
        let files = walk_relative(&dir, &walker);
        assert_eq!(files, vec!["build.zig", "main.rs"]);
    }

    #[test]
    fn output_is_stable_across_runs() {
        let dir = TempDir::new().unwrap();
        for name in ["b.rs", "a.rs", "c/d.rs", "c/a.rs"] {
            touch(&dir.path().join(name));
        }
        let walker = FileWalker::new(&[]);
        let first = walk_relative(&dir, &walker);
        let second = walk_relative(&dir, &walker);
        assert_eq!(first, second);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escaping_root_is_not_followed() {
        let outside = TempDir::new().unwrap();
        touch(&outside.path().join("secret.rs"));

        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("main.rs"));
        std::os::unix::fs::symlink(outside.path(), dir.path().join("escape")).unwrap();

        let walker = FileWalker::new(&[]);
        let files = walk_relative(&dir, &walker);
        assert_eq!(files, vec!["main.rs"]);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_inside_root_is_followed() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("real/lib.rs"));
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("alias")).unwrap();

        let walker = FileWalker::new(&[]);
        let files = walk_relative(&dir, &walker);
        assert!(files.contains(&"real/lib.rs".to_string()));
        assert!(files.contains(&"alias/lib.rs".to_string()));
    }
}
