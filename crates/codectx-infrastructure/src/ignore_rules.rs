//! Layered ignore-pattern resolution
//!
//! Merges built-in defaults, any `.*ignore` file at the codebase root (the
//! npm-packaging one excluded), a global per-user file, environment patterns
//! and caller-supplied patterns into one gitignore-semantics matcher.
//! Matching uses `/`-separated relative paths regardless of host.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};

/// Name of the optional global ignore file under the data directory
pub const GLOBAL_IGNORE_FILE: &str = "ignore";

/// Ignore file at the codebase root that is about npm packaging, not sources
const NPM_IGNORE_FILE: &str = ".npmignore";

/// Built-in exclusions applied to every codebase
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".git/",
    ".svn/",
    ".hg/",
    "node_modules/",
    "target/",
    "dist/",
    "build/",
    "out/",
    "vendor/",
    ".venv/",
    "venv/",
    "__pycache__/",
    ".pytest_cache/",
    ".mypy_cache/",
    ".idea/",
    ".vscode/",
    "coverage/",
    ".nyc_output/",
    ".cache/",
    "*.min.js",
    "*.min.css",
    "*.map",
    "*.pyc",
    "*.class",
    "*.o",
    "*.so",
    "*.dylib",
    "*.log",
    "*.tmp",
    "*.lock",
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    ".DS_Store",
];

/// Accumulated ignore patterns and their compiled matcher for one root
#[derive(Clone)]
pub struct IgnoreRules {
    root: PathBuf,
    patterns: Vec<String>,
    seen: HashSet<String>,
    matcher: Gitignore,
}

impl IgnoreRules {
    /// Load and merge the layered pattern sources for `root`.
    ///
    /// Order: defaults, project `.*ignore` files, the global user file under
    /// `data_dir`, then `extra` (environment + caller patterns, already in
    /// priority order). Duplicates keep their first occurrence. Missing
    /// sources contribute nothing; unreadable sources warn and contribute
    /// nothing.
    pub fn resolve(root: &Path, data_dir: &Path, extra: &[String]) -> Self {
        let mut rules = Self {
            root: root.to_path_buf(),
            patterns: Vec::new(),
            seen: HashSet::new(),
            matcher: Gitignore::empty(),
        };

        rules.push_patterns(DEFAULT_IGNORE_PATTERNS.iter().map(|p| p.to_string()));

        for file in project_ignore_files(root) {
            match std::fs::read_to_string(&file) {
                Ok(content) => rules.push_patterns(pattern_lines(&content)),
                Err(e) => {
                    tracing::warn!("Unreadable ignore file {}: {}", file.display(), e);
                }
            }
        }

        let global = data_dir.join(GLOBAL_IGNORE_FILE);
        if global.is_file() {
            match std::fs::read_to_string(&global) {
                Ok(content) => rules.push_patterns(pattern_lines(&content)),
                Err(e) => {
                    tracing::warn!("Unreadable global ignore file {}: {}", global.display(), e);
                }
            }
        }

        rules.push_patterns(extra.iter().cloned());
        rules.rebuild();
        rules
    }

    /// Append patterns, keeping the accumulated set (never replace)
    pub fn add(&mut self, patterns: &[String]) {
        self.push_patterns(patterns.iter().cloned());
        self.rebuild();
    }

    /// Whether `relative_path` (with `/` separators) is excluded.
    ///
    /// A matching failure on a specific input is never fatal; the path is
    /// treated as not ignored.
    pub fn ignores(&self, relative_path: &str, is_dir: bool) -> bool {
        self.matcher
            .matched_path_or_any_parents(relative_path, is_dir)
            .is_ignore()
    }

    /// The accumulated pattern list, in merge order
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    fn push_patterns<I: IntoIterator<Item = String>>(&mut self, patterns: I) {
        for pattern in patterns {
            if self.seen.insert(pattern.clone()) {
                self.patterns.push(pattern);
            }
        }
    }

    fn rebuild(&mut self) {
        let mut builder = GitignoreBuilder::new(&self.root);
        for pattern in &self.patterns {
            if let Err(e) = builder.add_line(None, pattern) {
                tracing::warn!("Skipping invalid ignore pattern '{}': {}", pattern, e);
            }
        }
        self.matcher = match builder.build() {
            Ok(matcher) => matcher,
            Err(e) => {
                tracing::warn!("Failed to compile ignore patterns: {}", e);
                Gitignore::empty()
            }
        };
    }
}

/// Every `.*ignore` file at the codebase root, except the npm-packaging one
fn project_ignore_files(root: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(root) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            let name = p
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            name.starts_with('.') && name.ends_with("ignore") && name != NPM_IGNORE_FILE
        })
        .collect();
    files.sort();
    files
}

/// Non-comment, non-blank pattern lines of an ignore file
fn pattern_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|l| l.trim_end().to_string())
        .filter(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rules_with(root: &Path, extra: &[&str]) -> IgnoreRules {
        let extra: Vec<String> = extra.iter().map(|s| s.to_string()).collect();
        IgnoreRules::resolve(root, &root.join(".nonexistent-data"), &extra)
    }

    #[test]
    fn defaults_exclude_common_directories() {
        let dir = TempDir::new().unwrap();
        let rules = rules_with(dir.path(), &[]);
        assert!(rules.ignores("node_modules", true));
        assert!(rules.ignores("node_modules/left-pad/index.js", false));
        assert!(rules.ignores("target", true));
        assert!(rules.ignores("app.min.js", false));
        assert!(!rules.ignores("src/main.rs", false));
    }

    #[test]
    fn project_gitignore_is_merged() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "generated/\n# note\n*.gen.ts\n").unwrap();
        let rules = rules_with(dir.path(), &[]);
        assert!(rules.ignores("generated/api.ts", false));
        assert!(rules.ignores("src/api.gen.ts", false));
        assert!(!rules.ignores("src/api.ts", false));
    }

    #[test]
    fn npmignore_is_not_a_source() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".npmignore"), "src/\n").unwrap();
        let rules = rules_with(dir.path(), &[]);
        assert!(!rules.ignores("src/index.js", false));
    }

    #[test]
    fn negation_is_honored() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "docs/*\n!docs/keep.md\n").unwrap();
        let rules = rules_with(dir.path(), &[]);
        assert!(rules.ignores("docs/drop.md", false));
        assert!(!rules.ignores("docs/keep.md", false));
    }

    #[test]
    fn add_preserves_earlier_patterns() {
        let dir = TempDir::new().unwrap();
        let mut rules = rules_with(dir.path(), &["custom_a/"]);
        rules.add(&["custom_b/".to_string(), "custom_a/".to_string()]);
        assert!(rules.ignores("custom_a/x.rs", false));
        assert!(rules.ignores("custom_b/x.rs", false));
        // first occurrence wins, no duplicate entries
        let count = rules.patterns().iter().filter(|p| *p == "custom_a/").count();
        assert_eq!(count, 1);
    }

    #[test]
    fn invalid_pattern_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let rules = rules_with(dir.path(), &["a[", "good/"]);
        assert!(rules.ignores("good/file.rs", false));
        assert!(!rules.ignores("anything.rs", false));
    }
}
