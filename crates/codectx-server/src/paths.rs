//! Tolerant input-path resolution
//!
//! Public operations take absolute canonical paths. Callers get a little
//! slack: `~` is expanded and relative inputs are tried against the current
//! working directory, but the canonicalized path is what gets stored and
//! reported.

use std::path::{Path, PathBuf};

use codectx_domain::error::{Error, Result};

/// Resolve caller input into an absolute canonical path
pub fn resolve(input: &str) -> Result<PathBuf> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::path("Empty path"));
    }

    let expanded = expand_tilde(input);
    let candidate = if expanded.is_absolute() {
        expanded
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(&expanded),
            Err(_) => return Err(Error::path(format!("'{input}' is not an absolute path"))),
        }
    };

    candidate
        .canonicalize()
        .map_err(|e| Error::path(format!("Cannot resolve '{input}': {e}")))
}

fn expand_tilde(input: &str) -> PathBuf {
    if let Some(rest) = input.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if input == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    Path::new(input).to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn absolute_paths_canonicalize() {
        let dir = TempDir::new().unwrap();
        let resolved = resolve(&dir.path().to_string_lossy()).unwrap();
        assert_eq!(resolved, dir.path().canonicalize().unwrap());
    }

    #[test]
    fn missing_paths_are_path_errors() {
        let err = resolve("/definitely/not/a/real/path/anywhere");
        assert!(matches!(err, Err(Error::Path { .. })));
        assert!(matches!(resolve("  "), Err(Error::Path { .. })));
    }

    #[test]
    fn tilde_expands_to_home() {
        if dirs::home_dir().is_some() {
            let resolved = resolve("~");
            assert!(resolved.is_ok());
        }
    }
}
