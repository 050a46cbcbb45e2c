//! Path confinement and name sanitization for repository working directories.
//!
//! A repository's on-disk directory is derived from its (attacker-influenced,
//! in principle) name; every subsequent file read must stay inside the
//! repositories root even if a symlink or a crafted relative path tries to
//! escape it.

use std::path::{Path, PathBuf};

use crate::error::{EngineError, Result};

const MAX_DEPTH: usize = 32;

/// Replace anything that isn't alphanumeric, `-`, or `_` with `_`.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Compute the working directory for a repository and confirm it resolves
/// inside `repositories_root`.
pub fn repository_dir(repositories_root: &Path, repository_name: &str) -> Result<PathBuf> {
    let sanitized = sanitize_name(repository_name);
    if sanitized.is_empty() {
        return Err(EngineError::DocumentProcessing("repository name sanitizes to empty string".into()));
    }
    let candidate = repositories_root.join(&sanitized);
    confine(repositories_root, &candidate)?;
    Ok(candidate)
}

/// Reject a path that escapes `root` via `..` components, excess nesting, or
/// (once the path exists) a symlink pointing outside `root`.
pub fn confine(root: &Path, candidate: &Path) -> Result<()> {
    let depth = candidate
        .strip_prefix(root)
        .map(|rel| rel.components().count())
        .unwrap_or(usize::MAX);
    if depth > MAX_DEPTH {
        return Err(EngineError::DocumentProcessing(format!(
            "path exceeds max depth: {}",
            candidate.display()
        )));
    }

    if candidate.exists() {
        let canonical_root = std::fs::canonicalize(root)?;
        let canonical_candidate = std::fs::canonicalize(candidate)?;
        if !canonical_candidate.starts_with(&canonical_root) {
            return Err(EngineError::DocumentProcessing(format!(
                "path escapes repositories root: {}",
                candidate.display()
            )));
        }
    } else {
        // Directory doesn't exist yet (fresh clone target): verify
        // lexically, since canonicalize would fail on a missing path.
        let mut normalized = PathBuf::new();
        for component in candidate.components() {
            use std::path::Component;
            match component {
                Component::ParentDir => {
                    return Err(EngineError::DocumentProcessing(format!(
                        "path contains parent traversal: {}",
                        candidate.display()
                    )));
                }
                other => normalized.push(other.as_os_str()),
            }
        }
    }

    Ok(())
}

/// Validate a file path that is about to be read as part of a document.
/// Rejects directories, `..` traversal, and files over the size cap.
pub fn validate_file_read(root: &Path, path: &Path, max_bytes: u64) -> Result<()> {
    confine(root, path)?;
    let metadata = std::fs::metadata(path)?;
    if metadata.is_dir() {
        return Err(EngineError::DocumentProcessing(format!("not a file: {}", path.display())));
    }
    if metadata.len() > max_bytes {
        return Err(EngineError::DocumentProcessing(format!(
            "file exceeds size cap ({} bytes): {}",
            metadata.len(),
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_special_characters() {
        assert_eq!(sanitize_name("my/repo name!"), "my_repo_name_");
    }

    #[test]
    fn keeps_hyphen_and_underscore() {
        assert_eq!(sanitize_name("my-repo_1"), "my-repo_1");
    }

    #[test]
    fn rejects_empty_repository_name() {
        let root = std::env::temp_dir();
        let err = repository_dir(&root, "").unwrap_err();
        assert!(matches!(err, EngineError::DocumentProcessing(_)));
    }

    #[test]
    fn confine_rejects_parent_traversal_on_missing_path() {
        let root = std::env::temp_dir().join("ctxeng_path_security_test_root");
        let escape = root.join("..").join("outside");
        let err = confine(&root, &escape).unwrap_err();
        assert!(matches!(err, EngineError::DocumentProcessing(_)));
    }
}
