//! Path helpers

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Errors related to path validation
#[derive(Error, Debug)]
pub enum PathError {
    #[error("Empty asset name")]
    Empty,

    #[error("Path traversal attempt detected: {0}")]
    TraversalAttempt(String),

    #[error("Path escapes root directory: {0}")]
    EscapesRoot(String),

    #[error("Invalid path component: {0}")]
    InvalidComponent(String),
}

/// Resolve a bundled asset name under `assets_dir`.
///
/// Names may contain subdirectories but must stay inside the assets
/// directory: absolute paths and `..` escapes are rejected.
///
/// # Errors
/// Returns an error if the name is empty or would escape the directory
pub fn resolve_asset(assets_dir: &Path, name: &str) -> Result<PathBuf, PathError> {
    if name.trim().is_empty() {
        return Err(PathError::Empty);
    }
    if name.contains('\0') {
        return Err(PathError::InvalidComponent("Null byte in name".to_string()));
    }

    let relative = normalize_relative(Path::new(name))?;
    if relative.as_os_str().is_empty() {
        return Err(PathError::Empty);
    }

    let joined = assets_dir.join(&relative);
    verify_under_root(assets_dir, &joined)?;
    Ok(joined)
}

/// Drop `.` components and resolve `..` without leaving the root
fn normalize_relative(path: &Path) -> Result<PathBuf, PathError> {
    let mut normalized = PathBuf::new();
    let mut depth: usize = 0;

    for component in path.components() {
        match component {
            Component::Normal(c) => {
                normalized.push(c);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return Err(PathError::TraversalAttempt(path.display().to_string()));
                }
                normalized.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(PathError::InvalidComponent(
                    "Absolute path not allowed".to_string(),
                ));
            }
        }
    }

    Ok(normalized)
}

/// Verify that `path` is under `root`, following symlinks when both exist
fn verify_under_root(root: &Path, path: &Path) -> Result<(), PathError> {
    if root.exists() && path.exists() {
        let canonical_root = root
            .canonicalize()
            .map_err(|_| PathError::EscapesRoot(path.display().to_string()))?;
        let canonical_path = path
            .canonicalize()
            .map_err(|_| PathError::EscapesRoot(path.display().to_string()))?;

        if !canonical_path.starts_with(&canonical_root) {
            return Err(PathError::EscapesRoot(path.display().to_string()));
        }
    } else if !path.starts_with(root) {
        return Err(PathError::EscapesRoot(path.display().to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_plain_name() {
        let root = PathBuf::from("/srv/assets");
        let result = resolve_asset(&root, "live_seed.sqlite").unwrap();
        assert_eq!(result, PathBuf::from("/srv/assets/live_seed.sqlite"));
    }

    #[test]
    fn test_resolve_nested_name() {
        let root = PathBuf::from("/srv/assets");
        let result = resolve_asset(&root, "seeds/./2024/live.sqlite").unwrap();
        assert_eq!(result, PathBuf::from("/srv/assets/seeds/2024/live.sqlite"));
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let root = PathBuf::from("/srv/assets");
        assert!(matches!(
            resolve_asset(&root, "../live.db"),
            Err(PathError::TraversalAttempt(_))
        ));
        assert!(resolve_asset(&root, "seeds/../../etc/passwd").is_err());
    }

    #[test]
    fn test_resolve_rejects_absolute_and_empty() {
        let root = PathBuf::from("/srv/assets");
        assert!(resolve_asset(&root, "/etc/passwd").is_err());
        assert!(matches!(resolve_asset(&root, ""), Err(PathError::Empty)));
        assert!(matches!(resolve_asset(&root, "."), Err(PathError::Empty)));
    }
}
