use crate::error::StorageError;
use std::path::{Component, Path, PathBuf};

/// Collapse `.` / `..` lexically while ensuring the path never escapes the sandbox root.
///
/// A leading `/` is tolerated: internal paths handed over by a mount may carry one.
fn normalize_relative(path: &str) -> Result<PathBuf, StorageError> {
    let relative = Path::new(path.trim_start_matches('/'));
    let mut out = PathBuf::new();

    for c in relative.components() {
        match c {
            Component::CurDir => {},
            Component::Normal(seg) => out.push(seg),
            Component::ParentDir => {
                if !out.pop() {
                    return Err(StorageError::InvalidPath {
                        path: path.to_owned().into(),
                        context: Some("Path attempted to escape sandbox via '..'".into()),
                    });
                }
            },
            Component::RootDir | Component::Prefix(_) => {
                return Err(StorageError::InvalidPath {
                    path: path.to_owned().into(),
                    context: Some("Absolute paths are not allowed in sandbox".into()),
                });
            },
        }
    }

    Ok(out)
}

/// Safely joins an internal path to the root and ensures it doesn't escape the sandbox.
pub(crate) fn resolve_path(root: &Path, path: &str) -> Result<PathBuf, StorageError> {
    let safe_rel = normalize_relative(path)?;
    if safe_rel.as_os_str().is_empty() {
        return Ok(root.to_path_buf());
    }
    let joined = root.join(safe_rel);

    match joined.canonicalize() {
        Ok(canonical) => validate_canonical(root, canonical),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => validate_path(root, &joined),
        Err(e) => Err(StorageError::from_io(e, path)),
    }
}

fn validate_canonical(root: &Path, canonical: PathBuf) -> Result<PathBuf, StorageError> {
    if canonical.starts_with(root) {
        Ok(canonical)
    } else {
        Err(StorageError::InvalidPath {
            path: canonical.display().to_string().into(),
            context: Some("Path resolves outside the data directory".into()),
        })
    }
}

/// Validates a path that doesn't exist yet by verifying its first existing ancestor.
///
/// Canonicalizing that ancestor catches symlinks pointing outside the sandbox.
fn validate_path(root: &Path, joined: &Path) -> Result<PathBuf, StorageError> {
    if !joined.starts_with(root) {
        return Err(StorageError::InvalidPath {
            path: joined.display().to_string().into(),
            context: Some("Path is outside sandbox boundaries".into()),
        });
    }

    let mut current = joined.parent();

    while let Some(path) = current {
        if path == root {
            return Ok(joined.to_path_buf());
        }

        if path.exists() {
            return match path.canonicalize() {
                Ok(canonical) if canonical.starts_with(root) => Ok(joined.to_path_buf()),
                Ok(canonical) => Err(StorageError::InvalidPath {
                    path: canonical.display().to_string().into(),
                    context: Some("Existing parent directory is a symlink outside sandbox".into()),
                }),
                Err(e) => Err(StorageError::Io {
                    source: e,
                    context: Some("Failed to verify parent directory".into()),
                }),
            };
        }

        current = path.parent();
    }

    Err(StorageError::InvalidPath {
        path: joined.display().to_string().into(),
        context: Some("No valid parent directory found within sandbox".into()),
    })
}
