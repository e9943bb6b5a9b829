//! The capability contract every storage backend implements.

use crate::cache::Cache;
use crate::error::StorageError;
use crate::path::{basename, join, parent};
use crate::types::{Digest, FileHandle, FileType, FreeSpace, HashAlgorithm, LocalPath, OpenMode, Stat};
use async_trait::async_trait;
use fhub_domain::Permissions;
use fhub_domain::constants::{DEFAULT_MIME, DIRECTORY_MIME};
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::io::AsyncWriteExt;

/// A storage backend addressed by internal paths (relative, `/`-separated, `""` is the root).
///
/// Backends implement the primitives; the metadata queries, permission predicates and
/// integrity helpers have default implementations on top of them. Every call performs blocking
/// I/O through tokio's blocking pool, never inline on the executor.
///
/// Metadata queries report a missing path as `Ok(None)` / `Ok(false)`. Operations that need
/// the path fail with [`StorageError::NotFound`].
///
/// `rename` and `copy` work within one storage only; moving between storages is the caller's
/// job.
#[async_trait]
pub trait Storage: fmt::Debug + Send + Sync {
    /// Deterministic identity, stable across remounts of the same configuration.
    fn id(&self) -> &str;

    /// Account owning `path`, or `None` when the backend has no user concept.
    async fn owner(&self, path: &str) -> Result<Option<String>, StorageError>;

    fn cache(&self) -> Arc<Cache>;

    /// The storage this one decorates, if it is a wrapper.
    fn wrapped(&self) -> Option<&Arc<dyn Storage>> {
        None
    }

    /// Name of the wrapper layer, if this storage is a wrapper.
    fn layer(&self) -> Option<&str> {
        None
    }

    async fn stat(&self, path: &str) -> Result<Option<Stat>, StorageError>;

    /// Child names of a directory, sorted.
    async fn opendir(&self, path: &str) -> Result<Vec<String>, StorageError>;

    async fn mkdir(&self, path: &str) -> Result<(), StorageError>;

    /// Removes a directory and everything in it.
    async fn rmdir(&self, path: &str) -> Result<(), StorageError>;

    /// Removes a file; directories are handed to [`Storage::rmdir`].
    async fn unlink(&self, path: &str) -> Result<(), StorageError>;

    async fn rename(&self, source: &str, target: &str) -> Result<(), StorageError>;

    /// Copies a file, or a directory recursively.
    async fn copy(&self, source: &str, target: &str) -> Result<(), StorageError>;

    async fn file_get_contents(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Replaces the content of `path` atomically and returns the number of bytes written.
    async fn file_put_contents(&self, path: &str, data: &[u8]) -> Result<u64, StorageError>;

    async fn fopen(&self, path: &str, mode: OpenMode) -> Result<FileHandle, StorageError>;

    /// Sets the modification time (now when `None`), creating an empty file if needed.
    async fn touch(&self, path: &str, mtime: Option<SystemTime>) -> Result<(), StorageError>;

    async fn free_space(&self, path: &str) -> Result<FreeSpace, StorageError>;

    async fn is_readable(&self, path: &str) -> Result<bool, StorageError>;

    async fn is_updatable(&self, path: &str) -> Result<bool, StorageError>;

    async fn is_dir(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.stat(path).await?.is_some_and(|s| s.is_dir()))
    }

    async fn is_file(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.stat(path).await?.is_some_and(|s| s.is_file()))
    }

    async fn file_exists(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.stat(path).await?.is_some())
    }

    async fn filetype(&self, path: &str) -> Result<Option<FileType>, StorageError> {
        Ok(self.stat(path).await?.map(|s| s.kind))
    }

    async fn filesize(&self, path: &str) -> Result<Option<u64>, StorageError> {
        Ok(self.stat(path).await?.map(|s| s.size))
    }

    async fn filemtime(&self, path: &str) -> Result<Option<SystemTime>, StorageError> {
        Ok(self.stat(path).await?.map(|s| s.mtime))
    }

    /// Mime type guessed from the file name; directories report `httpd/unix-directory`.
    async fn mime_type(&self, path: &str) -> Result<Option<String>, StorageError> {
        Ok(self.stat(path).await?.map(|stat| mime_for(path, stat.kind)))
    }

    /// Folders are creatable-in when they are updatable.
    async fn is_creatable(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.is_dir(path).await? && self.is_updatable(path).await?)
    }

    /// Deleting needs write access to the parent; the root checks itself.
    async fn is_deletable(&self, path: &str) -> Result<bool, StorageError> {
        if !self.file_exists(path).await? {
            return Ok(false);
        }
        if path.trim_matches('/').is_empty() {
            return self.is_updatable(path).await;
        }
        self.is_updatable(parent(path.trim_matches('/'))).await
    }

    async fn is_sharable(&self, path: &str) -> Result<bool, StorageError> {
        self.is_readable(path).await
    }

    async fn permissions(&self, path: &str) -> Result<Permissions, StorageError> {
        let mut permissions = Permissions::empty();
        permissions.set(Permissions::READ, self.is_readable(path).await?);
        permissions.set(Permissions::UPDATE, self.is_updatable(path).await?);
        permissions.set(Permissions::CREATE, self.is_creatable(path).await?);
        permissions.set(Permissions::DELETE, self.is_deletable(path).await?);
        permissions.set(Permissions::SHARE, self.is_sharable(path).await?);
        Ok(permissions)
    }

    /// Digest of a file's content; `None` for missing paths and directories.
    async fn hash(
        &self,
        algorithm: HashAlgorithm,
        path: &str,
    ) -> Result<Option<Digest>, StorageError> {
        if !self.is_file(path).await? {
            return Ok(None);
        }
        let data = self.file_get_contents(path).await?;
        Ok(Some(algorithm.digest(&data)))
    }

    /// Internal paths whose name contains `query`, case-insensitively, sorted.
    async fn search(&self, query: &str) -> Result<Vec<String>, StorageError> {
        let needle = query.to_lowercase();
        let mut found = Vec::new();
        let mut pending = vec![String::new()];
        while let Some(dir) = pending.pop() {
            for name in self.opendir(&dir).await? {
                let child = join(&dir, &name);
                if name.to_lowercase().contains(&needle) {
                    found.push(child.clone());
                }
                if self.is_dir(&child).await? {
                    pending.push(child);
                }
            }
        }
        found.sort();
        Ok(found)
    }

    /// Whether anything at or below `path` changed since `time`.
    ///
    /// True when the path is missing, or when the path or any directory below it carries a
    /// newer mtime. Adding, removing or renaming an entry touches its directory, so those are
    /// never missed; false positives are allowed.
    async fn has_updated(&self, path: &str, time: SystemTime) -> Result<bool, StorageError> {
        let Some(stat) = self.stat(path).await? else {
            return Ok(true);
        };
        if stat.mtime > time {
            return Ok(true);
        }
        if !stat.is_dir() {
            return Ok(false);
        }

        let mut pending = vec![path.trim_matches('/').to_owned()];
        while let Some(dir) = pending.pop() {
            for name in self.opendir(&dir).await? {
                let child = join(&dir, &name);
                match self.stat(&child).await? {
                    Some(stat) if stat.is_dir() => {
                        if stat.mtime > time {
                            return Ok(true);
                        }
                        pending.push(child);
                    },
                    Some(_) => {},
                    None => return Ok(true),
                }
            }
        }
        Ok(false)
    }

    /// Materializes the file into a temporary local copy.
    async fn get_local_file(&self, path: &str) -> Result<LocalPath, StorageError> {
        let data = self.file_get_contents(path).await?;
        let suffix = basename(path).rsplit_once('.').map(|(_, ext)| format!(".{ext}"));
        let temp = blocking(move || {
            let mut builder = tempfile::Builder::new();
            if let Some(suffix) = &suffix {
                builder.suffix(suffix);
            }
            builder.tempfile().map(tempfile::NamedTempFile::into_temp_path)
        })
        .await?
        .map_err(|e| StorageError::Io {
            source: e,
            context: Some("Failed to create temporary file".into()),
        })?;

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&*temp)
            .await
            .map_err(|e| StorageError::from_io(e, path))?;
        file.write_all(&data).await.map_err(|e| StorageError::from_io(e, path))?;
        file.sync_all().await.map_err(|e| StorageError::from_io(e, path))?;

        Ok(LocalPath::TempFile(temp))
    }

    /// Materializes the directory tree into a temporary local folder.
    async fn get_local_folder(&self, path: &str) -> Result<LocalPath, StorageError> {
        if !self.is_dir(path).await? {
            return Err(StorageError::not_found(path.to_owned()));
        }
        let temp = blocking(tempfile::tempdir).await?.map_err(|e| StorageError::Io {
            source: e,
            context: Some("Failed to create temporary folder".into()),
        })?;

        let base = path.trim_matches('/').to_owned();
        let mut pending = vec![base.clone()];
        while let Some(dir) = pending.pop() {
            for name in self.opendir(&dir).await? {
                let child = join(&dir, &name);
                let local = temp.path().join(child[base.len()..].trim_start_matches('/'));
                if self.is_dir(&child).await? {
                    tokio::fs::create_dir_all(&local)
                        .await
                        .map_err(|e| StorageError::from_io(e, &child))?;
                    pending.push(child);
                } else {
                    let data = self.file_get_contents(&child).await?;
                    tokio::fs::write(&local, data)
                        .await
                        .map_err(|e| StorageError::from_io(e, &child))?;
                }
            }
        }

        Ok(LocalPath::TempDir(temp))
    }
}

/// Runs blocking work on tokio's blocking pool.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, StorageError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StorageError::from(format!("Blocking task failed: {e}")))
}

pub(crate) fn mime_for(path: &str, kind: FileType) -> String {
    match kind {
        FileType::Dir => DIRECTORY_MIME.to_owned(),
        FileType::File => mime_guess::from_path(basename(path))
            .first_raw()
            .unwrap_or(DEFAULT_MIME)
            .to_owned(),
    }
}
