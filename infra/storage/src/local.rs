//! Local-disk backend sandboxed to one data directory.

use crate::cache::{Cache, CacheStore};
use crate::error::{StorageError, StorageErrorExt};
use crate::maintenance::{self, is_part_file};
use crate::path::{basename, normalize};
use crate::security;
use crate::storage::{Storage, blocking};
use crate::types::{FileHandle, FileType, FreeSpace, LocalPath, OpenMode, Stat};
use async_trait::async_trait;
use fhub_domain::Arguments;
use fhub_domain::constants::{LOCAL, STORAGE_ID_SEPARATOR};
use private::Sealed;
use std::io::ErrorKind;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// The internal shared state of a [`LocalStorage`] instance.
#[derive(Debug)]
pub struct LocalInner {
    id: String,
    /// The canonicalized data directory; every resolved path stays below it.
    pub(crate) root: PathBuf,
    cache: Arc<Cache>,
}

/// Storage backed by a directory on the local disk.
///
/// Its id is `local::<datadir>` with the data directory as configured, minus trailing slashes,
/// so two instances over the same configuration share their cached metadata. All paths are
/// resolved inside the data directory; escaping it via `..` or symlinks fails with
/// [`StorageError::InvalidPath`].
///
/// ```rust
/// use fhub_storage::{LocalStorage, Storage, StorageError};
///
/// #[tokio::main]
/// async fn main() -> Result<(), StorageError> {
///     # let tmp = tempfile::tempdir().unwrap();
///     # let datadir = tmp.path().join("data");
///     let storage = LocalStorage::builder().datadir(&datadir).create(true).connect().await?;
///
///     storage.file_put_contents("hello.txt", b"hi").await?;
///     assert_eq!(storage.file_get_contents("hello.txt").await?, b"hi");
///     assert!(storage.id().starts_with("local::"));
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct LocalStorage {
    inner: Arc<LocalInner>,
}

impl Deref for LocalStorage {
    type Target = LocalInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl LocalStorage {
    #[must_use = "The storage is not connected until you call .connect()"]
    pub fn builder() -> LocalStorageBuilder {
        LocalStorageBuilder::new()
    }

    /// Builds a storage from a configuration bag: `datadir` (required) and `create`.
    ///
    /// # Errors
    /// [`StorageError::Configuration`] without a `datadir`; see [`LocalStorageBuilder::connect`].
    pub async fn from_arguments(
        arguments: &Arguments,
        caches: CacheStore,
    ) -> Result<Self, StorageError> {
        let datadir = arguments
            .text("datadir")
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| StorageError::configuration("Missing 'datadir' argument"))
            .context(LOCAL)?;
        let create = arguments.bool("create").unwrap_or(false);

        Self::builder().datadir(datadir).create(create).caches(caches).connect().await
    }

    /// The canonical data directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves an internal path to a physical path inside the data directory.
    ///
    /// Symlinks are followed on the blocking pool.
    ///
    /// # Errors
    /// [`StorageError::InvalidPath`] if the path escapes the data directory.
    pub async fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let (root, path) = (self.root.clone(), path.to_owned());
        blocking(move || security::resolve_path(&root, &path)).await?
    }

    /// Like [`LocalStorage::resolve`], for a path about to be created or written.
    ///
    /// Names shaped like generated part files are reserved.
    async fn resolve_target(&self, path: &str) -> Result<PathBuf, StorageError> {
        if is_part_file(basename(&normalize(path))) {
            return Err(StorageError::InvalidPath {
                path: path.to_owned().into(),
                context: Some("Name is reserved for part files".into()),
            });
        }
        self.resolve(path).await
    }

    async fn sync_dir(path: &Path) {
        match fs::File::open(path).await {
            Ok(dir) => {
                if let Err(err) = dir.sync_all().await {
                    warn!(path = %path.display(), error = %err, "Directory sync failed");
                }
            },
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Directory open failed");
            },
        }
    }

    async fn write_atomic(&self, path: &str, data: &[u8]) -> Result<(), StorageError> {
        let resolved = self.resolve_target(path).await?;
        let part = maintenance::part_path(&resolved);

        let written = async {
            let mut file = fs::OpenOptions::new()
                .create_new(true)
                .write(true)
                .open(&part)
                .await
                .map_err(|e| StorageError::from_io(e, path))?;
            file.write_all(data).await.context("Write failed")?;
            file.sync_all().await.context("Hardware sync failed")?;
            fs::rename(&part, &resolved).await.context(format!(
                "Atomic swap failed: {} -> {}",
                part.display(),
                resolved.display()
            ))
        }
        .await;

        if let Err(err) = written {
            if let Err(cleanup) = fs::remove_file(&part).await
                && cleanup.kind() != ErrorKind::NotFound
            {
                warn!(path = %part.display(), error = %cleanup, "Failed to remove part file");
            }
            return Err(err);
        }

        if let Some(parent) = resolved.parent() {
            Self::sync_dir(parent).await;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    fn id(&self) -> &str {
        &self.id
    }

    async fn owner(&self, _path: &str) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    fn cache(&self) -> Arc<Cache> {
        Arc::clone(&self.cache)
    }

    async fn stat(&self, path: &str) -> Result<Option<Stat>, StorageError> {
        let resolved = self.resolve(path).await?;
        match fs::metadata(&resolved).await {
            Ok(meta) => Ok(Some(stat_from(&meta))),
            Err(err) if matches!(err.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                Ok(None)
            },
            Err(err) => Err(StorageError::from_io(err, path)),
        }
    }

    async fn opendir(&self, path: &str) -> Result<Vec<String>, StorageError> {
        let resolved = self.resolve(path).await?;
        let mut dir = fs::read_dir(&resolved).await.map_err(|e| StorageError::from_io(e, path))?;

        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(|e| StorageError::from_io(e, path))?
        {
            match entry.file_name().into_string() {
                Ok(name) if !is_part_file(&name) => names.push(name),
                Ok(_) => {},
                Err(name) => warn!(?name, "Skipping entry with a non UTF-8 name"),
            }
        }
        names.sort();
        Ok(names)
    }

    async fn mkdir(&self, path: &str) -> Result<(), StorageError> {
        let resolved = self.resolve_target(path).await?;
        fs::create_dir(&resolved).await.map_err(|e| StorageError::from_io(e, path))?;
        debug!(storage = %self.id, path, "Directory created");
        Ok(())
    }

    async fn rmdir(&self, path: &str) -> Result<(), StorageError> {
        if normalize(path).is_empty() {
            return Err(StorageError::InvalidPath {
                path: self.id.clone().into(),
                context: Some("Refusing to remove the data directory".into()),
            });
        }
        if !self.is_dir(path).await? {
            return Err(StorageError::NotFound {
                path: path.to_owned().into(),
                context: Some("Not a directory".into()),
            });
        }
        let resolved = self.resolve(path).await?;
        fs::remove_dir_all(&resolved).await.map_err(|e| StorageError::from_io(e, path))?;
        debug!(storage = %self.id, path, "Directory removed");
        Ok(())
    }

    async fn unlink(&self, path: &str) -> Result<(), StorageError> {
        match self.stat(path).await? {
            None => Err(StorageError::not_found(path.to_owned())),
            Some(stat) if stat.is_dir() => self.rmdir(path).await,
            Some(_) => {
                let resolved = self.resolve(path).await?;
                fs::remove_file(&resolved).await.map_err(|e| StorageError::from_io(e, path))?;
                debug!(storage = %self.id, path, "File deleted");
                Ok(())
            },
        }
    }

    async fn rename(&self, source: &str, target: &str) -> Result<(), StorageError> {
        let (from, to) = (self.resolve(source).await?, self.resolve_target(target).await?);
        if from == to {
            return Ok(());
        }
        if normalize(source).is_empty() || to.starts_with(&from) {
            return Err(StorageError::InvalidPath {
                path: target.to_owned().into(),
                context: Some("Cannot move a folder into itself".into()),
            });
        }
        if self.stat(source).await?.is_none() {
            return Err(StorageError::not_found(source.to_owned()));
        }
        if self.stat(target).await?.is_some_and(|s| s.is_dir()) {
            fs::remove_dir_all(&to).await.map_err(|e| StorageError::from_io(e, target))?;
        }

        fs::rename(&from, &to).await.map_err(|e| StorageError::from_io(e, target))?;
        debug!(storage = %self.id, source, target, "Renamed");
        Ok(())
    }

    async fn copy(&self, source: &str, target: &str) -> Result<(), StorageError> {
        let (from, to) = (self.resolve(source).await?, self.resolve_target(target).await?);
        let Some(stat) = self.stat(source).await? else {
            return Err(StorageError::not_found(source.to_owned()));
        };

        if stat.is_dir() {
            if to.starts_with(&from) {
                return Err(StorageError::InvalidPath {
                    path: target.to_owned().into(),
                    context: Some("Cannot copy a folder into itself".into()),
                });
            }
            blocking(move || copy_tree(&from, &to))
                .await?
                .map_err(|e| StorageError::from_io(e, target))?;
        } else {
            fs::copy(&from, &to).await.map_err(|e| StorageError::from_io(e, target))?;
        }
        debug!(storage = %self.id, source, target, "Copied");
        Ok(())
    }

    async fn file_get_contents(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let resolved = self.resolve(path).await?;
        fs::read(&resolved).await.map_err(|e| StorageError::from_io(e, path))
    }

    /// Writes through a unique part file, `fsync`s it and renames it over the target.
    async fn file_put_contents(&self, path: &str, data: &[u8]) -> Result<u64, StorageError> {
        if self.is_dir(path).await? {
            return Err(StorageError::AlreadyExists {
                path: path.to_owned().into(),
                context: Some("A directory exists at this path".into()),
            });
        }
        self.write_atomic(path, data).await?;
        debug!(storage = %self.id, path, bytes = data.len(), "File saved atomically");
        Ok(u64::try_from(data.len()).unwrap_or(u64::MAX))
    }

    async fn fopen(&self, path: &str, mode: OpenMode) -> Result<FileHandle, StorageError> {
        let resolved =
            if mode.is_write() { self.resolve_target(path).await? } else { self.resolve(path).await? };
        let file = mode.options().open(&resolved).await.map_err(|e| StorageError::from_io(e, path))?;
        Ok(FileHandle::new(file, mode))
    }

    async fn touch(&self, path: &str, mtime: Option<SystemTime>) -> Result<(), StorageError> {
        let resolved = self.resolve_target(path).await?;
        let mtime = mtime.unwrap_or_else(SystemTime::now);
        blocking(move || {
            let file = if resolved.is_dir() {
                std::fs::File::open(&resolved)?
            } else {
                std::fs::OpenOptions::new().create(true).append(true).open(&resolved)?
            };
            file.set_modified(mtime)
        })
        .await?
        .map_err(|e| StorageError::from_io(e, path))
    }

    async fn free_space(&self, _path: &str) -> Result<FreeSpace, StorageError> {
        Ok(FreeSpace::Unknown)
    }

    async fn is_readable(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.stat(path).await?.is_some())
    }

    async fn is_updatable(&self, path: &str) -> Result<bool, StorageError> {
        let resolved = self.resolve(path).await?;
        match fs::metadata(&resolved).await {
            Ok(meta) => Ok(!meta.permissions().readonly()),
            Err(err) if matches!(err.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                Ok(false)
            },
            Err(err) => Err(StorageError::from_io(err, path)),
        }
    }

    async fn get_local_file(&self, path: &str) -> Result<LocalPath, StorageError> {
        if !self.is_file(path).await? {
            return Err(StorageError::not_found(path.to_owned()));
        }
        Ok(LocalPath::Direct(self.resolve(path).await?))
    }

    async fn get_local_folder(&self, path: &str) -> Result<LocalPath, StorageError> {
        if !self.is_dir(path).await? {
            return Err(StorageError::not_found(path.to_owned()));
        }
        Ok(LocalPath::Direct(self.resolve(path).await?))
    }
}

fn stat_from(meta: &std::fs::Metadata) -> Stat {
    let kind = if meta.is_dir() { FileType::Dir } else { FileType::File };
    Stat {
        kind,
        size: if meta.is_dir() { 0 } else { meta.len() },
        mtime: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
    }
}

fn copy_tree(from: &Path, to: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in WalkDir::new(from).min_depth(1) {
        let entry = entry.map_err(std::io::Error::other)?;
        let Ok(relative) = entry.path().strip_prefix(from) else { continue };
        let dest = to.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&dest)?;
        } else if !entry.file_name().to_str().is_some_and(is_part_file) {
            std::fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

/// `local::<datadir>` with duplicate and trailing slashes removed (`/` stays `/`).
#[must_use]
pub fn local_id(datadir: &Path) -> String {
    let raw = datadir.to_string_lossy();
    let absolute = raw.starts_with('/');
    let collapsed = normalize(&raw);
    let dir = match (absolute, collapsed.is_empty()) {
        (true, true) => "/".to_owned(),
        (true, false) => format!("/{collapsed}"),
        (false, _) => collapsed,
    };
    format!("{LOCAL}{STORAGE_ID_SEPARATOR}{dir}")
}

#[derive(Debug, Clone, Default)]
struct LocalConfig {
    create: bool,
    caches: Option<CacheStore>,
}

#[derive(Debug, Default)]
pub struct NoDatadir;
#[derive(Debug)]
pub struct WithDatadir(PathBuf);

mod private {
    pub(super) trait Sealed {}
}
impl Sealed for NoDatadir {}
impl Sealed for WithDatadir {}

#[allow(private_bounds)]
#[derive(Debug, Default)]
pub struct LocalStorageBuilder<S: Sealed = NoDatadir> {
    state: S,
    config: LocalConfig,
}

#[allow(private_bounds)]
impl<S: Sealed> LocalStorageBuilder<S> {
    #[must_use = "Sets whether a missing data directory should be created"]
    pub const fn create(mut self, enable: bool) -> Self {
        self.config.create = enable;
        self
    }

    #[must_use = "Sets the cache store the storage takes its metadata cache from"]
    pub fn caches(mut self, caches: CacheStore) -> Self {
        self.config.caches = Some(caches);
        self
    }

    fn transition<N: Sealed>(self, state: N) -> LocalStorageBuilder<N> {
        LocalStorageBuilder { state, config: self.config }
    }
}

impl LocalStorageBuilder<NoDatadir> {
    #[must_use = "Creates a new local storage builder with default configuration"]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "Sets the data directory of the storage"]
    pub fn datadir(self, path: impl Into<PathBuf>) -> LocalStorageBuilder<WithDatadir> {
        self.transition(WithDatadir(path.into()))
    }
}

impl LocalStorageBuilder<WithDatadir> {
    /// Opens the data directory and returns the storage.
    ///
    /// Creates the directory first when `create(true)` was set, canonicalizes it, then purges
    /// part files orphaned by interrupted writes. The purge is best-effort and only logs.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Unavailable`] if the directory is missing and `create` is off.
    /// - [`StorageError::Configuration`] if the path exists but is not a directory.
    /// - [`StorageError::Io`] if the directory cannot be created or resolved.
    pub async fn connect(self) -> Result<LocalStorage, StorageError> {
        let datadir = &self.state.0;
        let id = local_id(datadir);

        if self.config.create {
            fs::create_dir_all(datadir)
                .await
                .context(format!("Failed to bootstrap data directory: {}", datadir.display()))?;
        }

        match fs::metadata(datadir).await {
            Ok(meta) if meta.is_dir() => {},
            Ok(_) => {
                return Err(StorageError::Configuration {
                    message: format!("{} is not a directory", datadir.display()).into(),
                    context: Some(id.into()),
                });
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StorageError::Unavailable {
                    message: format!("Data directory {} does not exist", datadir.display()).into(),
                    context: Some(id.into()),
                });
            },
            Err(err) => return Err(StorageError::from_io(err, &id)),
        }

        let root = fs::canonicalize(datadir)
            .await
            .context(format!("Failed to resolve data directory: {}", datadir.display()))?;

        let cache = self.config.caches.unwrap_or_default().get(&id);
        maintenance::purge_parts(&root).await;

        info!(%id, root = %root.display(), "Local storage connected");
        Ok(LocalStorage {
            inner: Arc::new(LocalInner { id, root, cache }),
        })
    }
}
