//! Decorators layering policy onto any storage.
//!
//! A [`Wrapper`] forwards every call to the storage it holds and consults its
//! [`StorageLayer`] on the way: the layer's permission mask is applied to the predicates and
//! enforced on mutations, and writes pass the layer's size check first.

use crate::error::StorageError;
use crate::path::join;
use crate::storage::Storage;
use crate::types::{Digest, FileHandle, FreeSpace, HashAlgorithm, LocalPath, OpenMode, Stat};
use async_trait::async_trait;
use fhub_domain::constants::{PERMISSIONS_LAYER, QUOTA_LAYER};
use fhub_domain::{ArgumentValue, Arguments, Permissions};
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

/// Policy consulted by a [`Wrapper`].
#[async_trait]
pub trait StorageLayer: fmt::Debug + Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Permissions this layer lets through.
    fn mask(&self) -> Permissions {
        Permissions::ALL
    }

    /// Called before an operation needing `required` reaches the inner storage.
    ///
    /// # Errors
    /// [`StorageError::PermissionDenied`] when the mask withholds `required`.
    fn check(&self, required: Permissions, path: &str) -> Result<(), StorageError> {
        if self.mask().contains(required) {
            Ok(())
        } else {
            Err(StorageError::PermissionDenied {
                path: path.to_owned().into(),
                context: Some(format!("{} layer", self.name()).into()),
            })
        }
    }

    /// Called before `size` bytes are written to `path`.
    async fn before_write(
        &self,
        _inner: &dyn Storage,
        _path: &str,
        _size: u64,
    ) -> Result<(), StorageError> {
        Ok(())
    }

    async fn free_space(&self, inner: &dyn Storage, path: &str) -> Result<FreeSpace, StorageError> {
        inner.free_space(path).await
    }

    /// Called with a handle opened for writing, before it is handed out.
    async fn wrap_handle(
        &self,
        _inner: &dyn Storage,
        _path: &str,
        handle: FileHandle,
    ) -> Result<FileHandle, StorageError> {
        Ok(handle)
    }
}

/// A storage decorated with a [`StorageLayer`].
///
/// Identity, ownership and the metadata cache are those of the inner storage.
#[derive(Debug)]
pub struct Wrapper<L: StorageLayer> {
    inner: Arc<dyn Storage>,
    policy: L,
}

impl<L: StorageLayer> Wrapper<L> {
    pub fn new(inner: Arc<dyn Storage>, policy: L) -> Self {
        Self { inner, policy }
    }

    /// Wraps `inner` and erases the type, ready for a mount point.
    pub fn wrap(inner: Arc<dyn Storage>, policy: L) -> Arc<dyn Storage> {
        Arc::new(Self::new(inner, policy))
    }

    #[must_use]
    pub const fn policy(&self) -> &L {
        &self.policy
    }

    #[must_use]
    pub const fn inner(&self) -> &Arc<dyn Storage> {
        &self.inner
    }

    /// Mutating an existing path needs UPDATE, creating a new one needs CREATE.
    async fn write_permission(&self, path: &str) -> Result<Permissions, StorageError> {
        Ok(if self.inner.file_exists(path).await? {
            Permissions::UPDATE
        } else {
            Permissions::CREATE
        })
    }
}

#[async_trait]
impl<L: StorageLayer> Storage for Wrapper<L> {
    fn id(&self) -> &str {
        self.inner.id()
    }

    async fn owner(&self, path: &str) -> Result<Option<String>, StorageError> {
        self.inner.owner(path).await
    }

    fn cache(&self) -> Arc<crate::cache::Cache> {
        self.inner.cache()
    }

    fn wrapped(&self) -> Option<&Arc<dyn Storage>> {
        Some(&self.inner)
    }

    fn layer(&self) -> Option<&str> {
        Some(self.policy.name())
    }

    async fn stat(&self, path: &str) -> Result<Option<Stat>, StorageError> {
        self.inner.stat(path).await
    }

    async fn opendir(&self, path: &str) -> Result<Vec<String>, StorageError> {
        self.inner.opendir(path).await
    }

    async fn mkdir(&self, path: &str) -> Result<(), StorageError> {
        self.policy.check(Permissions::CREATE, path)?;
        self.inner.mkdir(path).await
    }

    async fn rmdir(&self, path: &str) -> Result<(), StorageError> {
        self.policy.check(Permissions::DELETE, path)?;
        self.inner.rmdir(path).await
    }

    async fn unlink(&self, path: &str) -> Result<(), StorageError> {
        self.policy.check(Permissions::DELETE, path)?;
        self.inner.unlink(path).await
    }

    async fn rename(&self, source: &str, target: &str) -> Result<(), StorageError> {
        self.policy.check(Permissions::UPDATE, source)?;
        self.inner.rename(source, target).await
    }

    async fn copy(&self, source: &str, target: &str) -> Result<(), StorageError> {
        self.policy.check(Permissions::CREATE, target)?;
        let size = tree_size(self.inner.as_ref(), source).await?;
        self.policy.before_write(self.inner.as_ref(), target, size).await?;
        self.inner.copy(source, target).await
    }

    async fn file_get_contents(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.policy.check(Permissions::READ, path)?;
        self.inner.file_get_contents(path).await
    }

    async fn file_put_contents(&self, path: &str, data: &[u8]) -> Result<u64, StorageError> {
        self.policy.check(self.write_permission(path).await?, path)?;
        let size = u64::try_from(data.len()).unwrap_or(u64::MAX);
        self.policy.before_write(self.inner.as_ref(), path, size).await?;
        self.inner.file_put_contents(path, data).await
    }

    async fn fopen(&self, path: &str, mode: OpenMode) -> Result<FileHandle, StorageError> {
        if !mode.is_write() {
            self.policy.check(Permissions::READ, path)?;
            return self.inner.fopen(path, mode).await;
        }
        self.policy.check(self.write_permission(path).await?, path)?;
        self.policy.before_write(self.inner.as_ref(), path, 0).await?;
        let handle = self.inner.fopen(path, mode).await?;
        self.policy.wrap_handle(self.inner.as_ref(), path, handle).await
    }

    async fn touch(&self, path: &str, mtime: Option<SystemTime>) -> Result<(), StorageError> {
        self.policy.check(self.write_permission(path).await?, path)?;
        self.inner.touch(path, mtime).await
    }

    async fn free_space(&self, path: &str) -> Result<FreeSpace, StorageError> {
        self.policy.free_space(self.inner.as_ref(), path).await
    }

    async fn is_readable(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.policy.mask().contains(Permissions::READ) && self.inner.is_readable(path).await?)
    }

    async fn is_updatable(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.policy.mask().contains(Permissions::UPDATE) && self.inner.is_updatable(path).await?)
    }

    async fn is_creatable(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.policy.mask().contains(Permissions::CREATE) && self.inner.is_creatable(path).await?)
    }

    async fn is_deletable(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.policy.mask().contains(Permissions::DELETE) && self.inner.is_deletable(path).await?)
    }

    async fn is_sharable(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.policy.mask().contains(Permissions::SHARE) && self.inner.is_sharable(path).await?)
    }

    async fn permissions(&self, path: &str) -> Result<Permissions, StorageError> {
        Ok(self.inner.permissions(path).await? & self.policy.mask())
    }

    async fn hash(
        &self,
        algorithm: HashAlgorithm,
        path: &str,
    ) -> Result<Option<Digest>, StorageError> {
        self.policy.check(Permissions::READ, path)?;
        self.inner.hash(algorithm, path).await
    }

    async fn search(&self, query: &str) -> Result<Vec<String>, StorageError> {
        self.inner.search(query).await
    }

    async fn has_updated(&self, path: &str, time: SystemTime) -> Result<bool, StorageError> {
        self.inner.has_updated(path, time).await
    }

    async fn get_local_file(&self, path: &str) -> Result<LocalPath, StorageError> {
        self.policy.check(Permissions::READ, path)?;
        self.inner.get_local_file(path).await
    }

    async fn get_local_folder(&self, path: &str) -> Result<LocalPath, StorageError> {
        self.policy.check(Permissions::READ, path)?;
        self.inner.get_local_folder(path).await
    }
}

/// Restricts a storage to a subset of permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionsMask {
    mask: Permissions,
}

impl PermissionsMask {
    #[must_use]
    pub const fn new(mask: Permissions) -> Self {
        Self { mask }
    }

    /// Reading and sharing only.
    #[must_use]
    pub const fn read_only() -> Self {
        Self::new(Permissions::READ.union(Permissions::SHARE))
    }

    /// `mask` given either as permission bits or as comma separated names (`"read,share"`).
    ///
    /// # Errors
    /// [`StorageError::Configuration`] if `mask` is missing or of the wrong type.
    pub fn from_arguments(arguments: &Arguments) -> Result<Self, StorageError> {
        let mask = match arguments.get("mask") {
            Some(ArgumentValue::Integer(bits)) => u32::try_from(*bits).map(Permissions::from).ok(),
            Some(ArgumentValue::Text(names)) => Some(
                names.trim().parse::<u32>().map_or_else(|_| Permissions::from_names(names), Permissions::from),
            ),
            _ => None,
        };
        mask.map(Self::new).ok_or_else(|| StorageError::Configuration {
            message: "Missing or invalid 'mask' argument".into(),
            context: Some(PERMISSIONS_LAYER.into()),
        })
    }
}

impl StorageLayer for PermissionsMask {
    fn name(&self) -> &str {
        PERMISSIONS_LAYER
    }

    fn mask(&self) -> Permissions {
        self.mask
    }
}

/// Caps the bytes a storage may hold.
///
/// Used space is the size of the storage root as recalculated from the metadata cache; until
/// the root has been scanned, the files are summed on the storage itself. Free space is what
/// remains of the quota. Handles opened for writing get the free space as their write budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    bytes: u64,
}

impl Quota {
    #[must_use]
    pub const fn new(bytes: u64) -> Self {
        Self { bytes }
    }

    #[must_use]
    pub const fn bytes(&self) -> u64 {
        self.bytes
    }

    /// # Errors
    /// [`StorageError::Configuration`] if `quota` is missing or negative.
    pub fn from_arguments(arguments: &Arguments) -> Result<Self, StorageError> {
        arguments
            .integer("quota")
            .and_then(|q| u64::try_from(q).ok())
            .map(Self::new)
            .ok_or_else(|| StorageError::Configuration {
                message: "Missing or invalid 'quota' argument".into(),
                context: Some(QUOTA_LAYER.into()),
            })
    }
}

#[async_trait]
impl StorageLayer for Quota {
    fn name(&self) -> &str {
        QUOTA_LAYER
    }

    async fn before_write(
        &self,
        inner: &dyn Storage,
        path: &str,
        size: u64,
    ) -> Result<(), StorageError> {
        let existing = inner.filesize(path).await?.unwrap_or(0);
        let growth = size.saturating_sub(existing);
        let free = self.free_space(inner, path).await?;
        if free.allows(growth) {
            return Ok(());
        }
        debug!(path, growth, quota = self.bytes, "Write rejected by quota");
        Err(StorageError::QuotaExceeded {
            path: path.to_owned().into(),
            requested: growth,
            available: free.available().unwrap_or(0),
            context: None,
        })
    }

    async fn free_space(&self, inner: &dyn Storage, _path: &str) -> Result<FreeSpace, StorageError> {
        let cache = inner.cache();
        let scanned =
            cache.get("").is_some_and(|root| root.storage_mtime != SystemTime::UNIX_EPOCH);
        let used =
            if scanned { cache.calculate_folder_size("") } else { tree_size(inner, "").await? };
        Ok(FreeSpace::Known(self.bytes.saturating_sub(used)))
    }

    async fn wrap_handle(
        &self,
        inner: &dyn Storage,
        path: &str,
        handle: FileHandle,
    ) -> Result<FileHandle, StorageError> {
        let free = self.free_space(inner, path).await?;
        debug!(path, budget = ?free.available(), "Write handle limited by quota");
        Ok(match free.available() {
            Some(bytes) => handle.limit_writes(bytes),
            None => handle,
        })
    }
}

/// Total size of the files at or below `path`.
async fn tree_size(storage: &dyn Storage, path: &str) -> Result<u64, StorageError> {
    let Some(stat) = storage.stat(path).await? else {
        return Ok(0);
    };
    if !stat.is_dir() {
        return Ok(stat.size);
    }

    let mut total = 0;
    let mut pending = vec![path.trim_matches('/').to_owned()];
    while let Some(dir) = pending.pop() {
        for name in storage.opendir(&dir).await? {
            let child = join(&dir, &name);
            match storage.stat(&child).await? {
                Some(stat) if stat.is_dir() => pending.push(child),
                Some(stat) => total += stat.size,
                None => {},
            }
        }
    }
    Ok(total)
}
