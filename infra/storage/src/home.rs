//! Per-user home storage: local-disk behavior with user-specific identity and ownership.

use crate::cache::{Cache, CacheStore};
use crate::error::{StorageError, StorageErrorExt};
use crate::local::LocalStorage;
use crate::storage::Storage;
use crate::types::{Digest, FileHandle, FreeSpace, HashAlgorithm, LocalPath, OpenMode, Stat};
use async_trait::async_trait;
use fhub_domain::Arguments;
use fhub_domain::constants::{HOME, STORAGE_ID_SEPARATOR};
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::info;

/// Validated account name owning a home storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(String);

impl TryFrom<&str> for UserId {
    type Error = StorageError;

    fn try_from(value: &str) -> Result<Self, StorageError> {
        let name = value.trim();

        if name.is_empty() {
            return Err(StorageError::configuration("User id cannot be empty"));
        }

        if name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
            return Err(StorageError::Configuration {
                message: name.to_owned().into(),
                context: Some("User id contains illegal characters".into()),
            });
        }

        Ok(Self(name.to_owned()))
    }
}

impl TryFrom<String> for UserId {
    type Error = StorageError;

    fn try_from(value: String) -> Result<Self, StorageError> {
        Self::try_from(value.as_str())
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A user's home directory.
///
/// Every file operation is delegated to the [`LocalStorage`] rooted at the home directory;
/// only identity (`home::<user>`) and ownership (always the user) differ. The metadata cache is
/// keyed by the home id, independent of where the directory lives.
#[derive(Debug, Clone)]
pub struct HomeStorage {
    local: LocalStorage,
    user: UserId,
    id: String,
    cache: Arc<Cache>,
}

impl HomeStorage {
    /// Opens the home directory `datadir` of `user`.
    ///
    /// # Errors
    /// Propagates the local storage's errors.
    pub async fn connect(
        user: UserId,
        datadir: &str,
        create: bool,
        caches: CacheStore,
    ) -> Result<Self, StorageError> {
        let local = LocalStorage::builder()
            .datadir(datadir)
            .create(create)
            .caches(caches.clone())
            .connect()
            .await?;
        let id = home_id(&user);
        let cache = caches.get(&id);

        info!(%id, "Home storage connected");
        Ok(Self { local, user, id, cache })
    }

    /// Builds a home storage from `user` and `datadir` (both required) plus optional `create`.
    ///
    /// # Errors
    /// [`StorageError::Configuration`] for missing or invalid arguments.
    pub async fn from_arguments(
        arguments: &Arguments,
        caches: CacheStore,
    ) -> Result<Self, StorageError> {
        let user = arguments
            .text("user")
            .ok_or_else(|| StorageError::configuration("Missing 'user' argument"))
            .and_then(UserId::try_from)
            .context(HOME)?;
        let datadir = arguments
            .text("datadir")
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| StorageError::configuration("Missing 'datadir' argument"))
            .context(HOME)?;
        let create = arguments.bool("create").unwrap_or(false);

        Self::connect(user, datadir, create, caches).await
    }

    #[must_use]
    pub const fn user(&self) -> &UserId {
        &self.user
    }

    #[must_use]
    pub const fn local(&self) -> &LocalStorage {
        &self.local
    }
}

#[must_use]
pub fn home_id(user: &UserId) -> String {
    format!("{HOME}{STORAGE_ID_SEPARATOR}{user}")
}

#[async_trait]
impl Storage for HomeStorage {
    fn id(&self) -> &str {
        &self.id
    }

    async fn owner(&self, _path: &str) -> Result<Option<String>, StorageError> {
        Ok(Some(self.user.to_string()))
    }

    fn cache(&self) -> Arc<Cache> {
        Arc::clone(&self.cache)
    }

    async fn stat(&self, path: &str) -> Result<Option<Stat>, StorageError> {
        self.local.stat(path).await
    }

    async fn opendir(&self, path: &str) -> Result<Vec<String>, StorageError> {
        self.local.opendir(path).await
    }

    async fn mkdir(&self, path: &str) -> Result<(), StorageError> {
        self.local.mkdir(path).await
    }

    async fn rmdir(&self, path: &str) -> Result<(), StorageError> {
        self.local.rmdir(path).await
    }

    async fn unlink(&self, path: &str) -> Result<(), StorageError> {
        self.local.unlink(path).await
    }

    async fn rename(&self, source: &str, target: &str) -> Result<(), StorageError> {
        self.local.rename(source, target).await
    }

    async fn copy(&self, source: &str, target: &str) -> Result<(), StorageError> {
        self.local.copy(source, target).await
    }

    async fn file_get_contents(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.local.file_get_contents(path).await
    }

    async fn file_put_contents(&self, path: &str, data: &[u8]) -> Result<u64, StorageError> {
        self.local.file_put_contents(path, data).await
    }

    async fn fopen(&self, path: &str, mode: OpenMode) -> Result<FileHandle, StorageError> {
        self.local.fopen(path, mode).await
    }

    async fn touch(&self, path: &str, mtime: Option<SystemTime>) -> Result<(), StorageError> {
        self.local.touch(path, mtime).await
    }

    async fn free_space(&self, path: &str) -> Result<FreeSpace, StorageError> {
        self.local.free_space(path).await
    }

    async fn is_readable(&self, path: &str) -> Result<bool, StorageError> {
        self.local.is_readable(path).await
    }

    async fn is_updatable(&self, path: &str) -> Result<bool, StorageError> {
        self.local.is_updatable(path).await
    }

    async fn hash(
        &self,
        algorithm: HashAlgorithm,
        path: &str,
    ) -> Result<Option<Digest>, StorageError> {
        self.local.hash(algorithm, path).await
    }

    async fn has_updated(&self, path: &str, time: SystemTime) -> Result<bool, StorageError> {
        self.local.has_updated(path, time).await
    }

    async fn get_local_file(&self, path: &str) -> Result<LocalPath, StorageError> {
        self.local.get_local_file(path).await
    }

    async fn get_local_folder(&self, path: &str) -> Result<LocalPath, StorageError> {
        self.local.get_local_folder(path).await
    }
}
