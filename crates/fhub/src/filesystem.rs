use crate::error::{FilesystemError, FilesystemErrorExt};
use fhub_domain::config::{FilesystemConfig, MountConfig};
use fhub_kernel::config::load_config;
use fhub_mount::{MountManager, MountPoint, normalize_mount_path};
use fhub_storage::path::{basename, join, normalize, parent};
use fhub_storage::{
    Loader, ScanMode, ScanSummary, Stat, Storage, StorageError, StorageExt,
};
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// What [`Filesystem::bootstrap`] does with a mount whose backend cannot be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MountFailurePolicy {
    /// Fail the whole bootstrap.
    #[default]
    Abort,
    /// Log a warning and continue without the mount.
    Skip,
}

/// A path resolved to its mount and the path inside that mount's storage.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub mount: Arc<MountPoint>,
    pub internal: String,
}

impl Resolved {
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn Storage> {
        self.mount.storage()
    }

    /// Whether the path is the mount point itself.
    #[must_use]
    pub fn is_mount_root(&self) -> bool {
        self.internal.is_empty()
    }
}

/// One namespace over every mounted storage.
///
/// Paths are absolute (`/bob/docs/a.txt`); each call resolves its path through the mount
/// manager and runs on the matching storage. The metadata cache of the touched storage is kept
/// current for the paths a call changes.
#[derive(Debug)]
pub struct Filesystem {
    mounts: MountManager,
    loader: Loader,
}

impl Filesystem {
    pub const fn new(mounts: MountManager, loader: Loader) -> Self {
        Self { mounts, loader }
    }

    /// Creates every mount listed in `config`, in order.
    ///
    /// # Errors
    /// With [`MountFailurePolicy::Abort`], the first mount that fails to build.
    pub async fn bootstrap(
        config: &FilesystemConfig,
        loader: Loader,
        policy: MountFailurePolicy,
    ) -> Result<Self, FilesystemError> {
        let mut filesystem = Self::new(MountManager::new(), loader);
        for mount in &config.mounts {
            match filesystem.mount(mount).await {
                Ok(_) => {},
                Err(err) if policy == MountFailurePolicy::Skip => {
                    warn!(mount_point = %mount.mount_point, backend = %mount.backend, %err, "Skipping mount");
                },
                Err(err) => return Err(err),
            }
        }
        info!(mounts = filesystem.mounts.len(), "Filesystem ready");
        Ok(filesystem)
    }

    /// Loads a [`FilesystemConfig`] from `path` (or the default config file) and bootstraps it
    /// with the default loader.
    ///
    /// # Errors
    /// Configuration failures, then whatever [`Filesystem::bootstrap`] reports.
    pub async fn open(
        path: Option<&Path>,
        policy: MountFailurePolicy,
    ) -> Result<Self, FilesystemError> {
        let config: FilesystemConfig = load_config(path).context("Failed to load filesystem config")?;
        Self::bootstrap(&config, Loader::with_defaults(), policy).await
    }

    /// Builds and registers one mount, returning the mount it replaced.
    ///
    /// # Errors
    /// [`FilesystemError::Mount`] if the backend or a layer cannot be built.
    pub async fn mount(
        &mut self,
        config: &MountConfig,
    ) -> Result<Option<Arc<MountPoint>>, FilesystemError> {
        let mount = MountPoint::from_config(config, &self.loader)
            .await
            .context(format!("mount '{}'", config.mount_point))?;
        Ok(self.mounts.add_mount(mount))
    }

    #[must_use]
    pub const fn mounts(&self) -> &MountManager {
        &self.mounts
    }

    pub const fn mounts_mut(&mut self) -> &mut MountManager {
        &mut self.mounts
    }

    #[must_use]
    pub const fn loader(&self) -> &Loader {
        &self.loader
    }

    /// # Errors
    /// [`FilesystemError::Mount`] if no mount covers `path`.
    pub fn resolve(&self, path: &str) -> Result<Resolved, FilesystemError> {
        let mount = self.mounts.find(path)?;
        let internal = mount.internal_path(path);
        Ok(Resolved { mount, internal })
    }

    /// # Errors
    /// Resolution and storage failures.
    pub async fn stat(&self, path: &str) -> Result<Option<Stat>, FilesystemError> {
        let resolved = self.resolve(path)?;
        resolved.storage().stat(&resolved.internal).await.context(path.to_owned())
    }

    /// # Errors
    /// Resolution and storage failures.
    pub async fn mkdir(&self, path: &str) -> Result<(), FilesystemError> {
        let resolved = self.resolve(path)?;
        let storage = resolved.storage();
        storage.mkdir(&resolved.internal).await.context(path.to_owned())?;
        storage.scanner().scan_file(&resolved.internal).await?;
        Ok(())
    }

    /// # Errors
    /// Resolution and storage failures; [`StorageError::NotFound`] for a missing file.
    pub async fn read(&self, path: &str) -> Result<Vec<u8>, FilesystemError> {
        let resolved = self.resolve(path)?;
        resolved.storage().file_get_contents(&resolved.internal).await.context(path.to_owned())
    }

    /// Writes `data` to `path` and returns the number of bytes written.
    ///
    /// # Errors
    /// Resolution and storage failures, including wrapper refusals.
    pub async fn write(&self, path: &str, data: &[u8]) -> Result<u64, FilesystemError> {
        let resolved = self.resolve(path)?;
        let storage = resolved.storage();
        let written =
            storage.file_put_contents(&resolved.internal, data).await.context(path.to_owned())?;
        storage.scanner().scan_file(&resolved.internal).await?;
        Ok(written)
    }

    /// Deletes a file or a folder with its content.
    ///
    /// Mounts below a deleted folder are unmounted; their storages are left untouched.
    ///
    /// # Errors
    /// [`FilesystemError::MountRoot`] when `path` is a mount point; otherwise resolution and
    /// storage failures.
    pub async fn unlink(&mut self, path: &str) -> Result<(), FilesystemError> {
        let resolved = self.resolve(path)?;
        if resolved.is_mount_root() {
            return Err(FilesystemError::MountRoot {
                path: normalize_mount_path(path).into(),
                context: None,
            });
        }

        remove(resolved.storage().as_ref(), &resolved.internal).await.context(path.to_owned())?;
        resolved.storage().cache().remove(&resolved.internal);

        for nested in self.mounts.find_in(path) {
            warn!(mount_point = %nested.mount_point(), "Unmounting below deleted folder");
            self.mounts.remove_mount(nested.mount_point());
        }
        Ok(())
    }

    /// Names in the folder at `path`, including mounts directly below it, sorted.
    ///
    /// # Errors
    /// Resolution and storage failures.
    pub async fn list(&self, path: &str) -> Result<Vec<String>, FilesystemError> {
        let resolved = self.resolve(path)?;
        let folder = normalize(&normalize_mount_path(path));
        let children: Vec<String> = self
            .mounts
            .find_in(path)
            .iter()
            .map(|nested| normalize(nested.mount_point()))
            .filter(|nested| parent(nested) == folder)
            .map(|nested| basename(&nested).to_owned())
            .collect();

        // A folder may exist only as the parent of mounts.
        let mut names = match resolved.storage().opendir(&resolved.internal).await {
            Ok(names) => names,
            Err(err) if err.is_not_found() && !children.is_empty() => Vec::new(),
            Err(source) => {
                return Err(FilesystemError::Storage { source, context: Some(path.to_owned().into()) });
            },
        };
        names.extend(children);
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Moves `source` to `target`.
    ///
    /// A mount point is moved by re-keying the mount. Within one mount the backend renames;
    /// otherwise the content is copied through the target mount's storage, wrappers included,
    /// and the source deleted.
    ///
    /// # Errors
    /// Resolution and storage failures; [`FilesystemError::MountRoot`] when the target is a
    /// mount point.
    pub async fn rename(&mut self, source: &str, target: &str) -> Result<(), FilesystemError> {
        if self.mounts.get(source).is_some() {
            self.mounts.move_mount(source, target)?;
            return Ok(());
        }

        let from = self.resolve(source)?;
        let to = self.resolve(target)?;
        if to.is_mount_root() {
            return Err(FilesystemError::MountRoot {
                path: normalize_mount_path(target).into(),
                context: None,
            });
        }

        if same_storage(&from, &to) {
            from.storage()
                .rename(&from.internal, &to.internal)
                .await
                .context(format!("{source} -> {target}"))?;
            from.storage().cache().move_entry(&from.internal, &to.internal);
        } else {
            debug!(source, target, "Moving across storages");
            transfer(from.storage().as_ref(), &from.internal, to.storage().as_ref(), &to.internal)
                .await
                .context(format!("{source} -> {target}"))?;
            remove(from.storage().as_ref(), &from.internal).await.context(source.to_owned())?;
            from.storage().cache().remove(&from.internal);
        }
        to.storage().scanner().scan(&to.internal, ScanMode::Recursive).await?;
        Ok(())
    }

    /// Copies `source` to `target`, across storages if needed.
    ///
    /// # Errors
    /// Resolution and storage failures.
    pub async fn copy(&self, source: &str, target: &str) -> Result<(), FilesystemError> {
        let from = self.resolve(source)?;
        let to = self.resolve(target)?;

        if same_storage(&from, &to) {
            from.storage()
                .copy(&from.internal, &to.internal)
                .await
                .context(format!("{source} -> {target}"))?;
        } else {
            transfer(from.storage().as_ref(), &from.internal, to.storage().as_ref(), &to.internal)
                .await
                .context(format!("{source} -> {target}"))?;
        }
        to.storage().scanner().scan(&to.internal, ScanMode::Recursive).await?;
        Ok(())
    }

    /// # Errors
    /// Resolution and storage failures.
    pub async fn owner(&self, path: &str) -> Result<Option<String>, FilesystemError> {
        let resolved = self.resolve(path)?;
        resolved.storage().owner(&resolved.internal).await.context(path.to_owned())
    }

    /// # Errors
    /// Resolution and storage failures.
    pub async fn has_updated(&self, path: &str, time: SystemTime) -> Result<bool, FilesystemError> {
        let resolved = self.resolve(path)?;
        resolved.storage().has_updated(&resolved.internal, time).await.context(path.to_owned())
    }

    /// Refreshes the metadata cache below `path`.
    ///
    /// # Errors
    /// Resolution and storage failures.
    pub async fn scan(&self, path: &str, mode: ScanMode) -> Result<ScanSummary, FilesystemError> {
        let resolved = self.resolve(path)?;
        resolved.storage().scanner().scan(&resolved.internal, mode).await.context(path.to_owned())
    }
}

/// Both paths go through the same storage object, so one set of wrappers applies to both.
///
/// Mounts sharing a backend may differ in their wrappers; matching storage ids are not enough.
fn same_storage(a: &Resolved, b: &Resolved) -> bool {
    Arc::ptr_eq(a.storage(), b.storage())
}

async fn remove(storage: &dyn Storage, path: &str) -> Result<(), StorageError> {
    if storage.is_dir(path).await? { storage.rmdir(path).await } else { storage.unlink(path).await }
}

/// Copies a file or folder tree between two storages.
async fn transfer(
    source: &dyn Storage,
    from: &str,
    target: &dyn Storage,
    to: &str,
) -> Result<(), StorageError> {
    let mut pending = vec![(from.to_owned(), to.to_owned())];
    while let Some((from, to)) = pending.pop() {
        let Some(stat) = source.stat(&from).await? else {
            return Err(StorageError::not_found(from));
        };
        if stat.is_dir() {
            if !target.is_dir(&to).await? {
                target.mkdir(&to).await?;
            }
            for name in source.opendir(&from).await? {
                pending.push((join(&from, &name), join(&to, &name)));
            }
        } else {
            let data = source.file_get_contents(&from).await?;
            target.file_put_contents(&to, &data).await?;
        }
    }
    Ok(())
}
