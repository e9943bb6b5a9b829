use crate::error::MountError;
use crate::mount_point::{MountPoint, normalize_mount_path};
use fhub_domain::constants::ROOT;
use fhub_storage::path::is_within;
use fhub_storage::{StorageIdLookup, StorageIdTable};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Registry of the active mounts of one request or task.
///
/// Mount paths are unique. Resolution picks the mount with the longest path that is an ancestor
/// of (or equal to) the queried path, comparing whole components.
#[derive(Clone)]
pub struct MountManager {
    mounts: BTreeMap<String, Arc<MountPoint>>,
    ids: Arc<dyn StorageIdLookup>,
}

impl fmt::Debug for MountManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountManager")
            .field("mounts", &self.mounts.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Default for MountManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MountManager {
    /// An empty manager whose numeric ids come from a private, empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::with_lookup(Arc::new(StorageIdTable::new()))
    }

    /// An empty manager resolving numeric storage ids through `ids`.
    #[must_use]
    pub fn with_lookup(ids: Arc<dyn StorageIdLookup>) -> Self {
        Self { mounts: BTreeMap::new(), ids }
    }

    /// Registers `mount`, replacing and returning any mount at the same path.
    pub fn add_mount(&mut self, mount: MountPoint) -> Option<Arc<MountPoint>> {
        let path = mount.mount_point().to_owned();
        info!(mount_point = %path, id = %mount.storage_id(), "Mount registered");
        let replaced = self.mounts.insert(path, Arc::new(mount));
        if let Some(old) = &replaced {
            warn!(mount_point = %old.mount_point(), id = %old.storage_id(), "Replaced existing mount");
        }
        replaced
    }

    /// Unregisters the mount at `path`. Holders of the returned mount may keep using it.
    pub fn remove_mount(&mut self, path: &str) -> Option<Arc<MountPoint>> {
        let removed = self.mounts.remove(&normalize_mount_path(path));
        if let Some(mount) = &removed {
            info!(mount_point = %mount.mount_point(), "Mount removed");
        }
        removed
    }

    /// Re-keys the mount at `path` under `target`, keeping its storage and wrappers.
    ///
    /// # Errors
    /// [`MountError::NotFound`] if nothing is mounted at `path`; [`MountError::Conflict`] if
    /// `target` is already taken.
    pub fn move_mount(&mut self, path: &str, target: &str) -> Result<(), MountError> {
        let (source, target) = (normalize_mount_path(path), normalize_mount_path(target));
        let Some(mount) = self.mounts.get(&source).cloned() else {
            return Err(MountError::NotFound { path: source.into(), context: None });
        };
        if source == target {
            return Ok(());
        }
        if self.mounts.contains_key(&target) {
            return Err(MountError::Conflict { path: target.into(), context: None });
        }

        self.mounts.remove(&source);
        let mut mount = Arc::unwrap_or_clone(mount);
        mount.set_mount_point(&target);
        info!(%source, %target, "Mount moved");
        self.mounts.insert(target, Arc::new(mount));
        Ok(())
    }

    /// The mount responsible for `path`.
    ///
    /// # Errors
    /// [`MountError::NoRootMount`] if no mount covers `path`, which means no root mount is
    /// registered.
    pub fn find(&self, path: &str) -> Result<Arc<MountPoint>, MountError> {
        let path = normalize_mount_path(path);
        let mut candidate = path.as_str();
        loop {
            if let Some(mount) = self.mounts.get(candidate) {
                debug!(%path, mount_point = %mount.mount_point(), "Resolved mount");
                return Ok(Arc::clone(mount));
            }
            if candidate == ROOT {
                break;
            }
            candidate = match candidate.rfind('/') {
                Some(0) | None => ROOT,
                Some(i) => &candidate[..i],
            };
        }

        error!(%path, mounts = self.mounts.len(), "No mount covers path, root mount missing");
        Err(MountError::NoRootMount { path: path.into(), context: None })
    }

    /// Mounts strictly below `path`, sorted by path. A mount exactly at `path` is excluded.
    #[must_use]
    pub fn find_in(&self, path: &str) -> Vec<Arc<MountPoint>> {
        let path = normalize_mount_path(path);
        let ancestor = path.trim_start_matches('/');
        self.mounts
            .iter()
            .filter(|(mount_point, _)| {
                **mount_point != path && is_within(mount_point.trim_start_matches('/'), ancestor)
            })
            .map(|(_, mount)| Arc::clone(mount))
            .collect()
    }

    /// Every mount backed by the storage `storage_id`, sorted by path.
    #[must_use]
    pub fn find_by_storage_id(&self, storage_id: &str) -> Vec<Arc<MountPoint>> {
        self.mounts.values().filter(|mount| mount.storage_id() == storage_id).cloned().collect()
    }

    /// Every mount backed by the storage registered under `numeric_id`.
    #[must_use]
    pub fn find_by_numeric_id(&self, numeric_id: u64) -> Vec<Arc<MountPoint>> {
        self.ids
            .storage_id(numeric_id)
            .map(|storage_id| self.find_by_storage_id(&storage_id))
            .unwrap_or_default()
    }

    /// The mount registered exactly at `path`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Arc<MountPoint>> {
        self.mounts.get(&normalize_mount_path(path)).cloned()
    }

    pub fn clear(&mut self) {
        debug!(mounts = self.mounts.len(), "Clearing mounts");
        self.mounts.clear();
    }

    /// All mounts, sorted by path.
    #[must_use]
    pub fn all(&self) -> Vec<Arc<MountPoint>> {
        self.mounts.values().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }
}
