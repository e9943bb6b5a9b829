use crate::error::{MountError, MountErrorExt};
use fhub_domain::config::MountConfig;
use fhub_domain::{Arguments, FromArgument};
use fhub_storage::{Loader, Storage};
use std::mem;
use std::sync::Arc;
use tracing::{debug, info};

/// Normalizes an absolute logical path: one leading `/`, no duplicate or trailing separators.
///
/// `..` is collapsed lexically; like `/..` on a POSIX system, it never climbs above `/`.
#[must_use]
pub fn normalize_mount_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {},
            ".." => {
                segments.pop();
            },
            name => segments.push(name),
        }
    }
    format!("/{}", segments.join("/"))
}

/// One storage bound to one absolute path prefix.
///
/// Cloning is cheap; clones share the storage.
#[derive(Debug, Clone)]
pub struct MountPoint {
    mount_point: String,
    storage: Arc<dyn Storage>,
    options: Arguments,
}

impl MountPoint {
    pub fn new(mount_point: &str, storage: Arc<dyn Storage>) -> Self {
        Self { mount_point: normalize_mount_path(mount_point), storage, options: Arguments::new() }
    }

    #[must_use]
    pub fn with_options(mut self, options: Arguments) -> Self {
        self.options = options;
        self
    }

    /// Builds a mount from configuration: loads the backend, applies the configured wrapper
    /// layers in declaration order and then the loader's global wrappers.
    ///
    /// # Errors
    /// [`MountError::Storage`] if the backend or a layer refuses its arguments.
    pub async fn from_config(config: &MountConfig, loader: &Loader) -> Result<Self, MountError> {
        let storage = loader
            .load(&config.backend, &config.arguments)
            .await
            .context(format!("mounting '{}'", config.mount_point))?;
        let mut mount = Self::new(&config.mount_point, storage).with_options(config.options.clone());

        for wrapper in &config.wrappers {
            let wrapped = loader
                .layer(&wrapper.kind, &wrapper.arguments, Arc::clone(&mount.storage))
                .context(format!("wrapping '{}'", mount.mount_point))?;
            mount.wrap_storage(|_, _| wrapped);
        }
        for (_, wrapper) in loader.storage_wrappers() {
            mount.wrap_storage(|mount_point, storage| wrapper(mount_point, storage));
        }

        info!(
            mount_point = %mount.mount_point,
            backend = %config.backend,
            id = %mount.storage_id(),
            "Mount created"
        );
        Ok(mount)
    }

    #[must_use]
    pub fn mount_point(&self) -> &str {
        &self.mount_point
    }

    pub fn set_mount_point(&mut self, mount_point: &str) {
        self.mount_point = normalize_mount_path(mount_point);
    }

    /// The outermost storage, wrappers included.
    #[must_use]
    pub const fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    #[must_use]
    pub fn storage_id(&self) -> &str {
        self.storage.id()
    }

    /// Strips the mount prefix from an absolute path. The mount path itself maps to `""`.
    ///
    /// Paths outside the mount are returned normalized but otherwise unchanged.
    #[must_use]
    pub fn internal_path(&self, path: &str) -> String {
        let absolute = normalize_mount_path(path);
        let path = absolute.trim_start_matches('/');
        let prefix = self.mount_point.trim_start_matches('/');
        if prefix.is_empty() {
            return path.to_owned();
        }
        match path.strip_prefix(prefix) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => {
                rest.trim_start_matches('/').to_owned()
            },
            _ => path.to_owned(),
        }
    }

    /// Replaces the storage with `wrapper(mount_point, storage)`. Later wrappers end up
    /// outside earlier ones.
    pub fn wrap_storage<F>(&mut self, wrapper: F)
    where
        F: FnOnce(&str, Arc<dyn Storage>) -> Arc<dyn Storage>,
    {
        self.storage = wrapper(&self.mount_point, Arc::clone(&self.storage));
        debug!(
            mount_point = %self.mount_point,
            layer = self.storage.layer().unwrap_or("anonymous"),
            "Storage wrapped"
        );
    }

    /// Removes the outermost wrapper and returns it; `None` if the storage is not wrapped.
    pub fn unwrap_storage(&mut self) -> Option<Arc<dyn Storage>> {
        let inner = self.storage.wrapped().cloned()?;
        Some(mem::replace(&mut self.storage, inner))
    }

    /// Mount option `name`, or `default` when unset or of another type.
    #[must_use]
    pub fn option<T: FromArgument>(&self, name: &str, default: T) -> T {
        self.options.value_or(name, default)
    }

    #[must_use]
    pub const fn options(&self) -> &Arguments {
        &self.options
    }
}
