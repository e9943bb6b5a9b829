//! Factory registry turning `(backend, arguments)` pairs into storages.

use crate::cache::CacheStore;
use crate::error::StorageError;
use crate::home::HomeStorage;
use crate::local::LocalStorage;
use crate::storage::Storage;
use crate::wrapper::{PermissionsMask, Quota, Wrapper};
use fhub_domain::Arguments;
use fhub_domain::constants::{HOME, LOCAL, PERMISSIONS_LAYER, QUOTA_LAYER};
use futures::FutureExt;
use futures::future::BoxFuture;
use fxhash::FxHashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

pub type StorageFuture = BoxFuture<'static, Result<Arc<dyn Storage>, StorageError>>;

/// Constructs a backend from its arguments.
pub type BackendFactory = Arc<dyn Fn(Arguments, CacheStore) -> StorageFuture + Send + Sync>;

/// Wraps a storage with a named layer configured by arguments.
pub type LayerFactory =
    Arc<dyn Fn(&Arguments, Arc<dyn Storage>) -> Result<Arc<dyn Storage>, StorageError> + Send + Sync>;

/// Wrapper applied to every mount; receives the mount point path.
pub type StorageWrapper = Arc<dyn Fn(&str, Arc<dyn Storage>) -> Arc<dyn Storage> + Send + Sync>;

/// Backend and layer registry, consulted when mounts are created.
///
/// Storages it builds take their metadata caches from one shared [`CacheStore`], so a backend
/// loaded twice with the same configuration sees the same cache.
#[derive(Clone, Default)]
pub struct Loader {
    backends: FxHashMap<String, BackendFactory>,
    layers: FxHashMap<String, LayerFactory>,
    wrappers: Vec<(String, StorageWrapper)>,
    caches: CacheStore,
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("backends", &self.backends())
            .field("layers", &sorted_keys(&self.layers))
            .field("wrappers", &self.wrappers.iter().map(|(name, _)| name).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Loader {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `local` and `home` backends and the `permissions` and `quota` layers.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut loader = Self::new();
        loader.register(LOCAL, |arguments: Arguments, caches| async move {
            LocalStorage::from_arguments(&arguments, caches)
                .await
                .map(|storage| Arc::new(storage) as Arc<dyn Storage>)
        });
        loader.register(HOME, |arguments: Arguments, caches| async move {
            HomeStorage::from_arguments(&arguments, caches)
                .await
                .map(|storage| Arc::new(storage) as Arc<dyn Storage>)
        });
        loader.register_layer(PERMISSIONS_LAYER, |arguments, storage| {
            Ok(Wrapper::wrap(storage, PermissionsMask::from_arguments(arguments)?))
        });
        loader.register_layer(QUOTA_LAYER, |arguments, storage| {
            Ok(Wrapper::wrap(storage, Quota::from_arguments(arguments)?))
        });
        loader
    }

    /// Uses `caches` for every storage loaded from now on.
    #[must_use]
    pub fn with_caches(mut self, caches: CacheStore) -> Self {
        self.caches = caches;
        self
    }

    #[must_use]
    pub const fn caches(&self) -> &CacheStore {
        &self.caches
    }

    /// Registers (or replaces) the constructor of a backend type.
    pub fn register<F, Fut>(&mut self, backend: impl Into<String>, factory: F)
    where
        F: Fn(Arguments, CacheStore) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<dyn Storage>, StorageError>> + Send + 'static,
    {
        let factory: BackendFactory =
            Arc::new(move |arguments, caches| factory(arguments, caches).boxed());
        self.backends.insert(backend.into(), factory);
    }

    /// Registers (or replaces) a named wrapper layer.
    pub fn register_layer<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&Arguments, Arc<dyn Storage>) -> Result<Arc<dyn Storage>, StorageError>
            + Send
            + Sync
            + 'static,
    {
        self.layers.insert(kind.into(), Arc::new(factory));
    }

    /// Adds a wrapper applied to every mount, after its own layers. Wrappers apply in the order
    /// they were added; adding one under an existing name replaces it in place.
    pub fn add_storage_wrapper<F>(&mut self, name: impl Into<String>, wrapper: F)
    where
        F: Fn(&str, Arc<dyn Storage>) -> Arc<dyn Storage> + Send + Sync + 'static,
    {
        let name = name.into();
        let wrapper: StorageWrapper = Arc::new(wrapper);
        match self.wrappers.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = wrapper,
            None => self.wrappers.push((name, wrapper)),
        }
    }

    pub fn remove_storage_wrapper(&mut self, name: &str) -> bool {
        let before = self.wrappers.len();
        self.wrappers.retain(|(existing, _)| existing != name);
        self.wrappers.len() != before
    }

    /// Registered backend identifiers, sorted.
    #[must_use]
    pub fn backends(&self) -> Vec<&str> {
        sorted_keys(&self.backends)
    }

    #[must_use]
    pub fn has_backend(&self, backend: &str) -> bool {
        self.backends.contains_key(backend)
    }

    /// Constructs a storage of type `backend`.
    ///
    /// # Errors
    /// [`StorageError::Configuration`] for an unknown backend; otherwise whatever the backend's
    /// constructor reports.
    pub async fn load(
        &self,
        backend: &str,
        arguments: &Arguments,
    ) -> Result<Arc<dyn Storage>, StorageError> {
        let factory = self.backends.get(backend).ok_or_else(|| StorageError::Configuration {
            message: format!("Unknown storage backend '{backend}'").into(),
            context: None,
        })?;
        let storage = factory(arguments.clone(), self.caches.clone()).await?;
        info!(backend, id = %storage.id(), "Storage loaded");
        Ok(storage)
    }

    /// Wraps `storage` with the layer registered as `kind`.
    ///
    /// # Errors
    /// [`StorageError::Configuration`] for an unknown layer or invalid layer arguments.
    pub fn layer(
        &self,
        kind: &str,
        arguments: &Arguments,
        storage: Arc<dyn Storage>,
    ) -> Result<Arc<dyn Storage>, StorageError> {
        let factory = self.layers.get(kind).ok_or_else(|| StorageError::Configuration {
            message: format!("Unknown wrapper layer '{kind}'").into(),
            context: None,
        })?;
        debug!(kind, id = %storage.id(), "Applying wrapper layer");
        factory(arguments, storage)
    }

    /// Global wrappers in application order.
    pub fn storage_wrappers(&self) -> impl Iterator<Item = (&str, &StorageWrapper)> {
        self.wrappers.iter().map(|(name, wrapper)| (name.as_str(), wrapper))
    }

    /// Applies every global wrapper to a storage about to be mounted at `mount_point`.
    #[must_use]
    pub fn wrap(&self, mount_point: &str, storage: Arc<dyn Storage>) -> Arc<dyn Storage> {
        self.wrappers.iter().fold(storage, |storage, (_, wrapper)| wrapper(mount_point, storage))
    }
}

fn sorted_keys<V>(map: &FxHashMap<String, V>) -> Vec<&str> {
    let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
    keys.sort_unstable();
    keys
}
