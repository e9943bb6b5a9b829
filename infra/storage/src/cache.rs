//! In-memory metadata cache keyed by storage id.
//!
//! Entries carry stable numeric file ids: re-scanning a path, or moving it with
//! [`Cache::move_entry`], keeps its id. File ids are unique across every cache handed out by the
//! same [`CacheStore`].

use crate::path::{basename, is_within, normalize, parent};
use crate::types::Stat;
use fhub_domain::Permissions;
use fhub_domain::constants::DIRECTORY_MIME;
use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::cmp::Reverse;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub file_id: u64,
    pub parent: Option<u64>,
    pub path: String,
    pub name: String,
    pub mime_type: String,
    /// For folders: aggregated size of the contents, once calculated.
    pub size: u64,
    pub mtime: SystemTime,
    /// Modification time as last observed on the backend; drives change detection.
    pub storage_mtime: SystemTime,
    pub etag: String,
    pub permissions: Permissions,
}

impl CacheEntry {
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.mime_type == DIRECTORY_MIME
    }
}

/// Fields written by [`Cache::put`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheUpdate {
    pub mime_type: String,
    pub size: u64,
    pub mtime: SystemTime,
    pub storage_mtime: SystemTime,
    pub permissions: Permissions,
    /// Explicit etag; when absent a new one is generated if size or mtime changed.
    pub etag: Option<String>,
}

impl CacheUpdate {
    #[must_use]
    pub fn from_stat(stat: &Stat, mime_type: impl Into<String>, permissions: Permissions) -> Self {
        Self {
            mime_type: mime_type.into(),
            size: stat.size,
            mtime: stat.mtime,
            storage_mtime: stat.mtime,
            permissions,
            etag: None,
        }
    }
}

#[derive(Debug, Default)]
struct CacheState {
    entries: FxHashMap<String, CacheEntry>,
    paths: FxHashMap<u64, String>,
}

impl CacheState {
    fn insert(&mut self, entry: CacheEntry) {
        self.paths.insert(entry.file_id, entry.path.clone());
        self.entries.insert(entry.path.clone(), entry);
    }

    /// Returns the id of the folder at `path`, creating placeholder entries for it and any
    /// missing ancestors. Placeholders carry an epoch storage mtime so they always look stale.
    fn ensure_dir(&mut self, path: &str, ids: &AtomicU64) -> u64 {
        if let Some(entry) = self.entries.get(path) {
            return entry.file_id;
        }
        let parent_id = (!path.is_empty()).then(|| self.ensure_dir(parent(path), ids));
        let entry = CacheEntry {
            file_id: next_id(ids),
            parent: parent_id,
            path: path.to_owned(),
            name: basename(path).to_owned(),
            mime_type: DIRECTORY_MIME.to_owned(),
            size: 0,
            mtime: SystemTime::UNIX_EPOCH,
            storage_mtime: SystemTime::UNIX_EPOCH,
            etag: new_etag(),
            permissions: Permissions::empty(),
        };
        let id = entry.file_id;
        self.insert(entry);
        id
    }

    fn remove_subtree(&mut self, root: &str) -> Vec<CacheEntry> {
        let doomed: Vec<String> =
            self.entries.keys().filter(|p| is_within(p, root)).cloned().collect();
        doomed
            .into_iter()
            .filter_map(|p| self.entries.remove(&p))
            .inspect(|entry| {
                self.paths.remove(&entry.file_id);
            })
            .collect()
    }
}

/// Metadata cache of one storage.
#[derive(Debug)]
pub struct Cache {
    storage_id: String,
    ids: Arc<AtomicU64>,
    state: RwLock<CacheState>,
}

impl Cache {
    /// A standalone cache with its own file id sequence.
    #[must_use]
    pub fn new(storage_id: impl Into<String>) -> Self {
        Self::with_ids(storage_id, Arc::default())
    }

    fn with_ids(storage_id: impl Into<String>, ids: Arc<AtomicU64>) -> Self {
        Self { storage_id: storage_id.into(), ids, state: RwLock::default() }
    }

    #[must_use]
    pub fn storage_id(&self) -> &str {
        &self.storage_id
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<CacheEntry> {
        self.state.read().entries.get(&normalize(path)).cloned()
    }

    #[must_use]
    pub fn get_by_id(&self, file_id: u64) -> Option<CacheEntry> {
        let state = self.state.read();
        state.paths.get(&file_id).and_then(|path| state.entries.get(path)).cloned()
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.state.read().entries.contains_key(&normalize(path))
    }

    /// Inserts or updates the entry at `path` and returns its file id.
    ///
    /// Missing parent folders are created as placeholders.
    pub fn put(&self, path: &str, update: CacheUpdate) -> u64 {
        let path = normalize(path);
        let mut state = self.state.write();
        let parent_id = (!path.is_empty()).then(|| state.ensure_dir(parent(&path), &self.ids));

        if let Some(entry) = state.entries.get_mut(&path) {
            let changed = entry.size != update.size || entry.mtime != update.mtime;
            entry.mime_type = update.mime_type;
            entry.size = update.size;
            entry.mtime = update.mtime;
            entry.storage_mtime = update.storage_mtime;
            entry.permissions = update.permissions;
            if let Some(etag) = update.etag {
                entry.etag = etag;
            } else if changed {
                entry.etag = new_etag();
            }
            return entry.file_id;
        }

        let entry = CacheEntry {
            file_id: next_id(&self.ids),
            parent: parent_id,
            name: basename(&path).to_owned(),
            path,
            mime_type: update.mime_type,
            size: update.size,
            mtime: update.mtime,
            storage_mtime: update.storage_mtime,
            etag: update.etag.unwrap_or_else(new_etag),
            permissions: update.permissions,
        };
        let id = entry.file_id;
        debug!(storage = %self.storage_id, path = %entry.path, file_id = id, "Cached new entry");
        state.insert(entry);
        id
    }

    /// Direct children of the folder at `path`, sorted by name.
    #[must_use]
    pub fn contents(&self, path: &str) -> Vec<CacheEntry> {
        let state = self.state.read();
        let Some(folder) = state.entries.get(&normalize(path)) else {
            return Vec::new();
        };
        let mut children: Vec<CacheEntry> = state
            .entries
            .values()
            .filter(|e| e.parent == Some(folder.file_id))
            .cloned()
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name));
        children
    }

    /// Removes the entry at `path` and everything below it. Returns the number of entries removed.
    pub fn remove(&self, path: &str) -> usize {
        let removed = self.state.write().remove_subtree(&normalize(path)).len();
        if removed > 0 {
            debug!(storage = %self.storage_id, path, removed, "Removed cache entries");
        }
        removed
    }

    /// Moves `source` and its descendants to `target`, keeping file ids.
    ///
    /// An existing entry at `target` is replaced. Returns `false` if `source` is not cached.
    pub fn move_entry(&self, source: &str, target: &str) -> bool {
        let (source, target) = (normalize(source), normalize(target));
        if source == target || is_within(&target, &source) {
            return source == target && self.contains(&source);
        }

        let mut state = self.state.write();
        if !state.entries.contains_key(&source) {
            return false;
        }

        state.remove_subtree(&target);
        let moved = state.remove_subtree(&source);
        let new_parent = (!target.is_empty()).then(|| state.ensure_dir(parent(&target), &self.ids));

        for mut entry in moved {
            let rest = entry.path[source.len()..].to_owned();
            entry.path = format!("{target}{rest}");
            if rest.is_empty() {
                entry.name = basename(&target).to_owned();
                entry.parent = new_parent;
            }
            state.insert(entry);
        }
        debug!(storage = %self.storage_id, %source, %target, "Moved cache entries");
        true
    }

    /// Case-insensitive substring match on entry names, sorted by path.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<CacheEntry> {
        let needle = query.to_lowercase();
        let mut found: Vec<CacheEntry> = self
            .state
            .read()
            .entries
            .values()
            .filter(|e| !e.path.is_empty() && e.name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.path.cmp(&b.path));
        found
    }

    /// Recomputes folder sizes below (and including) `path` from the cached file sizes.
    pub fn calculate_folder_size(&self, path: &str) -> u64 {
        let root = normalize(path);
        let mut state = self.state.write();

        let mut paths: Vec<String> =
            state.entries.keys().filter(|p| is_within(p, &root)).cloned().collect();
        paths.sort_by_key(|p| Reverse(depth(p)));

        let mut totals: FxHashMap<String, u64> = FxHashMap::default();
        for p in paths {
            let Some(entry) = state.entries.get_mut(&p) else { continue };
            if entry.is_dir() {
                entry.size = totals.get(&p).copied().unwrap_or(0);
            }
            if p != root {
                *totals.entry(parent(&p).to_owned()).or_default() += entry.size;
            }
        }

        state.entries.get(&root).map_or(0, |e| e.size)
    }

    pub fn clear(&self) {
        let mut state = self.state.write();
        state.entries.clear();
        state.paths.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }
}

/// Hands out one [`Cache`] per storage id, so storages with the same id share metadata.
#[derive(Debug, Clone, Default)]
pub struct CacheStore {
    inner: Arc<CacheStoreInner>,
}

#[derive(Debug, Default)]
struct CacheStoreInner {
    caches: RwLock<FxHashMap<String, Arc<Cache>>>,
    ids: Arc<AtomicU64>,
}

impl CacheStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cache of `storage_id`, creating it on first use.
    #[must_use]
    pub fn get(&self, storage_id: &str) -> Arc<Cache> {
        if let Some(cache) = self.inner.caches.read().get(storage_id) {
            return Arc::clone(cache);
        }
        let mut caches = self.inner.caches.write();
        Arc::clone(caches.entry(storage_id.to_owned()).or_insert_with(|| {
            Arc::new(Cache::with_ids(storage_id, Arc::clone(&self.inner.ids)))
        }))
    }

    #[must_use]
    pub fn storage_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.caches.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

fn next_id(ids: &AtomicU64) -> u64 {
    ids.fetch_add(1, Ordering::Relaxed) + 1
}

fn new_etag() -> String {
    fhub_kernel::safe_nanoid!(16)
}

fn depth(path: &str) -> usize {
    if path.is_empty() { 0 } else { path.matches('/').count() + 1 }
}
