//! Keeps a storage's metadata cache in step with its content.

use crate::cache::{Cache, CacheEntry, CacheUpdate};
use crate::error::StorageError;
use crate::maintenance::is_part_file;
use crate::path::{join, normalize};
use crate::storage::{Storage, mime_for};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanMode {
    /// The path and its direct children.
    #[default]
    Shallow,
    /// The whole tree below the path; folder sizes are aggregated afterwards.
    Recursive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanSummary {
    pub scanned: usize,
    pub removed: usize,
    /// Aggregated size of the scanned folder, on recursive scans.
    pub size: Option<u64>,
}

/// Scans a storage into its cache.
///
/// Obtained through [`StorageExt::scanner`](crate::StorageExt::scanner) so that metadata is
/// read through the outermost wrapper and reflects wrapper-imposed permissions.
#[derive(Debug, Clone)]
pub struct Scanner {
    storage: Arc<dyn Storage>,
    cache: Arc<Cache>,
}

impl Scanner {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        let cache = storage.cache();
        Self { storage, cache }
    }

    /// Refreshes the cache entry of a single path; a vanished path is dropped from the cache.
    ///
    /// # Errors
    /// Propagates storage failures.
    pub async fn scan_file(&self, path: &str) -> Result<Option<CacheEntry>, StorageError> {
        let path = normalize(path);
        let Some(stat) = self.storage.stat(&path).await? else {
            self.cache.remove(&path);
            return Ok(None);
        };

        let permissions = self.storage.permissions(&path).await?;
        let mut update = CacheUpdate::from_stat(&stat, mime_for(&path, stat.kind), permissions);
        if stat.is_dir() {
            update.size = self.cache.get(&path).map_or(0, |cached| cached.size);
        }
        self.cache.put(&path, update);
        Ok(self.cache.get(&path))
    }

    /// Scans `path` and, for folders, its children; recursive scans walk the whole tree.
    ///
    /// Cached children that no longer exist are removed. Part files are never cached.
    ///
    /// # Errors
    /// Propagates storage failures.
    pub async fn scan(&self, path: &str, mode: ScanMode) -> Result<ScanSummary, StorageError> {
        let root = normalize(path);
        let mut summary = ScanSummary::default();

        let Some(entry) = self.scan_file(&root).await? else {
            return Ok(summary);
        };
        summary.scanned += 1;

        if entry.is_dir() {
            let mut pending = VecDeque::from([root.clone()]);
            while let Some(dir) = pending.pop_front() {
                let names = self.storage.opendir(&dir).await?;

                for cached in self.cache.contents(&dir) {
                    if !names.contains(&cached.name) {
                        summary.removed += self.cache.remove(&cached.path);
                    }
                }

                for name in names.iter().filter(|name| !is_part_file(name)) {
                    let child = join(&dir, name);
                    if let Some(entry) = self.scan_file(&child).await? {
                        summary.scanned += 1;
                        if entry.is_dir() && mode == ScanMode::Recursive {
                            pending.push_back(child);
                        }
                    }
                }
            }

            if mode == ScanMode::Recursive {
                summary.size = Some(self.cache.calculate_folder_size(&root));
            }
        }

        debug!(
            storage = %self.storage.id(),
            path = %root,
            ?mode,
            scanned = summary.scanned,
            removed = summary.removed,
            "Scan finished"
        );
        Ok(summary)
    }
}
