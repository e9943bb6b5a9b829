//! Detects changes made behind the cache's back and rescans what changed.

use crate::error::StorageError;
use crate::path::normalize;
use crate::scanner::{ScanMode, Scanner};
use crate::storage::Storage;
use fxhash::FxHashSet;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// How often a [`Watcher`] consults the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatchPolicy {
    /// Trust the cache.
    Never,
    /// Check each path once per watcher.
    #[default]
    Once,
    /// Check on every call.
    Always,
}

#[derive(Debug)]
pub struct Watcher {
    storage: Arc<dyn Storage>,
    scanner: Scanner,
    policy: WatchPolicy,
    checked: Mutex<FxHashSet<String>>,
}

impl Watcher {
    pub fn new(storage: Arc<dyn Storage>, policy: WatchPolicy) -> Self {
        let scanner = Scanner::new(Arc::clone(&storage));
        Self { storage, scanner, policy, checked: Mutex::default() }
    }

    #[must_use]
    pub const fn policy(&self) -> WatchPolicy {
        self.policy
    }

    /// Whether the backend changed since `path` was last scanned. Uncached paths always need
    /// an update.
    ///
    /// # Errors
    /// Propagates storage failures.
    pub async fn needs_update(&self, path: &str) -> Result<bool, StorageError> {
        match self.storage.cache().get(path) {
            Some(cached) => self.storage.has_updated(path, cached.storage_mtime).await,
            None => Ok(true),
        }
    }

    /// Rescans `path` if the policy allows a check and the backend reports a change.
    /// Returns whether the cache was updated.
    ///
    /// # Errors
    /// Propagates storage failures.
    pub async fn check_update(&self, path: &str) -> Result<bool, StorageError> {
        let path = normalize(path);
        match self.policy {
            WatchPolicy::Never => return Ok(false),
            WatchPolicy::Once => {
                let first = self.checked.lock().insert(path.clone());
                if !first {
                    return Ok(false);
                }
            },
            WatchPolicy::Always => {},
        }

        if !self.needs_update(&path).await? {
            return Ok(false);
        }

        debug!(storage = %self.storage.id(), %path, "Change detected, rescanning");
        if self.storage.is_dir(&path).await? {
            self.scanner.scan(&path, ScanMode::Shallow).await?;
        } else {
            self.scanner.scan_file(&path).await?;
        }
        Ok(true)
    }

    /// Forgets which paths were checked, so [`WatchPolicy::Once`] checks them again.
    pub fn reset(&self) {
        self.checked.lock().clear();
    }
}
