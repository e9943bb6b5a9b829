use crate::scanner::Scanner;
use crate::storage::Storage;
use crate::watcher::{WatchPolicy, Watcher};
use std::sync::Arc;

/// Helpers available on every shared storage, wrapped or not.
pub trait StorageExt {
    /// Scanner reading through this (outermost) storage.
    fn scanner(&self) -> Scanner;

    fn watcher(&self, policy: WatchPolicy) -> Watcher;

    /// Wrapper layer names, outermost first.
    fn layers(&self) -> Vec<String>;

    /// The backend below every wrapper.
    fn innermost(&self) -> Arc<dyn Storage>;
}

impl StorageExt for Arc<dyn Storage> {
    fn scanner(&self) -> Scanner {
        Scanner::new(Arc::clone(self))
    }

    fn watcher(&self, policy: WatchPolicy) -> Watcher {
        Watcher::new(Arc::clone(self), policy)
    }

    fn layers(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut current = Arc::clone(self);
        while let Some(inner) = current.wrapped().cloned() {
            names.push(current.layer().unwrap_or("anonymous").to_owned());
            current = inner;
        }
        names
    }

    fn innermost(&self) -> Arc<dyn Storage> {
        let mut current = Arc::clone(self);
        while let Some(inner) = current.wrapped().cloned() {
            current = inner;
        }
        current
    }
}
