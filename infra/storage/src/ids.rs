//! Mapping between string storage ids and stable numeric ids.

use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::fmt;

/// Lookup capability over the storage-id table, injected into consumers that resolve numeric ids.
pub trait StorageIdLookup: fmt::Debug + Send + Sync {
    fn numeric_id(&self, storage_id: &str) -> Option<u64>;

    fn storage_id(&self, numeric_id: u64) -> Option<String>;
}

#[derive(Debug, Default)]
struct TableState {
    by_id: FxHashMap<String, u64>,
    by_numeric: FxHashMap<u64, String>,
    next: u64,
}

/// In-memory storage-id table. Numeric ids start at 1 and are never reused.
#[derive(Debug, Default)]
pub struct StorageIdTable {
    state: RwLock<TableState>,
}

impl StorageIdTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the numeric id of `storage_id`, assigning one on first registration.
    pub fn register(&self, storage_id: &str) -> u64 {
        if let Some(id) = self.state.read().by_id.get(storage_id) {
            return *id;
        }
        let mut state = self.state.write();
        if let Some(id) = state.by_id.get(storage_id) {
            return *id;
        }
        state.next += 1;
        let id = state.next;
        state.by_id.insert(storage_id.to_owned(), id);
        state.by_numeric.insert(id, storage_id.to_owned());
        id
    }

    pub fn remove(&self, storage_id: &str) -> Option<u64> {
        let mut state = self.state.write();
        let id = state.by_id.remove(storage_id)?;
        state.by_numeric.remove(&id);
        Some(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageIdLookup for StorageIdTable {
    fn numeric_id(&self, storage_id: &str) -> Option<u64> {
        self.state.read().by_id.get(storage_id).copied()
    }

    fn storage_id(&self, numeric_id: u64) -> Option<String> {
        self.state.read().by_numeric.get(&numeric_id).cloned()
    }
}
