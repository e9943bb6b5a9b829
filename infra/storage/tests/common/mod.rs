#![allow(dead_code, unreachable_pub)]

use async_trait::async_trait;
use fhub_storage::{
    Cache, FileHandle, FileType, FreeSpace, LocalStorage, OpenMode, Stat, Storage, StorageError,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

pub async fn local(temp: &TempDir) -> LocalStorage {
    LocalStorage::builder().datadir(temp.path().join("data")).create(true).connect().await.unwrap()
}

pub fn at(secs: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
}

/// Single-folder backend whose folder mtime is set by the test.
#[derive(Debug)]
pub struct StubStorage {
    pub mtime: Mutex<SystemTime>,
    pub files: Mutex<Vec<String>>,
    cache: Arc<Cache>,
}

impl StubStorage {
    pub fn new(mtime: SystemTime) -> Self {
        Self { mtime: Mutex::new(mtime), files: Mutex::default(), cache: Arc::new(Cache::new("stub::")) }
    }

    fn unsupported() -> StorageError {
        StorageError::unsupported("stub")
    }
}

#[async_trait]
impl Storage for StubStorage {
    fn id(&self) -> &str {
        "stub::"
    }

    async fn owner(&self, _path: &str) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    fn cache(&self) -> Arc<Cache> {
        Arc::clone(&self.cache)
    }

    async fn stat(&self, path: &str) -> Result<Option<Stat>, StorageError> {
        let mtime = *self.mtime.lock();
        if path.is_empty() {
            return Ok(Some(Stat { kind: FileType::Dir, size: 0, mtime }));
        }
        let exists = self.files.lock().iter().any(|f| f == path);
        Ok(exists.then_some(Stat { kind: FileType::File, size: 1, mtime }))
    }

    async fn opendir(&self, _path: &str) -> Result<Vec<String>, StorageError> {
        Ok(self.files.lock().clone())
    }

    async fn mkdir(&self, _path: &str) -> Result<(), StorageError> {
        Err(Self::unsupported())
    }

    async fn rmdir(&self, _path: &str) -> Result<(), StorageError> {
        Err(Self::unsupported())
    }

    async fn unlink(&self, path: &str) -> Result<(), StorageError> {
        self.files.lock().retain(|f| f != path);
        Ok(())
    }

    async fn rename(&self, _source: &str, _target: &str) -> Result<(), StorageError> {
        Err(Self::unsupported())
    }

    async fn copy(&self, _source: &str, _target: &str) -> Result<(), StorageError> {
        Err(Self::unsupported())
    }

    async fn file_get_contents(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        if self.files.lock().iter().any(|f| f == path) {
            Ok(b"x".to_vec())
        } else {
            Err(StorageError::not_found(path.to_owned()))
        }
    }

    async fn file_put_contents(&self, path: &str, data: &[u8]) -> Result<u64, StorageError> {
        self.files.lock().push(path.to_owned());
        Ok(data.len() as u64)
    }

    async fn fopen(&self, _path: &str, _mode: OpenMode) -> Result<FileHandle, StorageError> {
        Err(Self::unsupported())
    }

    async fn touch(&self, _path: &str, mtime: Option<SystemTime>) -> Result<(), StorageError> {
        *self.mtime.lock() = mtime.unwrap_or_else(SystemTime::now);
        Ok(())
    }

    async fn free_space(&self, _path: &str) -> Result<FreeSpace, StorageError> {
        Ok(FreeSpace::Unlimited)
    }

    async fn is_readable(&self, path: &str) -> Result<bool, StorageError> {
        self.file_exists(path).await
    }

    async fn is_updatable(&self, path: &str) -> Result<bool, StorageError> {
        self.file_exists(path).await
    }
}
