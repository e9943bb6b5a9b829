mod common;

use async_trait::async_trait;
use fhub_domain::Permissions;
use fhub_storage::*;
use parking_lot::Mutex;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;

/// Layer recording the order in which calls pass through it.
#[derive(Debug)]
struct Recording {
    name: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl StorageLayer for Recording {
    fn name(&self) -> &str {
        self.name
    }

    fn check(&self, _required: Permissions, _path: &str) -> Result<(), StorageError> {
        self.log.lock().push(self.name);
        Ok(())
    }
}

async fn shared_local(temp: &TempDir) -> Arc<dyn Storage> {
    Arc::new(common::local(temp).await)
}

#[tokio::test]
async fn test_later_wrappers_see_calls_first() {
    let temp = TempDir::new().unwrap();
    let base = shared_local(&temp).await;
    base.file_put_contents("a.txt", b"a").await.unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    let w1 = Wrapper::wrap(Arc::clone(&base), Recording { name: "w1", log: Arc::clone(&log) });
    let w2 = Wrapper::wrap(Arc::clone(&w1), Recording { name: "w2", log: Arc::clone(&log) });

    w2.file_get_contents("a.txt").await.unwrap();
    assert_eq!(*log.lock(), ["w2", "w1"]);
    assert_eq!(w2.layers(), ["w2", "w1"]);

    log.lock().clear();
    let unwrapped = w2.wrapped().cloned().unwrap();
    unwrapped.file_get_contents("a.txt").await.unwrap();
    assert_eq!(*log.lock(), ["w1"]);
    assert_eq!(unwrapped.layers(), ["w1"]);
}

#[tokio::test]
async fn test_wrapping_preserves_identity_and_cache() {
    let temp = TempDir::new().unwrap();
    let base = shared_local(&temp).await;
    let wrapped = Wrapper::wrap(Arc::clone(&base), PermissionsMask::read_only());

    assert_eq!(wrapped.id(), base.id());
    assert!(Arc::ptr_eq(&wrapped.cache(), &base.cache()));
    assert_eq!(wrapped.layer(), Some("permissions"));
    assert!(Arc::ptr_eq(&wrapped.innermost(), &base));
}

#[tokio::test]
async fn test_read_only_mask_is_reported_and_enforced() {
    let temp = TempDir::new().unwrap();
    let base = shared_local(&temp).await;
    base.mkdir("docs").await.unwrap();
    base.file_put_contents("docs/a.txt", b"a").await.unwrap();
    let wrapped = Wrapper::wrap(Arc::clone(&base), PermissionsMask::read_only());

    assert!(base.is_updatable("docs/a.txt").await.unwrap());
    assert!(!wrapped.is_updatable("docs/a.txt").await.unwrap());
    assert!(!wrapped.is_creatable("docs").await.unwrap());
    assert!(!wrapped.is_deletable("docs/a.txt").await.unwrap());
    assert!(wrapped.is_readable("docs/a.txt").await.unwrap());
    assert_eq!(
        wrapped.permissions("docs").await.unwrap(),
        Permissions::READ | Permissions::SHARE
    );

    let denied = wrapped.file_put_contents("docs/a.txt", b"b").await.unwrap_err();
    assert!(matches!(denied, StorageError::PermissionDenied { .. }));
    assert!(!denied.is_transient());
    assert!(wrapped.mkdir("other").await.is_err());
    assert!(wrapped.unlink("docs/a.txt").await.is_err());
    assert!(wrapped.fopen("docs/a.txt", "w".parse().unwrap()).await.is_err());
    assert_eq!(wrapped.file_get_contents("docs/a.txt").await.unwrap(), b"a");
}

#[tokio::test]
async fn test_create_only_mask_distinguishes_new_and_existing_files() {
    let temp = TempDir::new().unwrap();
    let base = shared_local(&temp).await;
    base.file_put_contents("existing.txt", b"a").await.unwrap();
    let wrapped = Wrapper::wrap(
        Arc::clone(&base),
        PermissionsMask::new(Permissions::READ | Permissions::CREATE),
    );

    wrapped.file_put_contents("new.txt", b"n").await.unwrap();
    assert!(wrapped.file_put_contents("existing.txt", b"b").await.is_err());
}

#[tokio::test]
async fn test_quota_limits_writes() {
    let temp = TempDir::new().unwrap();
    let base = shared_local(&temp).await;
    let wrapped = Wrapper::wrap(Arc::clone(&base), Quota::new(10));

    wrapped.file_put_contents("a.bin", &[0; 6]).await.unwrap();
    assert_eq!(wrapped.free_space("").await.unwrap(), FreeSpace::Known(4));

    let err = wrapped.file_put_contents("b.bin", &[0; 5]).await.unwrap_err();
    match err {
        StorageError::QuotaExceeded { requested, available, .. } => {
            assert_eq!((requested, available), (5, 4));
        },
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!base.file_exists("b.bin").await.unwrap());

    // Overwriting only counts the growth.
    wrapped.file_put_contents("a.bin", &[0; 10]).await.unwrap();
    assert!(wrapped.copy("a.bin", "c.bin").await.is_err());
}

#[tokio::test]
async fn test_quota_bounds_streamed_writes() {
    let temp = TempDir::new().unwrap();
    let base = shared_local(&temp).await;
    let wrapped = Wrapper::wrap(Arc::clone(&base), Quota::new(10));
    wrapped.file_put_contents("a.bin", &[0; 10]).await.unwrap();
    assert!(wrapped.file_put_contents("b.bin", &[0; 1]).await.is_err());

    let mut full = wrapped.fopen("c.bin", "w".parse().unwrap()).await.unwrap();
    assert_eq!(full.write_limit(), Some(0));
    let err = full.write_all(&[0; 1000]).await.unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::StorageFull);
    drop(full);
    assert_eq!(base.filesize("c.bin").await.unwrap(), Some(0));

    wrapped.file_put_contents("a.bin", &[0; 4]).await.unwrap();
    let mut partial = wrapped.fopen("c.bin", "a".parse().unwrap()).await.unwrap();
    partial.write_all(&[1; 6]).await.unwrap();
    assert_eq!(partial.write_limit(), Some(0));
    assert!(partial.write_all(&[1]).await.is_err());
    partial.flush().await.unwrap();
    drop(partial);
    assert_eq!(base.filesize("c.bin").await.unwrap(), Some(6));

    let mut unbounded = base.fopen("d.bin", "w".parse().unwrap()).await.unwrap();
    assert_eq!(unbounded.write_limit(), None);
    unbounded.write_all(&[0; 32]).await.unwrap();
}

#[tokio::test]
async fn test_quota_reads_usage_from_scanned_cache() {
    let temp = TempDir::new().unwrap();
    let base = shared_local(&temp).await;
    base.mkdir("docs").await.unwrap();
    base.file_put_contents("docs/a.bin", &[0; 3]).await.unwrap();
    let wrapped = Wrapper::wrap(Arc::clone(&base), Quota::new(10));
    wrapped.scanner().scan("", ScanMode::Recursive).await.unwrap();

    assert_eq!(wrapped.free_space("").await.unwrap(), FreeSpace::Known(7));

    // A cached size stands in for the file until it is rescanned.
    let stat = base.stat("docs/a.bin").await.unwrap().unwrap();
    let stale = CacheUpdate::from_stat(&stat, "application/octet-stream", Permissions::ALL);
    base.cache().put("docs/a.bin", CacheUpdate { size: 8, ..stale });
    assert_eq!(wrapped.free_space("").await.unwrap(), FreeSpace::Known(2));

    wrapped.scanner().scan_file("docs/a.bin").await.unwrap();
    assert_eq!(wrapped.free_space("").await.unwrap(), FreeSpace::Known(7));
}

#[tokio::test]
async fn test_layers_of_unwrapped_storage_are_empty() {
    let temp = TempDir::new().unwrap();
    let base = shared_local(&temp).await;
    assert!(base.layers().is_empty());
    assert!(base.wrapped().is_none());
}
