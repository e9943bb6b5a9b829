mod common;

use fhub_mount::*;
use fhub_storage::Storage;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_home_mount_resolves_with_owner() {
    let temp = TempDir::new().unwrap();
    let mut manager = MountManager::new();
    manager.add_mount(MountPoint::new("/", common::local(&temp, "root").await));
    manager.add_mount(MountPoint::new("/bob", common::home(&temp, "bob").await));

    let mount = manager.find("/bob/docs/a.txt").unwrap();
    assert_eq!(mount.mount_point(), "/bob");
    assert_eq!(mount.storage_id(), "home::bob");

    let internal = mount.internal_path("/bob/docs/a.txt");
    assert_eq!(internal, "docs/a.txt");
    assert_eq!(mount.storage().owner(&internal).await.unwrap().as_deref(), Some("bob"));
}

#[tokio::test]
async fn test_removed_mount_falls_back_to_root() {
    let temp = TempDir::new().unwrap();
    let mut manager = MountManager::new();
    let root = common::local(&temp, "root").await;
    manager.add_mount(MountPoint::new("/", root.clone()));
    manager.add_mount(MountPoint::new("/ext", common::local(&temp, "ext").await));
    assert_eq!(manager.find("/ext/whatever").unwrap().mount_point(), "/ext");

    manager.remove_mount("/ext").unwrap();

    let mount = manager.find("/ext/whatever").unwrap();
    assert_eq!(mount.mount_point(), "/");
    assert_eq!(mount.storage_id(), root.id());
    assert_eq!(mount.internal_path("/ext/whatever"), "ext/whatever");
}

#[tokio::test]
async fn test_moved_mount_keeps_storage() {
    let temp = TempDir::new().unwrap();
    let mut manager = MountManager::new();
    let root = common::local(&temp, "root").await;
    let moved = common::local(&temp, "moved").await;
    manager.add_mount(MountPoint::new("/", root.clone()));
    manager.add_mount(MountPoint::new("/old", moved.clone()));

    manager.move_mount("/old", "/new").unwrap();

    let found = manager.find("/new/x").unwrap();
    assert_eq!(found.mount_point(), "/new");
    assert_eq!(found.storage_id(), moved.id());
    assert!(Arc::ptr_eq(found.storage(), &moved));
    assert_eq!(found.internal_path("/new/x"), "x");

    let old = manager.find("/old/x").unwrap();
    assert_eq!(old.storage_id(), root.id());
    assert!(manager.get("/old").is_none());
}
