#![allow(dead_code, unreachable_pub)]

use fhub_domain::Arguments;
use fhub_mount::{MountManager, MountPoint};
use fhub_storage::{HomeStorage, LocalStorage, Storage, UserId};
use std::sync::Arc;
use tempfile::TempDir;

pub async fn local(temp: &TempDir, name: &str) -> Arc<dyn Storage> {
    let storage =
        LocalStorage::builder().datadir(temp.path().join(name)).create(true).connect().await.unwrap();
    Arc::new(storage)
}

pub async fn home(temp: &TempDir, user: &str) -> Arc<dyn Storage> {
    let datadir = temp.path().join("home").join(user);
    let storage = HomeStorage::connect(
        UserId::try_from(user).unwrap(),
        &datadir.to_string_lossy(),
        true,
        fhub_storage::CacheStore::new(),
    )
    .await
    .unwrap();
    Arc::new(storage)
}

/// Manager with one distinct local storage per mount path.
pub async fn manager(temp: &TempDir, paths: &[&str]) -> MountManager {
    let mut manager = MountManager::new();
    for (i, path) in paths.iter().enumerate() {
        let storage = local(temp, &format!("storage{i}")).await;
        manager.add_mount(MountPoint::new(path, storage));
    }
    manager
}

pub fn local_arguments(temp: &TempDir, name: &str) -> Arguments {
    Arguments::new()
        .with("datadir", temp.path().join(name).to_string_lossy().into_owned())
        .with("create", true)
}

pub fn paths(mounts: &[Arc<MountPoint>]) -> Vec<&str> {
    mounts.iter().map(|m| m.mount_point()).collect()
}
