use fhub::domain::config::{FilesystemConfig, MountConfig, WrapperConfig};
use fhub::domain::{Arguments, Permissions};
use fhub::storage::{Loader, ScanMode, Storage, StorageError};
use fhub::{Filesystem, FilesystemError, MountFailurePolicy};
use serde_json::json;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

fn datadir(temp: &TempDir, name: &str) -> String {
    temp.path().join(name).display().to_string()
}

fn config(temp: &TempDir) -> FilesystemConfig {
    serde_json::from_value(json!({
        "mounts": [
            {
                "mount_point": "/",
                "backend": "local",
                "arguments": { "datadir": datadir(temp, "root"), "create": true }
            },
            {
                "mount_point": "/bob",
                "backend": "home",
                "arguments": { "user": "bob", "datadir": datadir(temp, "bob"), "create": true }
            },
            {
                "mount_point": "/shared",
                "backend": "local",
                "arguments": { "datadir": datadir(temp, "shared"), "create": true },
                "wrappers": [{ "type": "permissions", "arguments": { "mask": "read,share" } }],
                "options": { "previews": false }
            }
        ]
    }))
    .unwrap()
}

async fn filesystem(temp: &TempDir) -> Filesystem {
    Filesystem::bootstrap(&config(temp), Loader::with_defaults(), MountFailurePolicy::Abort)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_bootstrap_resolves_home_mount() {
    let temp = TempDir::new().unwrap();
    let fs = filesystem(&temp).await;

    assert_eq!(fs.mounts().len(), 3);
    let resolved = fs.resolve("/bob/docs/a.txt").unwrap();
    assert_eq!(resolved.mount.mount_point(), "/bob");
    assert_eq!(resolved.internal, "docs/a.txt");
    assert_eq!(fs.owner("/bob/docs/a.txt").await.unwrap().as_deref(), Some("bob"));
    assert_eq!(fs.owner("/elsewhere").await.unwrap(), None);
    assert!(!fs.mounts().get("/shared").unwrap().option("previews", true));
}

#[tokio::test]
async fn test_failure_policy() {
    let temp = TempDir::new().unwrap();
    let mut config = config(&temp);
    config.mounts.push(MountConfig::new("/smb", "smb"));

    let fs = Filesystem::bootstrap(&config, Loader::with_defaults(), MountFailurePolicy::Skip)
        .await
        .unwrap();
    assert_eq!(fs.mounts().len(), 3);
    assert!(fs.mounts().get("/smb").is_none());

    let err = Filesystem::bootstrap(&config, Loader::with_defaults(), MountFailurePolicy::Abort)
        .await
        .unwrap_err();
    assert!(matches!(err.storage_error(), Some(StorageError::Configuration { .. })));
}

#[tokio::test]
async fn test_write_read_and_list_merge_mounts() {
    let temp = TempDir::new().unwrap();
    let fs = filesystem(&temp).await;

    assert_eq!(fs.write("/readme.txt", b"hello").await.unwrap(), 5);
    assert_eq!(fs.read("/readme.txt").await.unwrap(), b"hello");
    assert_eq!(fs.list("/").await.unwrap(), ["bob", "readme.txt", "shared"]);

    fs.mkdir("/bob/docs").await.unwrap();
    fs.write("/bob/docs/a.txt", b"abc").await.unwrap();
    assert_eq!(fs.list("/bob").await.unwrap(), ["docs"]);
    assert_eq!(std::fs::read(temp.path().join("bob/docs/a.txt")).unwrap(), b"abc");

    let cache = fs.resolve("/bob").unwrap().storage().cache();
    assert_eq!(cache.get("docs/a.txt").map(|e| e.size), Some(3));
    assert!(cache.get("docs").is_some_and(|e| e.is_dir()));
}

#[tokio::test]
async fn test_list_folder_holding_only_mounts() {
    let temp = TempDir::new().unwrap();
    let mut fs = filesystem(&temp).await;
    let arguments = Arguments::new().with("datadir", datadir(&temp, "alice")).with("create", true);
    fs.mount(&MountConfig::new("/users/alice", "local").arguments(arguments)).await.unwrap();

    assert_eq!(fs.list("/users").await.unwrap(), ["alice"]);
    assert!(fs.list("/nothing").await.is_err());
}

#[tokio::test]
async fn test_read_only_mount_refuses_writes() {
    let temp = TempDir::new().unwrap();
    let fs = filesystem(&temp).await;

    let err = fs.write("/shared/x.txt", b"x").await.unwrap_err();
    assert!(matches!(err.storage_error(), Some(StorageError::PermissionDenied { .. })));
    assert_eq!(err.context_message(), Some("/shared/x.txt"));

    let storage = fs.resolve("/shared").unwrap().storage().clone();
    assert_eq!(storage.permissions("").await.unwrap(), Permissions::READ | Permissions::SHARE);
}

#[tokio::test]
async fn test_unlink_refuses_mount_roots() {
    let temp = TempDir::new().unwrap();
    let mut fs = filesystem(&temp).await;

    assert!(matches!(fs.unlink("/bob").await, Err(FilesystemError::MountRoot { .. })));
    assert!(matches!(fs.unlink("/").await, Err(FilesystemError::MountRoot { .. })));
    assert!(matches!(fs.unlink("/bob/").await, Err(FilesystemError::MountRoot { .. })));

    fs.write("/bob/a.txt", b"a").await.unwrap();
    fs.unlink("/bob/a.txt").await.unwrap();
    assert!(fs.stat("/bob/a.txt").await.unwrap().is_none());
    assert!(fs.resolve("/bob").unwrap().storage().cache().get("a.txt").is_none());
}

#[tokio::test]
async fn test_unlink_folder_unmounts_nested_mounts() {
    let temp = TempDir::new().unwrap();
    let mut fs = filesystem(&temp).await;
    fs.mkdir("/projects").await.unwrap();
    let arguments = Arguments::new().with("datadir", datadir(&temp, "ext")).with("create", true);
    fs.mount(&MountConfig::new("/projects/ext", "local").arguments(arguments)).await.unwrap();
    fs.write("/projects/ext/keep.txt", b"k").await.unwrap();

    fs.unlink("/projects").await.unwrap();

    assert!(fs.mounts().get("/projects/ext").is_none());
    assert!(temp.path().join("ext/keep.txt").exists());
    assert!(!temp.path().join("root/projects").exists());
}

#[tokio::test]
async fn test_rename_within_and_across_storages() {
    let temp = TempDir::new().unwrap();
    let mut fs = filesystem(&temp).await;
    fs.mkdir("/dir").await.unwrap();
    fs.write("/dir/a.txt", b"a").await.unwrap();
    let file_id = fs.resolve("/").unwrap().storage().cache().get("dir/a.txt").unwrap().file_id;

    fs.rename("/dir/a.txt", "/dir/b.txt").await.unwrap();
    assert_eq!(fs.read("/dir/b.txt").await.unwrap(), b"a");
    let cache = fs.resolve("/").unwrap().storage().cache();
    assert_eq!(cache.get("dir/b.txt").unwrap().file_id, file_id);

    fs.rename("/dir", "/bob/moved").await.unwrap();
    assert!(fs.stat("/dir").await.unwrap().is_none());
    assert!(cache.get("dir").is_none());
    assert_eq!(fs.read("/bob/moved/b.txt").await.unwrap(), b"a");
    assert!(temp.path().join("bob/moved/b.txt").exists());
}

#[tokio::test]
async fn test_rename_mount_root_moves_mount() {
    let temp = TempDir::new().unwrap();
    let mut fs = filesystem(&temp).await;

    fs.rename("/bob", "/robert").await.unwrap();

    assert_eq!(fs.resolve("/robert/x").unwrap().mount.storage_id(), "home::bob");
    assert_eq!(fs.resolve("/bob/x").unwrap().mount.mount_point(), "/");
    assert!(matches!(fs.rename("/robert", "/shared").await, Err(FilesystemError::Mount { .. })));
    fs.write("/robert/x.txt", b"x").await.unwrap();
    assert!(matches!(
        fs.rename("/robert/x.txt", "/shared").await,
        Err(FilesystemError::MountRoot { .. })
    ));
}

#[tokio::test]
async fn test_shared_backend_respects_target_wrappers() {
    let temp = TempDir::new().unwrap();
    let mut fs = filesystem(&temp).await;
    let arguments = Arguments::new().with("datadir", datadir(&temp, "team")).with("create", true);
    fs.mount(&MountConfig::new("/rw", "local").arguments(arguments.clone())).await.unwrap();
    let read_only = WrapperConfig::new("permissions", Arguments::new().with("mask", "read,share"));
    fs.mount(&MountConfig::new("/ro", "local").arguments(arguments).wrapper(read_only))
        .await
        .unwrap();
    let (rw, ro) = (fs.resolve("/rw").unwrap(), fs.resolve("/ro").unwrap());
    assert_eq!(rw.mount.storage_id(), ro.mount.storage_id());

    fs.write("/rw/a.txt", b"a").await.unwrap();
    assert!(fs.write("/ro/direct.txt", b"x").await.is_err());

    let copied = fs.copy("/rw/a.txt", "/ro/copied.txt").await.unwrap_err();
    assert!(matches!(copied.storage_error(), Some(StorageError::PermissionDenied { .. })));
    let moved = fs.rename("/rw/a.txt", "/ro/moved.txt").await.unwrap_err();
    assert!(matches!(moved.storage_error(), Some(StorageError::PermissionDenied { .. })));

    assert_eq!(fs.list("/ro").await.unwrap(), ["a.txt"]);
    assert_eq!(fs.read("/rw/a.txt").await.unwrap(), b"a");

    fs.copy("/ro/a.txt", "/rw/b.txt").await.unwrap();
    assert_eq!(fs.list("/rw").await.unwrap(), ["a.txt", "b.txt"]);
}

#[tokio::test]
async fn test_copy_across_storages() {
    let temp = TempDir::new().unwrap();
    let fs = filesystem(&temp).await;
    fs.mkdir("/bob/src").await.unwrap();
    fs.mkdir("/bob/src/nested").await.unwrap();
    fs.write("/bob/src/nested/n.txt", b"nested").await.unwrap();

    fs.copy("/bob/src", "/copy").await.unwrap();
    fs.copy("/bob/src/nested/n.txt", "/bob/n.txt").await.unwrap();

    assert_eq!(fs.read("/copy/nested/n.txt").await.unwrap(), b"nested");
    assert_eq!(fs.read("/bob/src/nested/n.txt").await.unwrap(), b"nested");
    assert_eq!(fs.read("/bob/n.txt").await.unwrap(), b"nested");
    assert!(fs.resolve("/").unwrap().storage().cache().get("copy/nested/n.txt").is_some());
}

#[tokio::test]
async fn test_has_updated_and_scan() {
    let temp = TempDir::new().unwrap();
    let fs = filesystem(&temp).await;
    fs.write("/bob/a.txt", b"a").await.unwrap();
    std::fs::write(temp.path().join("bob/outside.txt"), b"12345").unwrap();

    let future = SystemTime::now() + Duration::from_secs(3600);
    assert!(!fs.has_updated("/bob", future).await.unwrap());
    assert!(fs.has_updated("/bob", SystemTime::UNIX_EPOCH).await.unwrap());
    assert!(fs.has_updated("/bob/missing", future).await.unwrap());

    let summary = fs.scan("/bob", ScanMode::Recursive).await.unwrap();
    assert_eq!(summary.scanned, 3);
    assert_eq!(summary.size, Some(6));
}

#[tokio::test]
async fn test_open_reads_config_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("fhub.toml");
    let root = datadir(&temp, "root");
    std::fs::write(
        &path,
        format!(
            "[[mounts]]\nmount_point = \"/\"\nbackend = \"local\"\n\n[mounts.arguments]\ndatadir = {root:?}\ncreate = true\n"
        ),
    )
    .unwrap();

    let fs = Filesystem::open(Some(path.as_path()), MountFailurePolicy::Abort).await.unwrap();
    assert_eq!(fs.mounts().len(), 1);
    fs.write("/hello.txt", b"hi").await.unwrap();
    assert!(temp.path().join("root/hello.txt").exists());

    let missing_path = temp.path().join("missing.toml");
    let missing = Filesystem::open(Some(missing_path.as_path()), MountFailurePolicy::Abort)
        .await
        .unwrap_err();
    assert!(matches!(missing, FilesystemError::Config { .. }));
}
