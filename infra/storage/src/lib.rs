//! Storage backends for FileHub.
//!
//! The crate defines the [`Storage`] capability contract and everything a mount needs around
//! it. Examples use temporary directories to avoid writing to the real filesystem.
//!
//! # Core Features
//!
//! - **Capability contract**: namespace primitives, metadata queries, permission predicates,
//!   content I/O, hashing, search and change detection behind one object-safe async trait.
//! - **Sandboxed backends**: [`LocalStorage`] confines every path to its data directory;
//!   [`HomeStorage`] reuses it under a per-user identity.
//! - **Atomic writes**: content is written to a unique part file, synced and renamed into
//!   place. Part files orphaned by a crash are purged when a storage connects.
//! - **Wrapping**: [`Wrapper`] decorates any storage with a [`StorageLayer`] such as
//!   [`PermissionsMask`] or [`Quota`].
//! - **Metadata cache**: one [`Cache`] per storage id, kept current by the [`Scanner`] and the
//!   [`Watcher`].
//! - **Loader**: a factory registry building storages from configuration.
//!
//! # Examples
//!
//! ```rust
//! use fhub_domain::Arguments;
//! use fhub_storage::{Loader, Storage, StorageError, StorageExt};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), StorageError> {
//!     # let tmp = tempfile::tempdir().unwrap();
//!     # let datadir = tmp.path().join("alice");
//!     let loader = Loader::with_defaults();
//!     let arguments = Arguments::new()
//!         .with("user", "alice")
//!         .with("datadir", datadir.to_string_lossy().into_owned())
//!         .with("create", true);
//!
//!     let home = loader.load("home", &arguments).await?;
//!     assert_eq!(home.id(), "home::alice");
//!     assert_eq!(home.owner("").await?.as_deref(), Some("alice"));
//!
//!     home.file_put_contents("notes.txt", b"hello").await?;
//!     home.scanner().scan_file("notes.txt").await?;
//!     assert_eq!(home.cache().get("notes.txt").map(|e| e.size), Some(5));
//!     Ok(())
//! }
//! ```

mod cache;
mod error;
mod ext;
mod home;
mod ids;
mod loader;
mod local;
mod maintenance;
pub mod path;
mod scanner;
mod security;
mod storage;
mod types;
mod watcher;
mod wrapper;

pub use cache::{Cache, CacheEntry, CacheStore, CacheUpdate};
pub use error::{StorageError, StorageErrorExt};
pub use ext::StorageExt;
pub use home::{HomeStorage, UserId, home_id};
pub use ids::{StorageIdLookup, StorageIdTable};
pub use loader::{BackendFactory, LayerFactory, Loader, StorageFuture, StorageWrapper};
pub use local::{LocalStorage, LocalStorageBuilder, NoDatadir, WithDatadir, local_id};
pub use maintenance::{PART_FILE_MARKER, PART_ID_LEN, is_part_file};
pub use scanner::{ScanMode, ScanSummary, Scanner};
pub use storage::Storage;
pub use types::{
    Digest, FileHandle, FileType, FreeSpace, HashAlgorithm, LocalPath, OpenMode, Stat,
};
pub use watcher::{WatchPolicy, Watcher};
pub use wrapper::{PermissionsMask, Quota, StorageLayer, Wrapper};
