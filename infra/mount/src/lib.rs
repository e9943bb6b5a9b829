//! Mounting for FileHub.
//!
//! A [`MountPoint`] binds one storage to one absolute path prefix; a [`MountManager`] holds the
//! mounts of a request and resolves absolute paths to `(mount, internal path)` pairs by
//! longest-prefix match.
//!
//! # Examples
//!
//! ```rust
//! use fhub_domain::Arguments;
//! use fhub_domain::config::MountConfig;
//! use fhub_mount::{MountManager, MountPoint};
//! use fhub_storage::{Loader, Storage};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     # let tmp = tempfile::tempdir()?;
//!     # let datadir = |name: &str| tmp.path().join(name).to_string_lossy().into_owned();
//!     let loader = Loader::with_defaults();
//!     let mut mounts = MountManager::new();
//!
//!     let root = MountConfig::new("/", "local")
//!         .arguments(Arguments::new().with("datadir", datadir("root")).with("create", true));
//!     let home = MountConfig::new("/bob", "home").arguments(
//!         Arguments::new().with("user", "bob").with("datadir", datadir("bob")).with("create", true),
//!     );
//!     mounts.add_mount(MountPoint::from_config(&root, &loader).await?);
//!     mounts.add_mount(MountPoint::from_config(&home, &loader).await?);
//!
//!     let mount = mounts.find("/bob/docs/a.txt")?;
//!     assert_eq!(mount.mount_point(), "/bob");
//!     assert_eq!(mount.internal_path("/bob/docs/a.txt"), "docs/a.txt");
//!     assert_eq!(mount.storage().owner("docs/a.txt").await?.as_deref(), Some("bob"));
//!     Ok(())
//! }
//! ```

mod error;
mod manager;
mod mount_point;

pub use error::{MountError, MountErrorExt};
pub use manager::MountManager;
pub use mount_point::{MountPoint, normalize_mount_path};
