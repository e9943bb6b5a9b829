//! Facade crate for FileHub.
//! Re-exports the domain, kernel, storage and mount crates and composes them into one
//! [`Filesystem`] namespace.
//!
//! ## Usage
//! - Describe mounts in a [`FilesystemConfig`](domain::config::FilesystemConfig) (or a config
//!   file, see [`Filesystem::open`]).
//! - Call [`Filesystem::bootstrap`] once per request or task and work with absolute paths.

mod error;
mod filesystem;

pub use fhub_domain as domain;
pub use fhub_kernel as kernel;
pub use fhub_mount as mount;
pub use fhub_storage as storage;

pub use error::{FilesystemError, FilesystemErrorExt};
pub use filesystem::{Filesystem, MountFailurePolicy, Resolved};
