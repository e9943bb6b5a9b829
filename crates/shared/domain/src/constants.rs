//! Well-known identifiers shared by configuration files and the storage layer.

/// Backend identifier of the local-disk storage.
pub const LOCAL: &str = "local";
/// Backend identifier of the per-user home storage.
pub const HOME: &str = "home";

/// Wrapper layer restricting permissions by bit mask.
pub const PERMISSIONS_LAYER: &str = "permissions";
/// Wrapper layer enforcing a byte quota.
pub const QUOTA_LAYER: &str = "quota";

/// Mime type reported for directories.
pub const DIRECTORY_MIME: &str = "httpd/unix-directory";
/// Mime type reported when nothing better is known.
pub const DEFAULT_MIME: &str = "application/octet-stream";

/// Separator between the backend kind and its discriminator in a storage id.
pub const STORAGE_ID_SEPARATOR: &str = "::";

/// Path of the root mount.
pub const ROOT: &str = "/";
