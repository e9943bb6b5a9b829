//! Helpers for storage-internal paths.
//!
//! Internal paths are relative, `/`-separated and carry no leading or trailing separator; the
//! storage root is the empty string.

/// Collapses duplicate separators and `.` segments and strips leading/trailing slashes.
///
/// `..` is kept verbatim; backends reject it when resolving against their sandbox.
#[must_use]
pub fn normalize(path: &str) -> String {
    path.split('/').filter(|seg| !seg.is_empty() && *seg != ".").collect::<Vec<_>>().join("/")
}

/// Parent of an internal path; the root's parent is the root itself.
#[must_use]
pub fn parent(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(parent, _)| parent)
}

/// Last component of an internal path.
#[must_use]
pub fn basename(path: &str) -> &str {
    path.rsplit_once('/').map_or(path, |(_, name)| name)
}

/// Joins an internal directory path and a child name.
#[must_use]
pub fn join(dir: &str, name: &str) -> String {
    match (dir.is_empty(), name.is_empty()) {
        (true, _) => name.to_owned(),
        (_, true) => dir.to_owned(),
        _ => format!("{dir}/{name}"),
    }
}

/// Whether `path` equals `ancestor` or lies below it, comparing whole components.
#[must_use]
pub fn is_within(path: &str, ancestor: &str) -> bool {
    ancestor.is_empty()
        || path == ancestor
        || path.strip_prefix(ancestor).is_some_and(|rest| rest.starts_with('/'))
}
