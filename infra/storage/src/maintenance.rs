use fhub_kernel::SAFE_ALPHABET;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{error, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Infix of the part files writes go through before the final rename.
pub const PART_FILE_MARKER: &str = ".fhubpart.";

/// Part files older than this are considered orphaned.
pub(crate) const STALE_AFTER: Duration = Duration::from_secs(300);

/// Length of the random suffix after [`PART_FILE_MARKER`].
pub const PART_ID_LEN: usize = 12;

/// Whether `name` is a part file left by an in-flight or interrupted write.
///
/// Only the exact generated shape matches: `<name>.fhubpart.<id>` with a [`PART_ID_LEN`]
/// character id drawn from the kernel's safe alphabet.
#[must_use]
pub fn is_part_file(name: &str) -> bool {
    name.rsplit_once(PART_FILE_MARKER).is_some_and(|(stem, id)| {
        !stem.is_empty()
            && id.chars().count() == PART_ID_LEN
            && id.chars().all(|c| SAFE_ALPHABET.contains(&c))
    })
}

/// A fresh part file next to `target`.
pub(crate) fn part_path(target: &Path) -> PathBuf {
    let id = fhub_kernel::safe_nanoid!(PART_ID_LEN);
    let file_name = target.file_name().and_then(|s| s.to_str()).unwrap_or("storage");
    target.with_file_name(format!("{file_name}{PART_FILE_MARKER}{id}"))
}

pub(crate) async fn purge_parts(root: &Path) {
    let root = root.to_path_buf();
    let now = SystemTime::now();

    match tokio::task::spawn_blocking(move || remove_stale(&root, now, STALE_AFTER)).await {
        Ok((removed, failed)) if removed > 0 || failed > 0 => {
            info!(removed, failed, "Cleaned up stale part files");
        },
        Err(e) => {
            error!(error = %e, "Part file cleanup task panicked");
        },
        _ => {},
    }
}

fn remove_stale(root: &Path, now: SystemTime, threshold: Duration) -> (usize, usize) {
    let mut removed = 0;
    let mut failed = 0;

    WalkDir::new(root)
        .into_iter()
        .flatten()
        .filter(|e| e.file_type().is_file() && is_part(e) && is_stale(e, now, threshold))
        .for_each(|entry| match std::fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "Failed to remove part file");
                failed += 1;
            },
        });

    (removed, failed)
}

fn is_part(entry: &DirEntry) -> bool {
    entry.file_name().to_str().is_some_and(is_part_file)
}

fn is_stale(entry: &DirEntry, now: SystemTime, threshold: Duration) -> bool {
    entry
        .metadata()
        .ok()
        .and_then(|m| m.modified().ok())
        .and_then(|modified| now.duration_since(modified).ok())
        .is_none_or(|age| age > threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_names_match_generated_shape_only() {
        let generated = part_path(Path::new("/data/a.txt"));
        let name = generated.file_name().and_then(|n| n.to_str()).expect("utf-8 name");
        assert!(name.starts_with("a.txt.fhubpart."));
        assert!(is_part_file(name));
        assert_ne!(generated, part_path(Path::new("/data/a.txt")));

        assert!(is_part_file("a.txt.fhubpart.ABCDEFGHJKLM"));
        assert!(!is_part_file("notes.fhubpart.txt"));
        assert!(!is_part_file("a.fhubpart.ABCDEFGHJKL0"));
        assert!(!is_part_file(".fhubpart.ABCDEFGHJKLM"));
        assert!(!is_part_file("a.txt.fhubpart.1"));
        assert!(!is_part_file("plain.txt"));
    }

    #[test]
    fn removes_only_stale_part_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(dir.path().join("sub")).expect("mkdir");
        std::fs::write(dir.path().join("sub/a.txt.fhubpart.ABCDEFGHJKLM"), b"x").expect("part");
        std::fs::write(dir.path().join("sub/a.txt"), b"x").expect("file");
        std::fs::write(dir.path().join("sub/notes.fhubpart.txt"), b"x").expect("user file");

        let later = SystemTime::now() + Duration::from_secs(600);
        let (removed, failed) = remove_stale(dir.path(), later, STALE_AFTER);
        assert_eq!((removed, failed), (1, 0));
        assert!(dir.path().join("sub/a.txt").exists());
        assert!(dir.path().join("sub/notes.fhubpart.txt").exists());
        assert!(dir.path().join("sub").is_dir());

        std::fs::write(dir.path().join("b.fhubpart.23456789abcd"), b"x").expect("fresh part");
        let (removed, _) = remove_stale(dir.path(), SystemTime::now(), STALE_AFTER);
        assert_eq!(removed, 0);
    }
}
