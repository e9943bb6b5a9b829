//! Value types exchanged through the [`Storage`](crate::Storage) contract.

use crate::error::StorageError;
use sha2::{Digest as _, Sha256, Sha512};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::str::FromStr;
use std::task::{Context, Poll, ready};
use std::time::SystemTime;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncRead, AsyncSeek, AsyncWrite, ReadBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    File,
    Dir,
}

impl FileType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Dir => "dir",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subset of filesystem metadata every backend can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub kind: FileType,
    pub size: u64,
    pub mtime: SystemTime,
}

impl Stat {
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind == FileType::Dir
    }

    #[must_use]
    pub fn is_file(&self) -> bool {
        self.kind == FileType::File
    }
}

/// Free space reported by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeSpace {
    Known(u64),
    /// The backend cannot tell; writes are not limited by this layer.
    Unknown,
    Unlimited,
}

impl FreeSpace {
    #[must_use]
    pub const fn available(self) -> Option<u64> {
        match self {
            Self::Known(bytes) => Some(bytes),
            Self::Unknown | Self::Unlimited => None,
        }
    }

    /// Whether a write of `bytes` fits.
    #[must_use]
    pub const fn allows(self, bytes: u64) -> bool {
        match self {
            Self::Known(free) => bytes <= free,
            Self::Unknown | Self::Unlimited => true,
        }
    }
}

/// `fopen`-style access mode.
///
/// Parsed from `r`, `r+`, `w`, `w+`, `a`, `a+`, `x`, `x+`, `c`, `c+`; a `b` or `t` flag is
/// accepted and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct OpenMode {
    pub read: bool,
    pub write: bool,
    pub append: bool,
    pub truncate: bool,
    pub create: bool,
    pub create_new: bool,
}

impl OpenMode {
    pub const READ: Self = Self {
        read: true,
        write: false,
        append: false,
        truncate: false,
        create: false,
        create_new: false,
    };

    pub const WRITE: Self = Self {
        read: false,
        write: true,
        append: false,
        truncate: true,
        create: true,
        create_new: false,
    };

    #[must_use]
    pub const fn is_write(&self) -> bool {
        self.write || self.append
    }

    #[must_use]
    pub fn options(&self) -> OpenOptions {
        let mut options = OpenOptions::new();
        options
            .read(self.read)
            .write(self.write)
            .append(self.append)
            .truncate(self.truncate)
            .create(self.create)
            .create_new(self.create_new);
        options
    }
}

impl FromStr for OpenMode {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let base: String = s.chars().filter(|c| !matches!(*c, 'b' | 't')).collect();
        let plus = base.ends_with('+');
        let mode = match base.trim_end_matches('+') {
            "r" => Self { read: true, write: plus, ..Self::default() },
            "w" => Self { read: plus, write: true, truncate: true, create: true, ..Self::default() },
            "a" => Self { read: plus, append: true, create: true, ..Self::default() },
            "x" => Self { read: plus, write: true, create_new: true, ..Self::default() },
            "c" => Self { read: plus, write: true, create: true, ..Self::default() },
            _ => return Err(StorageError::unsupported(format!("Invalid open mode '{s}'"))),
        };
        if base.matches('+').count() > 1 {
            return Err(StorageError::unsupported(format!("Invalid open mode '{s}'")));
        }
        Ok(mode)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    #[must_use]
    pub fn digest(self, data: &[u8]) -> Digest {
        let bytes = match self {
            Self::Sha256 => Sha256::digest(data).to_vec(),
            Self::Sha512 => Sha512::digest(data).to_vec(),
        };
        Digest { algorithm: self, bytes }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            _ => Err(StorageError::unsupported(format!("Unknown hash algorithm '{s}'"))),
        }
    }
}

/// Raw digest bytes; `Display` renders lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    algorithm: HashAlgorithm,
    bytes: Vec<u8>,
}

impl Digest {
    #[must_use]
    pub const fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// A path usable by code that only understands the local filesystem.
///
/// Temporary copies are deleted when the value is dropped.
#[derive(Debug)]
pub enum LocalPath {
    /// The backend's own file or directory.
    Direct(PathBuf),
    TempFile(tempfile::TempPath),
    TempDir(tempfile::TempDir),
}

impl LocalPath {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Direct(path) => path.as_path(),
            Self::TempFile(path) => &**path,
            Self::TempDir(dir) => dir.path(),
        }
    }

    #[must_use]
    pub const fn is_temporary(&self) -> bool {
        !matches!(self, Self::Direct(_))
    }
}

impl AsRef<Path> for LocalPath {
    fn as_ref(&self) -> &Path {
        self.path()
    }
}

/// Byte stream returned by `fopen`.
///
/// A handle may carry a write budget; a write that does not fit fails with
/// [`io::ErrorKind::StorageFull`] and nothing of it reaches the file.
#[derive(Debug)]
pub struct FileHandle {
    file: File,
    mode: OpenMode,
    remaining: Option<u64>,
}

impl FileHandle {
    #[must_use]
    pub const fn new(file: File, mode: OpenMode) -> Self {
        Self { file, mode, remaining: None }
    }

    /// Caps the bytes still writable through this handle; an existing cap is only lowered.
    #[must_use]
    pub fn limit_writes(mut self, bytes: u64) -> Self {
        self.remaining = Some(self.remaining.map_or(bytes, |remaining| remaining.min(bytes)));
        self
    }

    /// Bytes still writable, if capped.
    #[must_use]
    pub const fn write_limit(&self) -> Option<u64> {
        self.remaining
    }

    #[must_use]
    pub const fn mode(&self) -> OpenMode {
        self.mode
    }

    #[must_use]
    pub fn into_inner(self) -> File {
        self.file
    }
}

impl AsyncRead for FileHandle {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_read(cx, buf)
    }
}

impl AsyncWrite for FileHandle {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let requested = u64::try_from(buf.len()).unwrap_or(u64::MAX);
        if let Some(remaining) = self.remaining
            && requested > remaining
        {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::StorageFull,
                format!("write of {requested} bytes exceeds the {remaining} bytes left"),
            )));
        }

        let written = ready!(Pin::new(&mut self.file).poll_write(cx, buf))?;
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.saturating_sub(u64::try_from(written).unwrap_or(u64::MAX));
        }
        Poll::Ready(Ok(written))
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_shutdown(cx)
    }
}

impl AsyncSeek for FileHandle {
    fn start_seek(mut self: Pin<&mut Self>, position: io::SeekFrom) -> io::Result<()> {
        Pin::new(&mut self.file).start_seek(position)
    }

    fn poll_complete(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        Pin::new(&mut self.file).poll_complete(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_open_modes() {
        let r: OpenMode = "r".parse().expect("r");
        assert!(r.read && !r.is_write());

        let rb: OpenMode = "rb".parse().expect("rb");
        assert_eq!(rb, r);

        let w_plus: OpenMode = "w+".parse().expect("w+");
        assert!(w_plus.read && w_plus.write && w_plus.truncate && w_plus.create);

        let a: OpenMode = "ab".parse().expect("ab");
        assert!(a.append && a.create && !a.read);

        let x: OpenMode = "x".parse().expect("x");
        assert!(x.create_new && !x.create);

        let c_plus: OpenMode = "c+".parse().expect("c+");
        assert!(c_plus.read && c_plus.write && c_plus.create && !c_plus.truncate);

        assert!("q".parse::<OpenMode>().is_err());
        assert!("r++".parse::<OpenMode>().is_err());
        assert!("".parse::<OpenMode>().is_err());
    }

    #[test]
    fn digests_render_as_hex() {
        let digest = HashAlgorithm::Sha256.digest(b"abc");
        assert_eq!(
            digest.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(digest.as_bytes().len(), 32);
        assert_eq!(HashAlgorithm::Sha512.digest(b"").as_bytes().len(), 64);
        assert_eq!("SHA-256".parse::<HashAlgorithm>().expect("alias"), HashAlgorithm::Sha256);
        assert!("md5".parse::<HashAlgorithm>().is_err());
    }

    #[test]
    fn free_space_limits_writes() {
        assert!(FreeSpace::Known(10).allows(10));
        assert!(!FreeSpace::Known(10).allows(11));
        assert!(FreeSpace::Unknown.allows(u64::MAX));
        assert_eq!(FreeSpace::Unlimited.available(), None);
    }
}
