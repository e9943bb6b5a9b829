use std::borrow::Cow;
use std::io::ErrorKind;

/// A specialized [`StorageError`] enum of this crate.
///
/// "Not found" is only an error for operations that need the path to exist; metadata queries
/// report a missing path as `Ok(None)` / `Ok(false)`.
#[fhub_derive::fhub_error]
pub enum StorageError {
    #[error("Invalid storage configuration{}: {message}", format_context(.context))]
    Configuration { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Path not found{}: {path}", format_context(.context))]
    NotFound { path: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Permission denied{}: {path}", format_context(.context))]
    PermissionDenied { path: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Path already exists{}: {path}", format_context(.context))]
    AlreadyExists { path: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Storage unavailable{}: {message}", format_context(.context))]
    Unavailable { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error(
        "Quota exceeded{}: {path} needs {requested} bytes, {available} available",
        format_context(.context)
    )]
    QuotaExceeded {
        path: Cow<'static, str>,
        requested: u64,
        available: u64,
        context: Option<Cow<'static, str>>,
    },

    #[error("Path traversal security violation{}: {path}", format_context(.context))]
    InvalidPath { path: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Unsupported operation{}: {message}", format_context(.context))]
    Unsupported { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Hardware I/O failure{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Internal storage error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl StorageError {
    pub fn not_found(path: impl Into<Cow<'static, str>>) -> Self {
        Self::NotFound { path: path.into(), context: None }
    }

    pub fn permission_denied(path: impl Into<Cow<'static, str>>) -> Self {
        Self::PermissionDenied { path: path.into(), context: None }
    }

    pub fn already_exists(path: impl Into<Cow<'static, str>>) -> Self {
        Self::AlreadyExists { path: path.into(), context: None }
    }

    pub fn invalid_path(path: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidPath { path: path.into(), context: None }
    }

    pub fn configuration(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Configuration { message: message.into(), context: None }
    }

    pub fn unsupported(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Unsupported { message: message.into(), context: None }
    }

    /// Classifies an I/O error for `path`, keeping permission failures apart from missing paths.
    pub fn from_io(err: std::io::Error, path: &str) -> Self {
        match err.kind() {
            ErrorKind::NotFound => Self::not_found(path.to_owned()),
            ErrorKind::PermissionDenied => Self::permission_denied(path.to_owned()),
            ErrorKind::AlreadyExists => Self::already_exists(path.to_owned()),
            ErrorKind::TimedOut | ErrorKind::WouldBlock => Self::Unavailable {
                message: err.to_string().into(),
                context: Some(path.to_owned().into()),
            },
            _ => Self::Io { source: err, context: Some(path.to_owned().into()) },
        }
    }

    /// Whether retrying the same call may succeed. Permission, quota and configuration failures
    /// are never transient.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable { .. } => true,
            Self::Io { source, .. } => matches!(
                source.kind(),
                ErrorKind::TimedOut
                    | ErrorKind::Interrupted
                    | ErrorKind::WouldBlock
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
            ),
            _ => false,
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
