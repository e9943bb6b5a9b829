use fhub_storage::StorageError;
use std::borrow::Cow;

#[fhub_derive::fhub_error]
pub enum MountError {
    #[error("No mount covers path{}: {path}", format_context(.context))]
    NoRootMount { path: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("No mount at{}: {path}", format_context(.context))]
    NotFound { path: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Mount point already taken{}: {path}", format_context(.context))]
    Conflict { path: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Storage failure{}: {source}", format_context(.context))]
    Storage { source: StorageError, context: Option<Cow<'static, str>> },
}

impl MountError {
    /// The storage error behind this one, if any.
    #[must_use]
    pub const fn storage_error(&self) -> Option<&StorageError> {
        match self {
            Self::Storage { source, .. } => Some(source),
            _ => None,
        }
    }
}
