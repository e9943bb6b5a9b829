use fhub_kernel::config::ConfigError;
use fhub_mount::MountError;
use fhub_storage::StorageError;
use std::borrow::Cow;

#[fhub_derive::fhub_error]
pub enum FilesystemError {
    #[error("Configuration failure{}: {source}", format_context(.context))]
    Config { source: ConfigError, context: Option<Cow<'static, str>> },

    #[error("Mount failure{}: {source}", format_context(.context))]
    Mount { source: MountError, context: Option<Cow<'static, str>> },

    #[error("Storage failure{}: {source}", format_context(.context))]
    Storage { source: StorageError, context: Option<Cow<'static, str>> },

    #[error("Refusing to modify mount root{}: {path}", format_context(.context))]
    MountRoot { path: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl FilesystemError {
    /// The storage error behind this one, looking through mount errors.
    #[must_use]
    pub const fn storage_error(&self) -> Option<&StorageError> {
        match self {
            Self::Storage { source, .. } => Some(source),
            Self::Mount { source, .. } => source.storage_error(),
            _ => None,
        }
    }
}
