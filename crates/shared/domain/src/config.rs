use crate::arguments::Arguments;
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::Arc;

/// Top-level configuration: logging plus the ordered list of mounts to set up at boot.
#[derive(Default, Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FilesystemConfigInner {
    pub logging: LoggingConfig,
    pub mounts: Vec<MountConfig>,
}

/// Thin Arc-wrapped config for inexpensive cloning into subsystems.
#[derive(Default, Debug, Clone, Deserialize, Serialize)]
pub struct FilesystemConfig {
    #[serde(flatten, default)]
    inner: Arc<FilesystemConfigInner>,
}

impl Deref for FilesystemConfig {
    type Target = FilesystemConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for FilesystemConfig {
    fn deref_mut(&mut self) -> &mut FilesystemConfigInner {
        Arc::make_mut(&mut self.inner)
    }
}

/// Console/file logging knobs.
///
/// `path` enables rolling files named after `name`; `filter` takes `RUST_LOG` style directives
/// on top of `level`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub name: String,
    pub level: String,
    pub console: bool,
    pub json: bool,
    pub path: Option<PathBuf>,
    pub filter: Option<String>,
    pub rotation: LogRotation,
    pub max_files: usize,
}

/// How often the log file rolls over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Minutely,
    Hourly,
    #[default]
    Daily,
    Never,
}

/// One storage backend bound to one path.
///
/// `backend` names a constructor registered with the storage loader (`"local"`, `"home"`);
/// `arguments` are handed to it verbatim. `wrappers` are applied in declaration order, so the
/// last entry ends up outermost.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MountConfig {
    pub mount_point: String,
    pub backend: String,
    #[serde(default)]
    pub arguments: Arguments,
    #[serde(default)]
    pub wrappers: Vec<WrapperConfig>,
    #[serde(default)]
    pub options: Arguments,
}

impl MountConfig {
    #[must_use]
    pub fn new(mount_point: impl Into<String>, backend: impl Into<String>) -> Self {
        Self {
            mount_point: mount_point.into(),
            backend: backend.into(),
            arguments: Arguments::default(),
            wrappers: Vec::new(),
            options: Arguments::default(),
        }
    }

    #[must_use]
    pub fn arguments(mut self, arguments: Arguments) -> Self {
        self.arguments = arguments;
        self
    }

    #[must_use]
    pub fn wrapper(mut self, wrapper: WrapperConfig) -> Self {
        self.wrappers.push(wrapper);
        self
    }

    #[must_use]
    pub fn options(mut self, options: Arguments) -> Self {
        self.options = options;
        self
    }
}

/// A named wrapper layer and its arguments.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WrapperConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub arguments: Arguments,
}

impl WrapperConfig {
    #[must_use]
    pub fn new(kind: impl Into<String>, arguments: Arguments) -> Self {
        Self { kind: kind.into(), arguments }
    }
}

// --- Default ---

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            name: "fhub".to_owned(),
            level: "info".to_owned(),
            console: true,
            json: false,
            path: None,
            filter: None,
            rotation: LogRotation::Daily,
            max_files: 10,
        }
    }
}
