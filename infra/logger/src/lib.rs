//! # Logger
//!
//! Installs the global `tracing` subscriber of the FileHub binaries from the `logging` section
//! of the configuration: console output, rolling files written through a non-blocking worker,
//! or both, filtered by the configured level plus optional `RUST_LOG` style directives.
//!
//! ```rust
//! use fhub_domain::config::LoggingConfig;
//! use fhub_logger::Logger;
//!
//! let config = LoggingConfig { level: "debug".to_owned(), ..LoggingConfig::default() };
//! let _logger = Logger::from_config(&config).unwrap();
//! tracing::debug!(mount_point = "/", "Mounted");
//! ```

mod error;

pub use crate::error::{LoggerError, LoggerErrorExt};
pub use tracing::level_filters::LevelFilter;

use fhub_domain::config::{LogRotation, LoggingConfig};
use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

const LOG_FILE_SUFFIX: &str = "log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Handle to the installed subscriber.
///
/// Holds the file writer's worker guard; pending file output is flushed when it is dropped.
#[must_use = "Dropping this handle stops the background log writer."]
#[derive(Debug)]
pub struct Logger {
    guard: Option<WorkerGuard>,
}

impl Logger {
    /// Validates `config` and installs the global subscriber.
    ///
    /// Nothing is installed when validation fails.
    ///
    /// # Errors
    /// - [`LoggerError::InvalidConfiguration`] for an empty name, an unknown level, an invalid
    ///   filter, no enabled output or `max_files == 0` with a file output.
    /// - [`LoggerError::Appender`] or [`LoggerError::Internal`] if the log directory is unusable.
    /// - [`LoggerError::Subscriber`] if a global subscriber is already installed.
    pub fn from_config(config: &LoggingConfig) -> Result<Self, LoggerError> {
        let filter = validate(config)?;

        let mut layers: Vec<BoxedLayer> = Vec::new();
        if config.console {
            layers.push(console_layer(config.json));
        }
        let guard = match &config.path {
            Some(path) => {
                let (file, guard) = file_layer(config, path)?;
                layers.push(file);
                Some(guard)
            },
            None => None,
        };

        tracing_subscriber::registry().with(layers).with(filter).try_init()?;
        tracing::debug!(name = %config.name, level = %config.level, "Logging initialized");
        Ok(Self { guard })
    }

    /// The file writer's guard, when logging to files.
    #[must_use]
    pub const fn guard(&self) -> Option<&WorkerGuard> {
        self.guard.as_ref()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        if self.guard.is_some() {
            tracing::info!("Logging system shutting down, flushing buffers...");
        }
    }
}

/// Parses a level name (`"trace"` … `"error"`, `"off"`), case-insensitively.
///
/// # Errors
/// [`LoggerError::InvalidConfiguration`] for anything else.
pub fn parse_level(level: &str) -> Result<LevelFilter, LoggerError> {
    level.trim().parse::<LevelFilter>().map_err(|e| LoggerError::InvalidConfiguration {
        message: format!("Invalid level '{level}': {e}").into(),
        context: None,
    })
}

/// Checks `config` and returns the filter it describes.
fn validate(config: &LoggingConfig) -> Result<EnvFilter, LoggerError> {
    let invalid = |message: &'static str| LoggerError::InvalidConfiguration {
        message: message.into(),
        context: Some(config.name.clone().into()),
    };

    if config.name.trim().is_empty() {
        return Err(invalid("Logger name cannot be empty"));
    }
    if !config.console && config.path.is_none() {
        return Err(invalid("No output enabled; set `console` or `path`"));
    }
    if config.path.is_some() && config.max_files == 0 {
        return Err(invalid("max_files must be greater than zero"));
    }

    let builder = EnvFilter::builder().with_default_directive(parse_level(&config.level)?.into());
    match &config.filter {
        Some(directives) => builder.parse(directives).map_err(|e| {
            LoggerError::InvalidConfiguration {
                message: format!("Invalid filter '{directives}': {e}").into(),
                context: Some(config.name.clone().into()),
            }
        }),
        None => Ok(builder.from_env_lossy()),
    }
}

fn console_layer(json: bool) -> BoxedLayer {
    let console = layer().with_ansi(!json);
    if json { console.json().boxed() } else { console.compact().boxed() }
}

fn file_layer(
    config: &LoggingConfig,
    path: &Path,
) -> Result<(BoxedLayer, WorkerGuard), LoggerError> {
    fs::create_dir_all(path).map_err(|e| LoggerError::Internal {
        message: e.to_string().into(),
        context: Some(format!("Failed to create log directory: {}", path.display()).into()),
    })?;

    let appender = RollingFileAppender::builder()
        .rotation(rotation(config.rotation))
        .filename_prefix(&config.name)
        .filename_suffix(LOG_FILE_SUFFIX)
        .max_log_files(config.max_files)
        .build(path)
        .context(path.display().to_string())?;

    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file = layer().with_writer(writer).with_ansi(false);
    let boxed = if config.json { file.json().boxed() } else { file.boxed() };
    Ok((boxed, guard))
}

const fn rotation(rotation: LogRotation) -> Rotation {
    match rotation {
        LogRotation::Minutely => Rotation::MINUTELY,
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Never => Rotation::NEVER,
    }
}
