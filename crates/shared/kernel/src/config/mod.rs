use config::{Config, Environment, File};
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::info;

/// Prefix of environment overrides (`FHUB__LOGGING__LEVEL=debug`).
pub const ENV_PREFIX: &str = "FHUB";

/// Default config file stem, resolved against the working directory.
pub const DEFAULT_CONFIG: &str = "fhub";

#[fhub_derive::fhub_error]
pub enum ConfigError {
    #[error("Config error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },
}

/// Loads a configuration file and overlays `FHUB__`-prefixed environment variables.
///
/// Nested keys are separated by a double underscore, so `FHUB__LOGGING__LEVEL` maps to
/// `logging.level`. The file format is inferred from its extension (TOML, JSON, YAML); when no
/// path is given, `fhub.<ext>` in the working directory is used.
///
/// # Errors
/// Fails when the file cannot be found or parsed, or when its content does not match `T`.
pub fn load_config<T>(path: Option<impl AsRef<Path>>) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let effective_path =
        path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG), |p| p.as_ref().to_path_buf());

    let builder = Config::builder()
        .add_source(File::from(effective_path.as_path()).required(true))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__").try_parsing(true));

    info!("Loading config from {}", effective_path.display());

    let config = builder
        .build()
        .context("Failed to build config")?
        .try_deserialize::<T>()
        .context("Failed to deserialize config")?;

    Ok(config)
}
