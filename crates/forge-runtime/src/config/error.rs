//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading the registry/runtime configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to read configuration file {path}: {source}")]
    ReadError { path: PathBuf, #[source] source: std::io::Error },

    #[error("failed to parse YAML configuration: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Validation(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
