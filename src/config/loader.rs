//! Configuration loading from disk.
//!
//! Loading is a three-step pipeline: read the file, deserialize the
//! TOML, run semantic validation. Every error carries the offending
//! path so a misconfigured deployment is diagnosable from the message
//! alone.

use crate::config::schema::RelayConfig;
use crate::config::validation::{validate_config, ValidationError};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Failure to produce a usable [`RelayConfig`] from a file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load, deserialize, and validate a TOML configuration file.
pub fn load_config(path: &Path) -> Result<RelayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: RelayConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    info!(
        path = %path.display(),
        backends = config.backends.configured_ids().len(),
        "configuration loaded"
    );
    Ok(config)
}
