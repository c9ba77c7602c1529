//! Container configuration and backend selection.
//!
//! # Responsibility
//! - Parse container settings from JSON with defaults for missing fields.
//! - Map the configured backend to a concrete container implementation.

use crate::logging::{init_logging, LoggingConfig};
use crate::repo::{DataFile, RepoError, RepoResult};
use crate::store::FileMode;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Storage backend of a container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Directory tree with JSON attribute records.
    #[default]
    FileSystem,
    /// Single-file hierarchical backend, provided outside this crate.
    Hdf5,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FileSystem => "file_system",
            Self::Hdf5 => "hdf5",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    pub backend: Backend,
    pub mode: FileMode,
    pub logging: Option<LoggingConfig>,
}

impl ContainerConfig {
    pub fn new(backend: Backend, mode: FileMode) -> Self {
        Self {
            backend,
            mode,
            logging: None,
        }
    }

    /// Parses a JSON document such as `{"backend": "file_system", "mode": "read_only"}`.
    pub fn from_json_str(raw: &str) -> RepoResult<Self> {
        serde_json::from_str(raw)
            .map_err(|err| RepoError::InvalidArgument(format!("invalid container config: {err}")))
    }
}

/// Opens the container at `path` with the configured backend.
///
/// Starts logging first when the config carries a `logging` section.
///
/// # Errors
/// - `UnsupportedBackend` for backends this crate does not implement.
/// - `InvalidState` when logging is already active with another config.
/// - Any error of [`DataFile::open`].
pub fn open_container(path: impl AsRef<Path>, config: &ContainerConfig) -> RepoResult<DataFile> {
    if let Some(logging) = &config.logging {
        init_logging(logging).map_err(RepoError::InvalidState)?;
    }
    info!(
        "event=backend_select module=config status=ok backend={} mode={:?}",
        config.backend.as_str(),
        config.mode
    );
    match config.backend {
        Backend::FileSystem => DataFile::open(path, config.mode),
        Backend::Hdf5 => Err(RepoError::UnsupportedBackend(
            config.backend.as_str().to_string(),
        )),
    }
}
