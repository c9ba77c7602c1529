//! Directory-backed storage primitives.
//!
//! # Responsibility
//! - Map one entity to one directory and enumerate its children.
//! - Persist typed attribute records next to each entity.
//! - Create and remove directory links between entity locations.
//!
//! # Invariants
//! - Child enumeration order is sorted by entry name and stable across opens.
//! - Dangling links are skipped during resolution and counting.
//! - Attribute records are replaced atomically, never edited in place.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};

mod attributes;
mod context;
mod directory;

pub use attributes::{AttributeState, AttributedDirectory, ATTRIBUTES_FILE};
pub use context::{FileContext, FileMode};
pub use directory::Directory;

pub type StoreResult<T> = Result<T, StoreError>;

/// Transport-level failure from the filesystem layer.
#[derive(Debug)]
pub enum StoreError {
    /// Filesystem call failed (permission, exhaustion, missing parent...).
    Io { path: PathBuf, source: io::Error },
    /// Attribute record could not be encoded or decoded.
    Encoding {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// On-disk state does not match the expected layout.
    InvalidData(String),
    /// A mutation was attempted on a container opened read-only.
    ReadOnly(PathBuf),
}

impl StoreError {
    pub(crate) fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub(crate) fn encoding(path: impl AsRef<Path>, source: serde_json::Error) -> Self {
        Self::Encoding {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "i/o failure at `{}`: {source}", path.display()),
            Self::Encoding { path, source } => {
                write!(f, "invalid attribute record `{}`: {source}", path.display())
            }
            Self::InvalidData(message) => write!(f, "invalid stored data: {message}"),
            Self::ReadOnly(root) => {
                write!(f, "container `{}` is opened read-only", root.display())
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Encoding { source, .. } => Some(source),
            Self::InvalidData(_) | Self::ReadOnly(_) => None,
        }
    }
}
