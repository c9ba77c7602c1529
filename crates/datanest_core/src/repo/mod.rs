//! Entity layer over the directory store.
//!
//! # Responsibility
//! - Give every entity kind a handle type backed by one store location.
//! - Route cross-entity links (references, features, group members,
//!   sources, metadata) through the owning block's resolver.
//!
//! # Invariants
//! - Link targets must exist when a link is created; afterwards a deleted
//!   target reads as absent, never as an error.
//! - Removing a link never deletes its target. Deleting an owned child
//!   (feature, dimension, nested section) deletes its storage.
//! - Public methods take the container lock; crate-internal helpers assume
//!   the caller already holds it.

use crate::model::dimension::DimensionValidationError;
use crate::model::entity::{NameOrId, ObjectType};
use crate::store::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod base_tag;
mod block;
mod collection;
mod data_array;
mod data_frame;
mod entity;
mod feature;
mod file;
mod group;
mod link_set;
mod multi_tag;
mod section;
mod source;
mod tag;

pub use base_tag::{BaseTag, TagBase};
pub use block::{Block, BlockEntity, EntityResolver};
pub use data_array::DataArray;
pub use data_frame::{Column, DataFrame};
pub use entity::{Entity, EntityCore, EntityWithMetadata, EntityWithSources};
pub use feature::Feature;
pub use file::{DataFile, FORMAT_NAME, FORMAT_VERSION};
pub use group::{Group, GroupMember};
pub use multi_tag::MultiTag;
pub use section::{Property, Section};
pub use source::Source;
pub use tag::Tag;

pub type RepoResult<T> = Result<T, RepoError>;

/// Domain error for entity operations.
#[derive(Debug)]
pub enum RepoError {
    /// Referenced or linked entity is absent or did not resolve.
    NotFound { kind: ObjectType, key: String },
    /// Index or position outside the valid range of a dimension or array.
    OutOfBounds { message: String, index: u64 },
    /// Unit or dimensionality mismatch between a query and a descriptor.
    IncompatibleDimension(String),
    /// Mutation rejected by the current state of the entity or container.
    InvalidState(String),
    /// Caller input rejected before touching storage.
    InvalidArgument(String),
    /// Configured backend is not provided by this crate.
    UnsupportedBackend(String),
    /// Filesystem or encoding failure.
    Store(StoreError),
}

impl RepoError {
    pub(crate) fn not_found(kind: ObjectType, key: &NameOrId) -> Self {
        Self::NotFound {
            kind,
            key: key.value().to_string(),
        }
    }

    pub(crate) fn out_of_bounds(message: impl Into<String>, index: u64) -> Self {
        Self::OutOfBounds {
            message: message.into(),
            index,
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { kind, key } => write!(f, "{kind} not found: {key}"),
            Self::OutOfBounds { message, index } => {
                write!(f, "out of bounds at index {index}: {message}")
            }
            Self::IncompatibleDimension(message) => {
                write!(f, "incompatible dimension: {message}")
            }
            Self::InvalidState(message) => write!(f, "invalid state: {message}"),
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::UnsupportedBackend(name) => write!(f, "unsupported backend: {name}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for RepoError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::ReadOnly(root) => Self::InvalidState(format!(
                "container `{}` is opened read-only",
                root.display()
            )),
            other => Self::Store(other),
        }
    }
}

impl From<DimensionValidationError> for RepoError {
    fn from(value: DimensionValidationError) -> Self {
        Self::InvalidArgument(value.to_string())
    }
}
