//! Hierarchical scientific data containers.
//!
//! Blocks own data arrays, tags and their annotations; sections hold
//! metadata trees. Everything persists as a directory tree with one
//! attribute record per entity.

pub mod config;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;

pub use config::{open_container, Backend, ContainerConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig};
pub use model::data_type::{DataType, Variant};
pub use model::dimension::{Dimension, RangeDimension, SampledDimension, SetDimension};
pub use model::entity::{EntityId, EntityRef, NameOrId, ObjectType};
pub use model::link_type::LinkType;
pub use repo::{
    BaseTag, Block, Column, DataArray, DataFile, DataFrame, Entity, EntityWithMetadata,
    EntityWithSources, Feature, Group, MultiTag, Property, RepoError, RepoResult, Section,
    Source, Tag,
};
pub use service::{ArrayIo, DataView, Selection, ValidationResult};
pub use store::{AttributeState, FileMode, StoreError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
