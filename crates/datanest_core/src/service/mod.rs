//! Read-side services built on the entity layer.
//!
//! # Responsibility
//! - Translate physical positions into array indices and selections.
//! - Produce lazy data views and container validation reports.
//!
//! # Invariants
//! - Each service call holds the container read lock for its whole run, so
//!   it never observes a half-applied replace-all.

pub mod data_access;
pub mod data_view;
pub mod validate;

pub use data_access::{
    multi_tag_offset_and_count, multi_tag_offsets_and_counts, position_and_extent_in_data,
    position_in_data, position_to_index, positions_to_indices, range_position_to_index,
    retrieve_multi_tag_data, retrieve_multi_tag_data_from, retrieve_multi_tag_feature_data,
    retrieve_multi_tag_feature_data_for, retrieve_multi_tag_features_data, retrieve_tag_data,
    retrieve_tag_data_from, retrieve_tag_feature_data, retrieve_tag_feature_data_for,
    sampled_position_to_index, set_position_to_index, tag_offset_and_count,
};
pub use data_view::{ArrayIo, DataView, Selection};
pub use validate::{validate_file, ValidationMessage, ValidationResult};
