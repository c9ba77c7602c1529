//! Backend-neutral value types for the entity graph.
//!
//! # Responsibility
//! - Define identity, lookup keys and object kinds shared by every entity.
//! - Define per-axis dimension descriptors, link types and value types.
//!
//! # Invariants
//! - Ids are opaque strings, generated once and never reassigned.
//! - Names are display values only; they are not unique.

pub mod data_type;
pub mod dimension;
pub mod entity;
pub mod link_type;
pub mod units;
