//! Identity and lookup primitives.
//!
//! # Invariants
//! - `EntityId` values are generated from random v4 UUIDs and never reused.
//! - Lookup by [`NameOrId::Any`] tries an exact id match before a name scan.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Opaque, process-wide unique entity identifier.
pub type EntityId = String;

/// Unix epoch milliseconds.
pub type Timestamp = i64;

/// Generates a fresh entity id.
pub fn create_id() -> EntityId {
    Uuid::new_v4().to_string()
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_epoch_ms() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Fixed kind of a persisted object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    File,
    Block,
    DataArray,
    DataFrame,
    Tag,
    MultiTag,
    Group,
    Source,
    Feature,
    Section,
    Property,
}

impl ObjectType {
    /// Name of the sub-location that holds a collection of this kind.
    pub fn collection_name(self) -> &'static str {
        match self {
            Self::File => "files",
            Self::Block => "blocks",
            Self::DataArray => "data_arrays",
            Self::DataFrame => "data_frames",
            Self::Tag => "tags",
            Self::MultiTag => "multi_tags",
            Self::Group => "groups",
            Self::Source => "sources",
            Self::Feature => "features",
            Self::Section => "sections",
            Self::Property => "properties",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Block => "block",
            Self::DataArray => "data_array",
            Self::DataFrame => "data_frame",
            Self::Tag => "tag",
            Self::MultiTag => "multi_tag",
            Self::Group => "group",
            Self::Source => "source",
            Self::Feature => "feature",
            Self::Section => "section",
            Self::Property => "property",
        }
    }
}

impl Display for ObjectType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied lookup key.
///
/// Plain strings convert to [`NameOrId::Any`], which matches the way most
/// call sites pass "a name or an id".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NameOrId {
    /// Exact id match only.
    Id(EntityId),
    /// Linear scan over names only; the first match wins.
    Name(String),
    /// Exact id first, then name scan.
    Any(String),
}

impl NameOrId {
    pub fn value(&self) -> &str {
        match self {
            Self::Id(value) | Self::Name(value) | Self::Any(value) => value,
        }
    }

    pub fn matches_id(&self) -> bool {
        matches!(self, Self::Id(_) | Self::Any(_))
    }

    pub fn matches_name(&self) -> bool {
        matches!(self, Self::Name(_) | Self::Any(_))
    }
}

impl From<&str> for NameOrId {
    fn from(value: &str) -> Self {
        Self::Any(value.to_string())
    }
}

impl From<String> for NameOrId {
    fn from(value: String) -> Self {
        Self::Any(value)
    }
}

impl From<&String> for NameOrId {
    fn from(value: &String) -> Self {
        Self::Any(value.clone())
    }
}

impl From<&NameOrId> for NameOrId {
    fn from(value: &NameOrId) -> Self {
        value.clone()
    }
}

impl Display for NameOrId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(value) => write!(f, "id `{value}`"),
            Self::Name(value) => write!(f, "name `{value}`"),
            Self::Any(value) => write!(f, "`{value}`"),
        }
    }
}

/// A lookup key bound to the object kind it should resolve against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub kind: ObjectType,
    pub key: NameOrId,
}

impl EntityRef {
    pub fn new(kind: ObjectType, key: impl Into<NameOrId>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{create_id, now_epoch_ms, NameOrId, ObjectType};

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(create_id(), create_id());
    }

    #[test]
    fn plain_strings_convert_to_any_lookup() {
        let key = NameOrId::from("spikes");
        assert!(key.matches_id());
        assert!(key.matches_name());
        assert!(!NameOrId::Name("spikes".into()).matches_id());
    }

    #[test]
    fn collection_names_are_distinct() {
        let kinds = [
            ObjectType::DataArray,
            ObjectType::DataFrame,
            ObjectType::Tag,
            ObjectType::MultiTag,
        ];
        let mut names: Vec<_> = kinds.iter().map(|kind| kind.collection_name()).collect();
        names.dedup();
        assert_eq!(names.len(), kinds.len());
    }

    #[test]
    fn clock_is_after_2020() {
        assert!(now_epoch_ms() > 1_577_836_800_000);
    }
}
