//! Feature link types.

use serde::{Deserialize, Serialize};

/// How a feature's data relates to the position of the tag owning it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    /// Feature data is sliced with the tag's own position and extent.
    Tagged,
    /// Feature data is returned in full, independent of the position.
    Untagged,
    /// Feature data is indexed by position number along its first axis.
    Indexed,
}
