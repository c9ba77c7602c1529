//! Tag: one position (plus optional extent) within referenced arrays.

use super::base_tag::{BaseTag, TagBase};
use super::block::{Block, BlockEntity};
use super::entity::{Entity, EntityCore, EntityWithMetadata, EntityWithSources};
use super::{RepoError, RepoResult};
use crate::model::entity::ObjectType;
use serde_json::{json, Value};
use std::path::PathBuf;

const ATTR_POSITION: &str = "position";
const ATTR_EXTENT: &str = "extent";

#[derive(Debug, Clone)]
pub struct Tag {
    base: TagBase,
}

impl Entity for Tag {
    fn core(&self) -> &EntityCore {
        self.base.core()
    }
}

impl EntityWithMetadata for Tag {}

impl EntityWithSources for Tag {
    fn owner_block(&self) -> &Block {
        self.base.block()
    }
}

impl BaseTag for Tag {
    fn tag_base(&self) -> &TagBase {
        &self.base
    }
}

impl BlockEntity for Tag {
    const KIND: ObjectType = ObjectType::Tag;

    fn open_in(block: &Block, location: PathBuf) -> Self {
        Self {
            base: TagBase::open(block, location),
        }
    }
}

impl Tag {
    pub(crate) fn create(
        block: &Block,
        location: PathBuf,
        id: &str,
        name: &str,
        entity_type: &str,
        position: Vec<f64>,
    ) -> RepoResult<Self> {
        check_coordinates("position", &position)?;
        let base = TagBase::create(
            block,
            location,
            ObjectType::Tag,
            id,
            name,
            entity_type,
            vec![(ATTR_POSITION, json!(position))],
        )?;
        Ok(Self { base })
    }

    pub fn position(&self) -> RepoResult<Vec<f64>> {
        let core = self.base.core();
        let _guard = core.ctx().read();
        Ok(core.attrs().require(ATTR_POSITION)?)
    }

    pub fn set_position(&self, position: Vec<f64>) -> RepoResult<()> {
        check_coordinates("position", &position)?;
        let core = self.base.core();
        let _guard = core.ctx().write()?;
        core.set_and_touch(ATTR_POSITION, json!(position))
    }

    /// Per-axis extent, or `None` for a point selection.
    pub fn extent(&self) -> RepoResult<Option<Vec<f64>>> {
        let core = self.base.core();
        let _guard = core.ctx().read();
        Ok(core.attrs().get(ATTR_EXTENT)?)
    }

    pub fn set_extent(&self, extent: Vec<f64>) -> RepoResult<()> {
        check_coordinates("extent", &extent)?;
        if extent.iter().any(|value| *value < 0.0) {
            return Err(RepoError::InvalidArgument(
                "extent must not be negative".into(),
            ));
        }
        let core = self.base.core();
        let _guard = core.ctx().write()?;
        core.set_and_touch(ATTR_EXTENT, json!(extent))
    }

    pub fn clear_extent(&self) -> RepoResult<()> {
        let core = self.base.core();
        let _guard = core.ctx().write()?;
        core.set_and_touch(ATTR_EXTENT, Value::Null)
    }
}

pub(crate) fn check_coordinates(what: &str, values: &[f64]) -> RepoResult<()> {
    if values.is_empty() {
        return Err(RepoError::InvalidArgument(format!("{what} must not be empty")));
    }
    if let Some(index) = values.iter().position(|value| !value.is_finite()) {
        return Err(RepoError::InvalidArgument(format!(
            "{what} component {index} is not finite"
        )));
    }
    Ok(())
}
