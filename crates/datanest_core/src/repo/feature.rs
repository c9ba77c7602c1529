//! Feature: an owned attachment from a tag to one data array.
//!
//! # Invariants
//! - The target is stored as a data array id and resolved through the block on
//!   every access. A deleted target reads as `None`.
//! - The `data/` sub-location mirrors the stored id with one directory link.

use super::block::{Block, BlockEntity, EntityResolver};
use super::data_array::DataArray;
use super::entity::{Entity, EntityCore};
use super::{RepoError, RepoResult};
use crate::model::entity::{EntityId, NameOrId, ObjectType};
use crate::model::link_type::LinkType;
use serde_json::json;
use std::path::{Path, PathBuf};

const ATTR_LINK_TYPE: &str = "link_type";
const ATTR_DATA_ARRAY: &str = "data_array";
const DATA_DIR: &str = "data";

#[derive(Debug, Clone)]
pub struct Feature {
    core: EntityCore,
    block: Block,
}

impl Entity for Feature {
    fn core(&self) -> &EntityCore {
        &self.core
    }
}

impl Feature {
    pub(crate) fn open(block: &Block, location: PathBuf) -> Self {
        Self {
            core: EntityCore::open(block.ctx().clone(), location),
            block: block.clone(),
        }
    }

    pub(crate) fn create(
        block: &Block,
        location: PathBuf,
        id: &str,
        data_id: &str,
        data_location: &Path,
        link_type: LinkType,
    ) -> RepoResult<Self> {
        let core = EntityCore::create(
            block.ctx().clone(),
            location,
            ObjectType::Feature,
            id,
            id,
            None,
            vec![
                (ATTR_LINK_TYPE, json!(link_type)),
                (ATTR_DATA_ARRAY, json!(data_id)),
            ],
        )?;
        core.directory()
            .sub_dir(DATA_DIR)
            .create_link(data_location, data_id)?;
        Ok(Self {
            core,
            block: block.clone(),
        })
    }

    pub fn link_type(&self) -> RepoResult<LinkType> {
        let _guard = self.core.ctx().read();
        Ok(self.core.attrs().require(ATTR_LINK_TYPE)?)
    }

    pub fn set_link_type(&self, link_type: LinkType) -> RepoResult<()> {
        let _guard = self.core.ctx().write()?;
        self.core.set_and_touch(ATTR_LINK_TYPE, json!(link_type))
    }

    /// Id of the wrapped data array, even when that array has been deleted.
    pub fn data_id(&self) -> RepoResult<EntityId> {
        let _guard = self.core.ctx().read();
        Ok(self.core.attrs().require(ATTR_DATA_ARRAY)?)
    }

    /// The wrapped data array, or `None` once it has been deleted.
    pub fn data(&self) -> RepoResult<Option<DataArray>> {
        let _guard = self.core.ctx().read();
        self.data_unlocked()
    }

    pub(crate) fn data_unlocked(&self) -> RepoResult<Option<DataArray>> {
        let id: EntityId = self.core.attrs().require(ATTR_DATA_ARRAY)?;
        Ok(self
            .block
            .entity_location(ObjectType::DataArray, &id)?
            .map(|location| DataArray::open_in(&self.block, location)))
    }

    /// Points the feature at another data array of the same block.
    pub fn set_data(&self, key: impl Into<NameOrId>) -> RepoResult<()> {
        let _guard = self.core.ctx().write()?;
        let key = key.into();
        let id = self
            .block
            .resolve_id(ObjectType::DataArray, &key)?
            .ok_or_else(|| RepoError::not_found(ObjectType::DataArray, &key))?;
        let location = self
            .block
            .entity_location(ObjectType::DataArray, &id)?
            .ok_or_else(|| RepoError::not_found(ObjectType::DataArray, &key))?;

        let links = self.core.directory().sub_dir(DATA_DIR);
        links.clear()?;
        links.create_link(&location, &id)?;
        self.core.set_and_touch(ATTR_DATA_ARRAY, json!(id))
    }
}
