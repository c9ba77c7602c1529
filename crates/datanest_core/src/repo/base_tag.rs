//! References and features shared by `Tag` and `MultiTag`.
//!
//! # Responsibility
//! - Keep the non-owning `references/` link set to data arrays.
//! - Own the `features/` collection and the feature lookup rules.
//! - Hold per-axis units shared by position and extent.
//!
//! # Invariants
//! - A reference or feature target must resolve in the owning block when the
//!   link is made.
//! - Feature lookup tries the feature's own id or name first, then the name or
//!   id of the data array each feature wraps.
//! - `set_references` resolves every key before unlinking anything.

use super::block::{Block, BlockEntity, EntityResolver};
use super::collection::Collection;
use super::data_array::DataArray;
use super::entity::{Entity, EntityCore, EntityWithSources};
use super::feature::Feature;
use super::link_set::LinkSet;
use super::{RepoError, RepoResult};
use crate::model::entity::{create_id, NameOrId, ObjectType};
use crate::model::link_type::LinkType;
use crate::model::units;
use serde_json::{json, Value};
use std::path::PathBuf;

const REFERENCES_DIR: &str = "references";
const ATTR_UNITS: &str = "units";

/// Storage shared by both tag kinds.
#[derive(Debug, Clone)]
pub struct TagBase {
    core: EntityCore,
    block: Block,
}

impl TagBase {
    pub(crate) fn open(block: &Block, location: PathBuf) -> Self {
        Self {
            core: EntityCore::open(block.ctx().clone(), location),
            block: block.clone(),
        }
    }

    pub(crate) fn create(
        block: &Block,
        location: PathBuf,
        kind: ObjectType,
        id: &str,
        name: &str,
        entity_type: &str,
        extra: Vec<(&str, Value)>,
    ) -> RepoResult<Self> {
        let core = EntityCore::create(
            block.ctx().clone(),
            location,
            kind,
            id,
            name,
            Some(entity_type),
            extra,
        )?;
        core.directory().sub_dir(REFERENCES_DIR).ensure()?;
        Ok(Self {
            core,
            block: block.clone(),
        })
    }

    pub fn core(&self) -> &EntityCore {
        &self.core
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    fn reference_links(&self) -> LinkSet {
        LinkSet::new(
            self.core.directory().sub_dir(REFERENCES_DIR),
            ObjectType::DataArray,
        )
    }

    fn feature_collection(&self) -> Collection {
        Collection::new(self.core.directory(), ObjectType::Feature)
    }

    /// Referenced arrays in ordinal order. Lock-free.
    pub(crate) fn references_unlocked(&self) -> RepoResult<Vec<DataArray>> {
        Ok(self
            .reference_links()
            .locations()?
            .into_iter()
            .map(|location| DataArray::open_in(&self.block, location))
            .collect())
    }

    pub(crate) fn units_unlocked(&self) -> RepoResult<Vec<String>> {
        Ok(self.core.attrs().get(ATTR_UNITS)?.unwrap_or_default())
    }

    /// Two-phase feature lookup. Lock-free.
    fn locate_feature(&self, key: &NameOrId) -> RepoResult<Option<PathBuf>> {
        let features = self.feature_collection();
        if let Some(location) = features.locate(key)? {
            return Ok(Some(location));
        }
        for location in features.locations()? {
            let feature = Feature::open(&self.block, location.clone());
            let Some(data) = feature.data_unlocked()? else {
                continue;
            };
            let data_core = data.core();
            let id_match = key.matches_id() && data_core.id_unlocked()? == key.value();
            let name_match = key.matches_name() && data_core.name_unlocked()? == key.value();
            if id_match || name_match {
                return Ok(Some(location));
            }
        }
        Ok(None)
    }
}

/// Reference and feature operations of `Tag` and `MultiTag`.
pub trait BaseTag: EntityWithSources {
    fn tag_base(&self) -> &TagBase;

    fn has_reference(&self, key: impl Into<NameOrId>) -> RepoResult<bool> {
        let base = self.tag_base();
        let _guard = base.core.ctx().read();
        base.reference_links().contains(&base.block, &key.into())
    }

    fn reference_count(&self) -> RepoResult<u64> {
        let base = self.tag_base();
        let _guard = base.core.ctx().read();
        base.reference_links().count()
    }

    /// Referenced array, or `None` when unresolved, not referenced or deleted.
    fn get_reference(&self, key: impl Into<NameOrId>) -> RepoResult<Option<DataArray>> {
        let base = self.tag_base();
        let _guard = base.core.ctx().read();
        Ok(base
            .reference_links()
            .get(&base.block, &key.into())?
            .map(|location| DataArray::open_in(&base.block, location)))
    }

    fn get_reference_at(&self, index: u64) -> RepoResult<DataArray> {
        let base = self.tag_base();
        let _guard = base.core.ctx().read();
        let location = base.reference_links().get_at(index)?;
        Ok(DataArray::open_in(&base.block, location))
    }

    fn references(&self) -> RepoResult<Vec<DataArray>> {
        let base = self.tag_base();
        let _guard = base.core.ctx().read();
        base.references_unlocked()
    }

    /// Links a data array of the owning block. Adding it twice is a no-op.
    fn add_reference(&self, key: impl Into<NameOrId>) -> RepoResult<()> {
        let base = self.tag_base();
        let _guard = base.core.ctx().write()?;
        if base.reference_links().add(&base.block, &key.into())? {
            base.core.touch()?;
        }
        Ok(())
    }

    /// Unlinks a data array; the array itself is kept.
    fn remove_reference(&self, key: impl Into<NameOrId>) -> RepoResult<bool> {
        let base = self.tag_base();
        let _guard = base.core.ctx().write()?;
        let removed = base.reference_links().remove(&key.into())?;
        if removed {
            base.core.touch()?;
        }
        Ok(removed)
    }

    /// Replaces all references with `keys`.
    fn set_references<I, K>(&self, keys: I) -> RepoResult<()>
    where
        I: IntoIterator<Item = K>,
        K: Into<NameOrId>,
    {
        let keys: Vec<NameOrId> = keys.into_iter().map(Into::into).collect();
        let base = self.tag_base();
        let _guard = base.core.ctx().write()?;
        base.reference_links().replace(&base.block, &keys)?;
        base.core.touch()
    }

    fn has_feature(&self, key: impl Into<NameOrId>) -> RepoResult<bool> {
        let base = self.tag_base();
        let _guard = base.core.ctx().read();
        Ok(base.locate_feature(&key.into())?.is_some())
    }

    fn feature_count(&self) -> RepoResult<u64> {
        let base = self.tag_base();
        let _guard = base.core.ctx().read();
        base.feature_collection().count()
    }

    /// Finds a feature by its own id or name, else by its data array's.
    fn get_feature(&self, key: impl Into<NameOrId>) -> RepoResult<Option<Feature>> {
        let base = self.tag_base();
        let _guard = base.core.ctx().read();
        Ok(base
            .locate_feature(&key.into())?
            .map(|location| Feature::open(&base.block, location)))
    }

    fn get_feature_at(&self, index: u64) -> RepoResult<Feature> {
        let base = self.tag_base();
        let _guard = base.core.ctx().read();
        let location = base.feature_collection().location_at(index)?;
        Ok(Feature::open(&base.block, location))
    }

    fn features(&self) -> RepoResult<Vec<Feature>> {
        let base = self.tag_base();
        let _guard = base.core.ctx().read();
        Ok(base
            .feature_collection()
            .locations()?
            .into_iter()
            .map(|location| Feature::open(&base.block, location))
            .collect())
    }

    /// Attaches a data array of the owning block as a new feature.
    fn create_feature(&self, key: impl Into<NameOrId>, link_type: LinkType) -> RepoResult<Feature> {
        let base = self.tag_base();
        let _guard = base.core.ctx().write()?;
        let key = key.into();
        let data_id = base
            .block
            .resolve_id(ObjectType::DataArray, &key)?
            .ok_or_else(|| RepoError::not_found(ObjectType::DataArray, &key))?;
        let data_location = base
            .block
            .entity_location(ObjectType::DataArray, &data_id)?
            .ok_or_else(|| RepoError::not_found(ObjectType::DataArray, &key))?;

        let id = create_id();
        let location = base.feature_collection().allocate(&id);
        let feature = Feature::create(
            &base.block,
            location,
            &id,
            &data_id,
            &data_location,
            link_type,
        )?;
        base.core.touch()?;
        Ok(feature)
    }

    /// Deletes the feature's own storage. The wrapped data array is kept.
    fn delete_feature(&self, key: impl Into<NameOrId>) -> RepoResult<bool> {
        let base = self.tag_base();
        let _guard = base.core.ctx().write()?;
        let Some(location) = base.locate_feature(&key.into())? else {
            return Ok(false);
        };
        let id = EntityCore::open(base.core.ctx().clone(), &location).id_unlocked()?;
        let deleted = base.feature_collection().delete(&NameOrId::Id(id))?;
        if deleted {
            base.core.touch()?;
        }
        Ok(deleted)
    }

    /// Per-axis units of position and extent. Empty when never set.
    fn units(&self) -> RepoResult<Vec<String>> {
        let base = self.tag_base();
        let _guard = base.core.ctx().read();
        base.units_unlocked()
    }

    fn set_units(&self, axis_units: Vec<String>) -> RepoResult<()> {
        let base = self.tag_base();
        let _guard = base.core.ctx().write()?;
        for unit in &axis_units {
            if !units::is_unitless(Some(unit)) && units::parse_si_unit(unit).is_none() {
                return Err(RepoError::InvalidArgument(format!(
                    "`{unit}` is not an atomic SI unit"
                )));
            }
        }
        base.core.set_and_touch(ATTR_UNITS, json!(axis_units))
    }

    fn clear_units(&self) -> RepoResult<()> {
        let base = self.tag_base();
        let _guard = base.core.ctx().write()?;
        base.core.set_and_touch(ATTR_UNITS, Value::Null)
    }
}
