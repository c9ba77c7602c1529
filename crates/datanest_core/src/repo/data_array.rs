//! DataArray entity: element type, physical extent and per-axis
//! dimension descriptors.
//!
//! # Invariants
//! - Descriptors are stored as one ordered attribute, so an append or a
//!   replacement is a single atomic record write.
//! - Every persisted descriptor has passed [`Dimension::validate`].
//! - `unit` is either unset, cleared, or a valid SI unit.

use super::block::{Block, BlockEntity};
use super::entity::{Entity, EntityCore, EntityWithMetadata, EntityWithSources};
use super::{RepoError, RepoResult};
use crate::model::data_type::DataType;
use crate::model::dimension::{Dimension, RangeDimension, SampledDimension, SetDimension};
use crate::model::entity::ObjectType;
use crate::model::units;
use crate::store::AttributeState;
use serde_json::{json, Value};
use std::path::PathBuf;

const ATTR_DATA_TYPE: &str = "data_type";
const ATTR_DATA_EXTENT: &str = "data_extent";
const ATTR_UNIT: &str = "unit";
const ATTR_LABEL: &str = "label";
const ATTR_DIMENSIONS: &str = "dimensions";

#[derive(Debug, Clone)]
pub struct DataArray {
    core: EntityCore,
    block: Block,
}

impl Entity for DataArray {
    fn core(&self) -> &EntityCore {
        &self.core
    }
}

impl EntityWithMetadata for DataArray {}

impl EntityWithSources for DataArray {
    fn owner_block(&self) -> &Block {
        &self.block
    }
}

impl BlockEntity for DataArray {
    const KIND: ObjectType = ObjectType::DataArray;

    fn open_in(block: &Block, location: PathBuf) -> Self {
        Self {
            core: EntityCore::open(block.ctx().clone(), location),
            block: block.clone(),
        }
    }
}

impl DataArray {
    pub(crate) fn create(
        block: &Block,
        location: PathBuf,
        id: &str,
        name: &str,
        entity_type: &str,
        data_type: DataType,
        extent: &[u64],
    ) -> RepoResult<Self> {
        let core = EntityCore::create(
            block.ctx().clone(),
            location,
            ObjectType::DataArray,
            id,
            name,
            Some(entity_type),
            vec![
                (ATTR_DATA_TYPE, json!(data_type)),
                (ATTR_DATA_EXTENT, json!(extent)),
                (ATTR_DIMENSIONS, json!([])),
            ],
        )?;
        Ok(Self {
            core,
            block: block.clone(),
        })
    }

    pub fn data_type(&self) -> RepoResult<DataType> {
        let _guard = self.core.ctx().read();
        Ok(self.core.attrs().require(ATTR_DATA_TYPE)?)
    }

    /// Physical shape. Empty when no data has been written yet.
    pub fn data_extent(&self) -> RepoResult<Vec<u64>> {
        let _guard = self.core.ctx().read();
        Ok(self.core.attrs().get(ATTR_DATA_EXTENT)?.unwrap_or_default())
    }

    /// Records a new physical shape after the array I/O layer resized the data.
    pub fn set_data_extent(&self, extent: &[u64]) -> RepoResult<()> {
        let _guard = self.core.ctx().write()?;
        self.core.set_and_touch(ATTR_DATA_EXTENT, json!(extent))
    }

    pub fn unit(&self) -> RepoResult<Option<String>> {
        let _guard = self.core.ctx().read();
        Ok(self.core.attrs().get(ATTR_UNIT)?)
    }

    /// Distinguishes a cleared unit from one that was never set.
    pub fn unit_state(&self) -> RepoResult<AttributeState> {
        let _guard = self.core.ctx().read();
        Ok(self.core.attrs().state(ATTR_UNIT)?)
    }

    pub fn set_unit(&self, unit: &str) -> RepoResult<()> {
        let _guard = self.core.ctx().write()?;
        if !units::is_si_unit(unit) {
            return Err(RepoError::InvalidArgument(format!(
                "`{unit}` is not a valid SI unit"
            )));
        }
        self.core.set_and_touch(ATTR_UNIT, json!(unit))
    }

    pub fn clear_unit(&self) -> RepoResult<()> {
        let _guard = self.core.ctx().write()?;
        self.core.set_and_touch(ATTR_UNIT, Value::Null)
    }

    pub fn label(&self) -> RepoResult<Option<String>> {
        let _guard = self.core.ctx().read();
        Ok(self.core.attrs().get(ATTR_LABEL)?)
    }

    pub fn set_label(&self, label: &str) -> RepoResult<()> {
        let _guard = self.core.ctx().write()?;
        self.core.set_and_touch(ATTR_LABEL, json!(label))
    }

    pub fn clear_label(&self) -> RepoResult<()> {
        let _guard = self.core.ctx().write()?;
        self.core.set_and_touch(ATTR_LABEL, Value::Null)
    }

    fn load_dimensions(&self) -> RepoResult<Vec<Dimension>> {
        Ok(self.core.attrs().get(ATTR_DIMENSIONS)?.unwrap_or_default())
    }

    fn store_dimensions(&self, dimensions: &[Dimension]) -> RepoResult<()> {
        self.core.set_and_touch(ATTR_DIMENSIONS, json!(dimensions))
    }

    pub fn dimension_count(&self) -> RepoResult<u64> {
        let _guard = self.core.ctx().read();
        Ok(self.load_dimensions()?.len() as u64)
    }

    /// Descriptor of axis `index` (zero-based).
    pub fn dimension(&self, index: u64) -> RepoResult<Dimension> {
        let _guard = self.core.ctx().read();
        let dimensions = self.load_dimensions()?;
        usize::try_from(index)
            .ok()
            .and_then(|index| dimensions.get(index).cloned())
            .ok_or_else(|| RepoError::out_of_bounds("no dimension at this axis", index))
    }

    pub fn dimensions(&self) -> RepoResult<Vec<Dimension>> {
        let _guard = self.core.ctx().read();
        self.load_dimensions()
    }

    /// Appends a descriptor for the next axis.
    pub fn append_dimension(&self, dimension: impl Into<Dimension>) -> RepoResult<u64> {
        let dimension = dimension.into();
        dimension.validate()?;
        let _guard = self.core.ctx().write()?;
        let mut dimensions = self.load_dimensions()?;
        dimensions.push(dimension);
        self.store_dimensions(&dimensions)?;
        Ok(dimensions.len() as u64 - 1)
    }

    pub fn append_set_dimension(&self, labels: Vec<String>) -> RepoResult<SetDimension> {
        let dimension = SetDimension::new(labels);
        self.append_dimension(dimension.clone())?;
        Ok(dimension)
    }

    pub fn append_sampled_dimension(&self, sampling_interval: f64) -> RepoResult<SampledDimension> {
        let dimension = SampledDimension::new(sampling_interval)?;
        self.append_dimension(dimension.clone())?;
        Ok(dimension)
    }

    pub fn append_range_dimension(&self, ticks: Vec<f64>) -> RepoResult<RangeDimension> {
        let dimension = RangeDimension::new(ticks)?;
        self.append_dimension(dimension.clone())?;
        Ok(dimension)
    }

    /// Replaces the descriptor of an existing axis.
    pub fn set_dimension(&self, index: u64, dimension: impl Into<Dimension>) -> RepoResult<()> {
        let dimension = dimension.into();
        dimension.validate()?;
        let _guard = self.core.ctx().write()?;
        let mut dimensions = self.load_dimensions()?;
        let slot = usize::try_from(index)
            .ok()
            .and_then(|index| dimensions.get_mut(index))
            .ok_or_else(|| RepoError::out_of_bounds("no dimension at this axis", index))?;
        *slot = dimension;
        self.store_dimensions(&dimensions)
    }

    /// Drops every descriptor. Returns whether any existed.
    pub fn delete_dimensions(&self) -> RepoResult<bool> {
        let _guard = self.core.ctx().write()?;
        let had_any = !self.load_dimensions()?.is_empty();
        if had_any {
            self.store_dimensions(&[])?;
        }
        Ok(had_any)
    }
}
