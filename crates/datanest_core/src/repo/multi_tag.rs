//! MultiTag: many positions (plus optional extents) sharing one set of
//! references and features.
//!
//! # Invariants
//! - `positions` is a non-empty matrix: one row per tagged point, every row
//!   the same length.
//! - When `extents` is set it has exactly the shape of `positions`.

use super::base_tag::{BaseTag, TagBase};
use super::block::{Block, BlockEntity};
use super::entity::{Entity, EntityCore, EntityWithMetadata, EntityWithSources};
use super::tag::check_coordinates;
use super::{RepoError, RepoResult};
use crate::model::entity::ObjectType;
use serde_json::{json, Value};
use std::path::PathBuf;

const ATTR_POSITIONS: &str = "positions";
const ATTR_EXTENTS: &str = "extents";

#[derive(Debug, Clone)]
pub struct MultiTag {
    base: TagBase,
}

impl Entity for MultiTag {
    fn core(&self) -> &EntityCore {
        self.base.core()
    }
}

impl EntityWithMetadata for MultiTag {}

impl EntityWithSources for MultiTag {
    fn owner_block(&self) -> &Block {
        self.base.block()
    }
}

impl BaseTag for MultiTag {
    fn tag_base(&self) -> &TagBase {
        &self.base
    }
}

impl BlockEntity for MultiTag {
    const KIND: ObjectType = ObjectType::MultiTag;

    fn open_in(block: &Block, location: PathBuf) -> Self {
        Self {
            base: TagBase::open(block, location),
        }
    }
}

impl MultiTag {
    pub(crate) fn create(
        block: &Block,
        location: PathBuf,
        id: &str,
        name: &str,
        entity_type: &str,
        positions: Vec<Vec<f64>>,
    ) -> RepoResult<Self> {
        check_matrix("positions", &positions)?;
        let base = TagBase::create(
            block,
            location,
            ObjectType::MultiTag,
            id,
            name,
            entity_type,
            vec![(ATTR_POSITIONS, json!(positions))],
        )?;
        Ok(Self { base })
    }

    pub fn positions(&self) -> RepoResult<Vec<Vec<f64>>> {
        let core = self.base.core();
        let _guard = core.ctx().read();
        Ok(core.attrs().require(ATTR_POSITIONS)?)
    }

    pub fn position_count(&self) -> RepoResult<u64> {
        Ok(self.positions()?.len() as u64)
    }

    pub fn position_at(&self, index: u64) -> RepoResult<Vec<f64>> {
        row_at(self.positions()?, index, "position")
    }

    /// Replaces all positions. Rejected while extents of another shape exist.
    pub fn set_positions(&self, positions: Vec<Vec<f64>>) -> RepoResult<()> {
        check_matrix("positions", &positions)?;
        let core = self.base.core();
        let _guard = core.ctx().write()?;
        if let Some(extents) = core.attrs().get::<Vec<Vec<f64>>>(ATTR_EXTENTS)? {
            if !same_shape(&positions, &extents) {
                return Err(RepoError::InvalidState(
                    "positions would no longer match the stored extents".into(),
                ));
            }
        }
        core.set_and_touch(ATTR_POSITIONS, json!(positions))
    }

    pub fn extents(&self) -> RepoResult<Option<Vec<Vec<f64>>>> {
        let core = self.base.core();
        let _guard = core.ctx().read();
        Ok(core.attrs().get(ATTR_EXTENTS)?)
    }

    /// Extent of position `index`, or `None` when no extents are stored.
    pub fn extent_at(&self, index: u64) -> RepoResult<Option<Vec<f64>>> {
        match self.extents()? {
            Some(extents) => row_at(extents, index, "extent").map(Some),
            None => Ok(None),
        }
    }

    pub fn set_extents(&self, extents: Vec<Vec<f64>>) -> RepoResult<()> {
        check_matrix("extents", &extents)?;
        if extents.iter().flatten().any(|value| *value < 0.0) {
            return Err(RepoError::InvalidArgument(
                "extents must not be negative".into(),
            ));
        }
        let core = self.base.core();
        let _guard = core.ctx().write()?;
        let positions: Vec<Vec<f64>> = core.attrs().require(ATTR_POSITIONS)?;
        if !same_shape(&positions, &extents) {
            return Err(RepoError::InvalidArgument(
                "extents must have the same shape as positions".into(),
            ));
        }
        core.set_and_touch(ATTR_EXTENTS, json!(extents))
    }

    pub fn clear_extents(&self) -> RepoResult<()> {
        let core = self.base.core();
        let _guard = core.ctx().write()?;
        core.set_and_touch(ATTR_EXTENTS, Value::Null)
    }
}

fn check_matrix(what: &str, rows: &[Vec<f64>]) -> RepoResult<()> {
    let Some(first) = rows.first() else {
        return Err(RepoError::InvalidArgument(format!("{what} must not be empty")));
    };
    for row in rows {
        check_coordinates(what, row)?;
        if row.len() != first.len() {
            return Err(RepoError::InvalidArgument(format!(
                "all {what} rows must have {} components",
                first.len()
            )));
        }
    }
    Ok(())
}

fn same_shape(left: &[Vec<f64>], right: &[Vec<f64>]) -> bool {
    left.len() == right.len() && left.iter().zip(right).all(|(a, b)| a.len() == b.len())
}

fn row_at(rows: Vec<Vec<f64>>, index: u64, what: &str) -> RepoResult<Vec<f64>> {
    usize::try_from(index)
        .ok()
        .and_then(|index| rows.into_iter().nth(index))
        .ok_or_else(|| RepoError::out_of_bounds(format!("no {what} at this index"), index))
}
