//! Structural consistency checks over a whole container.
//!
//! # Responsibility
//! - Walk every block, tag, array and section of a `DataFile`.
//! - Collect problems as messages instead of failing on the first one.
//!
//! # Invariants
//! - Validation never mutates the container.
//! - Only storage failures abort a run; domain problems are reported.

use crate::model::dimension::Dimension;
use crate::model::entity::{EntityId, ObjectType};
use crate::model::units;
use crate::repo::{
    BaseTag, Block, DataArray, DataFile, Entity, MultiTag, RepoResult, Tag,
};
use log::info;
use serde::Serialize;
use std::time::Instant;

/// One finding, attributed to the entity it concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationMessage {
    pub kind: ObjectType,
    pub id: EntityId,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub errors: Vec<ValidationMessage>,
    pub warnings: Vec<ValidationMessage>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Findings concerning one entity.
    pub fn errors_for(&self, id: &str) -> Vec<&ValidationMessage> {
        self.errors.iter().filter(|message| message.id == id).collect()
    }

    fn error(&mut self, kind: ObjectType, id: &str, message: impl Into<String>) {
        self.errors.push(ValidationMessage {
            kind,
            id: id.to_string(),
            message: message.into(),
        });
    }

    fn warning(&mut self, kind: ObjectType, id: &str, message: impl Into<String>) {
        self.warnings.push(ValidationMessage {
            kind,
            id: id.to_string(),
            message: message.into(),
        });
    }
}

/// Checks every entity of `file`.
pub fn validate_file(file: &DataFile) -> RepoResult<ValidationResult> {
    let started_at = Instant::now();
    let _guard = file.core().ctx().read();
    let mut result = ValidationResult::default();

    for block in file.blocks()? {
        validate_block(&block, &mut result)?;
    }
    for section in file.find_sections(usize::MAX)? {
        for property in section.properties()? {
            if property.value_count()? > 0 && property.data_type()?.is_none() {
                result.error(
                    ObjectType::Property,
                    &property.id()?,
                    "property holds values but has no data type",
                );
            }
        }
    }

    info!(
        "event=container_validate module=service status=ok errors={} warnings={} duration_ms={}",
        result.errors.len(),
        result.warnings.len(),
        started_at.elapsed().as_millis()
    );
    Ok(result)
}

fn validate_block(block: &Block, result: &mut ValidationResult) -> RepoResult<()> {
    for array in block.entities::<DataArray>()? {
        validate_data_array(&array, result)?;
    }
    for tag in block.entities::<Tag>()? {
        validate_tag(&tag, result)?;
    }
    for tag in block.entities::<MultiTag>()? {
        validate_multi_tag(&tag, result)?;
    }
    Ok(())
}

fn validate_data_array(array: &DataArray, result: &mut ValidationResult) -> RepoResult<()> {
    let id = array.id()?;
    let kind = ObjectType::DataArray;
    let dimensions = array.dimensions()?;
    let extent = array.data_extent()?;

    if let Some(unit) = array.unit()? {
        if !units::is_unitless(Some(&unit)) && !units::is_si_unit(&unit) {
            result.error(kind, &id, format!("unit `{unit}` is not an SI unit"));
        }
    }

    for (axis, dimension) in dimensions.iter().enumerate() {
        if let Err(err) = dimension.validate() {
            result.error(kind, &id, format!("dimension {axis}: {err}"));
        }
    }

    if extent.is_empty() {
        return Ok(());
    }
    if dimensions.len() != extent.len() {
        result.error(
            kind,
            &id,
            format!(
                "{} dimensions described but data extent has rank {}",
                dimensions.len(),
                extent.len()
            ),
        );
        return Ok(());
    }
    for (axis, (dimension, size)) in dimensions.iter().zip(&extent).enumerate() {
        let described = match dimension {
            Dimension::Range(dim) => Some(("ticks", dim.ticks.len())),
            Dimension::Set(dim) if !dim.labels.is_empty() => Some(("labels", dim.labels.len())),
            _ => None,
        };
        if let Some((what, count)) = described {
            if count as u64 != *size {
                result.error(
                    kind,
                    &id,
                    format!("dimension {axis} has {count} {what} but extent {size}"),
                );
            }
        }
    }
    Ok(())
}

fn validate_tag(tag: &Tag, result: &mut ValidationResult) -> RepoResult<()> {
    let id = tag.id()?;
    let kind = ObjectType::Tag;
    let position = tag.position()?;
    let axis_units = tag.units()?;

    if position.is_empty() {
        result.error(kind, &id, "position is empty");
    }
    if let Some(extent) = tag.extent()? {
        if extent.len() != position.len() {
            result.error(
                kind,
                &id,
                format!(
                    "extent has {} entries but position has {}",
                    extent.len(),
                    position.len()
                ),
            );
        }
    }
    check_units_rank(kind, &id, &axis_units, position.len(), result);
    check_references(tag, kind, &id, position.len(), &axis_units, result)?;
    check_features(tag, kind, &id, result)
}

fn validate_multi_tag(tag: &MultiTag, result: &mut ValidationResult) -> RepoResult<()> {
    let id = tag.id()?;
    let kind = ObjectType::MultiTag;
    let positions = tag.positions()?;
    let axis_units = tag.units()?;
    let rank = positions.first().map(Vec::len).unwrap_or(0);

    if positions.is_empty() {
        result.error(kind, &id, "positions are empty");
    }
    if positions.iter().any(|row| row.len() != rank) {
        result.error(kind, &id, "position rows differ in length");
    }
    if let Some(extents) = tag.extents()? {
        let same_shape = extents.len() == positions.len()
            && extents.iter().zip(&positions).all(|(e, p)| e.len() == p.len());
        if !same_shape {
            result.error(kind, &id, "extents do not match the shape of positions");
        }
    }
    check_units_rank(kind, &id, &axis_units, rank, result);
    check_references(tag, kind, &id, rank, &axis_units, result)?;
    check_features(tag, kind, &id, result)
}

fn check_units_rank(
    kind: ObjectType,
    id: &str,
    axis_units: &[String],
    rank: usize,
    result: &mut ValidationResult,
) {
    if !axis_units.is_empty() && axis_units.len() != rank {
        result.error(
            kind,
            id,
            format!("{} units given for rank {rank}", axis_units.len()),
        );
    }
}

fn check_references<T: BaseTag>(
    tag: &T,
    kind: ObjectType,
    id: &str,
    rank: usize,
    axis_units: &[String],
    result: &mut ValidationResult,
) -> RepoResult<()> {
    for array in tag.references()? {
        let array_id = array.id()?;
        let dimensions = array.dimensions()?;
        if dimensions.len() != rank {
            result.error(
                kind,
                id,
                format!(
                    "reference {array_id} has {} dimensions, tag rank is {rank}",
                    dimensions.len()
                ),
            );
            continue;
        }
        for (axis, (dimension, unit)) in dimensions.iter().zip(axis_units).enumerate() {
            if units::is_unitless(Some(unit)) {
                continue;
            }
            let compatible = match dimension {
                Dimension::Set(_) => false,
                _ => dimension
                    .unit()
                    .and_then(|axis_unit| units::scaling(unit, axis_unit))
                    .is_some(),
            };
            if !compatible {
                result.error(
                    kind,
                    id,
                    format!(
                        "unit `{unit}` of axis {axis} does not match dimension of reference {array_id}"
                    ),
                );
            }
        }
    }
    Ok(())
}

fn check_features<T: BaseTag>(
    tag: &T,
    kind: ObjectType,
    id: &str,
    result: &mut ValidationResult,
) -> RepoResult<()> {
    for feature in tag.features()? {
        if feature.data()?.is_none() {
            result.warning(
                kind,
                id,
                format!(
                    "feature {} points at missing data array {}",
                    feature.id()?,
                    feature.data_id()?
                ),
            );
        }
    }
    Ok(())
}
