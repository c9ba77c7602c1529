//! Metadata tree: sections holding nested sections and typed properties.
//!
//! # Responsibility
//! - Own nested `sections/` and `properties/` collections.
//! - Keep property values consistent with the declared data type.
//!
//! # Invariants
//! - Property names are unique within one section.
//! - A property's data type cannot change while it stores values.
//! - Every stored value fits the property's data type.

use super::collection::Collection;
use super::entity::{Entity, EntityCore, ATTR_UPDATED_AT};
use super::{RepoError, RepoResult};
use crate::model::data_type::{DataType, Variant};
use crate::model::entity::{create_id, now_epoch_ms, NameOrId, ObjectType};
use crate::model::units;
use crate::store::{AttributeState, FileContext};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;

const ATTR_REPOSITORY: &str = "repository";
const ATTR_DATA_TYPE: &str = "data_type";
const ATTR_VALUES: &str = "values";
const ATTR_UNIT: &str = "unit";
const ATTR_UNCERTAINTY: &str = "uncertainty";

#[derive(Debug, Clone)]
pub struct Section {
    core: EntityCore,
}

impl Entity for Section {
    fn core(&self) -> &EntityCore {
        &self.core
    }
}

impl Section {
    pub(crate) fn open(ctx: Arc<FileContext>, location: PathBuf) -> Self {
        Self {
            core: EntityCore::open(ctx, location),
        }
    }

    pub(crate) fn create(
        ctx: Arc<FileContext>,
        location: PathBuf,
        id: &str,
        name: &str,
        entity_type: &str,
    ) -> RepoResult<Self> {
        let core = EntityCore::create(
            ctx,
            location,
            ObjectType::Section,
            id,
            name,
            Some(entity_type),
            Vec::new(),
        )?;
        Ok(Self { core })
    }

    fn open_child(&self, location: PathBuf) -> Section {
        Section::open(self.core.ctx().clone(), location)
    }

    fn sections_collection(&self) -> Collection {
        Collection::new(self.core.directory(), ObjectType::Section)
    }

    fn properties_collection(&self) -> Collection {
        Collection::new(self.core.directory(), ObjectType::Property)
    }

    /// URL of the terminology this section follows.
    pub fn repository(&self) -> RepoResult<Option<String>> {
        let _guard = self.core.ctx().read();
        Ok(self.core.attrs().get(ATTR_REPOSITORY)?)
    }

    pub fn set_repository(&self, repository: &str) -> RepoResult<()> {
        let _guard = self.core.ctx().write()?;
        self.core.set_and_touch(ATTR_REPOSITORY, json!(repository))
    }

    pub fn clear_repository(&self) -> RepoResult<()> {
        let _guard = self.core.ctx().write()?;
        self.core.set_and_touch(ATTR_REPOSITORY, Value::Null)
    }

    pub fn create_section(&self, name: &str, entity_type: &str) -> RepoResult<Section> {
        let _guard = self.core.ctx().write()?;
        if name.trim().is_empty() {
            return Err(RepoError::InvalidArgument(
                "section name must not be blank".into(),
            ));
        }
        let id = create_id();
        let location = self.sections_collection().allocate(&id);
        let section = Section::create(self.core.ctx().clone(), location, &id, name, entity_type)?;
        self.core.touch()?;
        Ok(section)
    }

    pub fn has_section(&self, key: impl Into<NameOrId>) -> RepoResult<bool> {
        let _guard = self.core.ctx().read();
        self.sections_collection().contains(&key.into())
    }

    pub fn section_count(&self) -> RepoResult<u64> {
        let _guard = self.core.ctx().read();
        self.sections_collection().count()
    }

    pub fn get_section(&self, key: impl Into<NameOrId>) -> RepoResult<Option<Section>> {
        let _guard = self.core.ctx().read();
        Ok(self
            .sections_collection()
            .locate(&key.into())?
            .map(|location| self.open_child(location)))
    }

    pub fn get_section_at(&self, index: u64) -> RepoResult<Section> {
        let _guard = self.core.ctx().read();
        let location = self.sections_collection().location_at(index)?;
        Ok(self.open_child(location))
    }

    pub fn sections(&self) -> RepoResult<Vec<Section>> {
        let _guard = self.core.ctx().read();
        self.sections_unlocked()
    }

    fn sections_unlocked(&self) -> RepoResult<Vec<Section>> {
        Ok(self
            .sections_collection()
            .locations()?
            .into_iter()
            .map(|location| self.open_child(location))
            .collect())
    }

    /// Deletes a nested section and everything below it.
    pub fn delete_section(&self, key: impl Into<NameOrId>) -> RepoResult<bool> {
        let _guard = self.core.ctx().write()?;
        let deleted = self.sections_collection().delete(&key.into())?;
        if deleted {
            self.core.touch()?;
        }
        Ok(deleted)
    }

    /// This section and its descendants, breadth first, down to `max_depth`
    /// levels below this one.
    pub fn find_sections(&self, max_depth: usize) -> RepoResult<Vec<Section>> {
        let _guard = self.core.ctx().read();
        self.find_sections_unlocked(max_depth)
    }

    pub(crate) fn find_sections_unlocked(&self, max_depth: usize) -> RepoResult<Vec<Section>> {
        let mut found = vec![self.clone()];
        let mut level = vec![self.clone()];
        for _ in 0..max_depth {
            let mut next = Vec::new();
            for section in &level {
                next.extend(section.sections_unlocked()?);
            }
            if next.is_empty() {
                break;
            }
            found.extend(next.iter().cloned());
            level = next;
        }
        Ok(found)
    }

    /// Creates a property. Names are unique within a section.
    pub fn create_property(&self, name: &str, data_type: Option<DataType>) -> RepoResult<Property> {
        let _guard = self.core.ctx().write()?;
        let property = self.create_property_unlocked(name, data_type)?;
        self.core.touch()?;
        Ok(property)
    }

    /// Creates a property whose data type is taken from the first value.
    pub fn create_property_with_values(
        &self,
        name: &str,
        values: Vec<Variant>,
    ) -> RepoResult<Property> {
        let _guard = self.core.ctx().write()?;
        let data_type = values.first().map(Variant::natural_type);
        if let Some(data_type) = data_type {
            check_values(&values, data_type)?;
        }
        let property = self.create_property_unlocked(name, data_type)?;
        property.store_values(values)?;
        self.core.touch()?;
        Ok(property)
    }

    fn create_property_unlocked(
        &self,
        name: &str,
        data_type: Option<DataType>,
    ) -> RepoResult<Property> {
        if name.trim().is_empty() {
            return Err(RepoError::InvalidArgument(
                "property name must not be blank".into(),
            ));
        }
        let properties = self.properties_collection();
        if properties.contains(&NameOrId::Name(name.to_string()))? {
            return Err(RepoError::InvalidState(format!(
                "property `{name}` already exists in this section"
            )));
        }
        let id = create_id();
        let mut extra = vec![(ATTR_VALUES, json!([]))];
        if let Some(data_type) = data_type {
            extra.push((ATTR_DATA_TYPE, json!(data_type)));
        }
        let core = EntityCore::create(
            self.core.ctx().clone(),
            properties.allocate(&id),
            ObjectType::Property,
            &id,
            name,
            None,
            extra,
        )?;
        Ok(Property { core })
    }

    pub fn has_property(&self, key: impl Into<NameOrId>) -> RepoResult<bool> {
        let _guard = self.core.ctx().read();
        self.properties_collection().contains(&key.into())
    }

    pub fn property_count(&self) -> RepoResult<u64> {
        let _guard = self.core.ctx().read();
        self.properties_collection().count()
    }

    pub fn get_property(&self, key: impl Into<NameOrId>) -> RepoResult<Option<Property>> {
        let _guard = self.core.ctx().read();
        Ok(self
            .properties_collection()
            .locate(&key.into())?
            .map(|location| Property::open(self.core.ctx().clone(), location)))
    }

    pub fn get_property_at(&self, index: u64) -> RepoResult<Property> {
        let _guard = self.core.ctx().read();
        let location = self.properties_collection().location_at(index)?;
        Ok(Property::open(self.core.ctx().clone(), location))
    }

    pub fn properties(&self) -> RepoResult<Vec<Property>> {
        let _guard = self.core.ctx().read();
        Ok(self
            .properties_collection()
            .locations()?
            .into_iter()
            .map(|location| Property::open(self.core.ctx().clone(), location))
            .collect())
    }

    pub fn delete_property(&self, key: impl Into<NameOrId>) -> RepoResult<bool> {
        let _guard = self.core.ctx().write()?;
        let deleted = self.properties_collection().delete(&key.into())?;
        if deleted {
            self.core.touch()?;
        }
        Ok(deleted)
    }
}

/// A named, typed list of values inside a section.
#[derive(Debug, Clone)]
pub struct Property {
    core: EntityCore,
}

impl Entity for Property {
    fn core(&self) -> &EntityCore {
        &self.core
    }
}

impl Property {
    pub(crate) fn open(ctx: Arc<FileContext>, location: PathBuf) -> Self {
        Self {
            core: EntityCore::open(ctx, location),
        }
    }

    pub fn data_type(&self) -> RepoResult<Option<DataType>> {
        let _guard = self.core.ctx().read();
        Ok(self.core.attrs().get(ATTR_DATA_TYPE)?)
    }

    /// Declares the value type. Fails while values of another type are stored.
    pub fn set_data_type(&self, data_type: DataType) -> RepoResult<()> {
        let _guard = self.core.ctx().write()?;
        let current: Option<DataType> = self.core.attrs().get(ATTR_DATA_TYPE)?;
        if current == Some(data_type) {
            return Ok(());
        }
        if !self.values_unlocked()?.is_empty() {
            return Err(RepoError::InvalidState(
                "cannot change the data type of a property that stores values".into(),
            ));
        }
        self.core.set_and_touch(ATTR_DATA_TYPE, json!(data_type))
    }

    pub fn values(&self) -> RepoResult<Vec<Variant>> {
        let _guard = self.core.ctx().read();
        self.values_unlocked()
    }

    fn values_unlocked(&self) -> RepoResult<Vec<Variant>> {
        Ok(self.core.attrs().get(ATTR_VALUES)?.unwrap_or_default())
    }

    pub fn value_count(&self) -> RepoResult<u64> {
        Ok(self.values()?.len() as u64)
    }

    /// Replaces all values. An untyped property takes the first value's type.
    pub fn set_values(&self, values: Vec<Variant>) -> RepoResult<()> {
        let _guard = self.core.ctx().write()?;
        self.store_values(values)
    }

    fn store_values(&self, values: Vec<Variant>) -> RepoResult<()> {
        let declared: Option<DataType> = self.core.attrs().get(ATTR_DATA_TYPE)?;
        let data_type = match (declared, values.first()) {
            (Some(data_type), _) => Some(data_type),
            (None, Some(first)) => Some(first.natural_type()),
            (None, None) => None,
        };
        if let Some(data_type) = data_type {
            check_values(&values, data_type)?;
        }
        let mut entries = vec![(ATTR_VALUES, json!(values))];
        if declared.is_none() {
            if let Some(data_type) = data_type {
                entries.push((ATTR_DATA_TYPE, json!(data_type)));
            }
        }
        entries.push((ATTR_UPDATED_AT, json!(now_epoch_ms())));
        self.core.attrs().set_many(entries)?;
        Ok(())
    }

    pub fn delete_values(&self) -> RepoResult<()> {
        let _guard = self.core.ctx().write()?;
        self.core.set_and_touch(ATTR_VALUES, json!([]))
    }

    pub fn unit(&self) -> RepoResult<Option<String>> {
        let _guard = self.core.ctx().read();
        Ok(self.core.attrs().get(ATTR_UNIT)?)
    }

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

    pub fn uncertainty(&self) -> RepoResult<Option<f64>> {
        let _guard = self.core.ctx().read();
        Ok(self.core.attrs().get(ATTR_UNCERTAINTY)?)
    }

    pub fn set_uncertainty(&self, uncertainty: f64) -> RepoResult<()> {
        let _guard = self.core.ctx().write()?;
        if !uncertainty.is_finite() || uncertainty < 0.0 {
            return Err(RepoError::InvalidArgument(format!(
                "uncertainty must be finite and >= 0, got {uncertainty}"
            )));
        }
        self.core.set_and_touch(ATTR_UNCERTAINTY, json!(uncertainty))
    }

    pub fn clear_uncertainty(&self) -> RepoResult<()> {
        let _guard = self.core.ctx().write()?;
        self.core.set_and_touch(ATTR_UNCERTAINTY, Value::Null)
    }
}

fn check_values(values: &[Variant], data_type: DataType) -> RepoResult<()> {
    match values.iter().position(|value| !value.fits(data_type)) {
        Some(index) => Err(RepoError::InvalidArgument(format!(
            "value {index} does not fit data type {data_type}"
        ))),
        None => Ok(()),
    }
}
