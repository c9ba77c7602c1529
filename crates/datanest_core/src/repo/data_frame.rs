//! DataFrame entity: tabular data described by its column definitions.

use super::block::{Block, BlockEntity};
use super::entity::{Entity, EntityCore, EntityWithMetadata, EntityWithSources};
use super::{RepoError, RepoResult};
use crate::model::data_type::DataType;
use crate::model::entity::ObjectType;
use crate::model::units;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::path::PathBuf;

const ATTR_COLUMNS: &str = "columns";
const ATTR_ROW_COUNT: &str = "row_count";

/// Definition of one data frame column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(default)]
    pub unit: Option<String>,
    pub data_type: DataType,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            unit: None,
            data_type,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct DataFrame {
    core: EntityCore,
    block: Block,
}

impl Entity for DataFrame {
    fn core(&self) -> &EntityCore {
        &self.core
    }
}

impl EntityWithMetadata for DataFrame {}

impl EntityWithSources for DataFrame {
    fn owner_block(&self) -> &Block {
        &self.block
    }
}

impl BlockEntity for DataFrame {
    const KIND: ObjectType = ObjectType::DataFrame;

    fn open_in(block: &Block, location: PathBuf) -> Self {
        Self {
            core: EntityCore::open(block.ctx().clone(), location),
            block: block.clone(),
        }
    }
}

impl DataFrame {
    pub(crate) fn create(
        block: &Block,
        location: PathBuf,
        id: &str,
        name: &str,
        entity_type: &str,
        columns: Vec<Column>,
    ) -> RepoResult<Self> {
        validate_columns(&columns)?;
        let core = EntityCore::create(
            block.ctx().clone(),
            location,
            ObjectType::DataFrame,
            id,
            name,
            Some(entity_type),
            vec![(ATTR_COLUMNS, json!(columns)), (ATTR_ROW_COUNT, json!(0u64))],
        )?;
        Ok(Self {
            core,
            block: block.clone(),
        })
    }

    pub fn columns(&self) -> RepoResult<Vec<Column>> {
        let _guard = self.core.ctx().read();
        Ok(self.core.attrs().get(ATTR_COLUMNS)?.unwrap_or_default())
    }

    pub fn column_count(&self) -> RepoResult<u64> {
        Ok(self.columns()?.len() as u64)
    }

    pub fn column(&self, name: &str) -> RepoResult<Option<Column>> {
        Ok(self
            .columns()?
            .into_iter()
            .find(|column| column.name == name))
    }

    pub fn row_count(&self) -> RepoResult<u64> {
        let _guard = self.core.ctx().read();
        Ok(self.core.attrs().get(ATTR_ROW_COUNT)?.unwrap_or(0))
    }

    /// Records the row count after the array I/O layer resized the table.
    pub fn set_row_count(&self, rows: u64) -> RepoResult<()> {
        let _guard = self.core.ctx().write()?;
        self.core.set_and_touch(ATTR_ROW_COUNT, json!(rows))
    }
}

fn validate_columns(columns: &[Column]) -> RepoResult<()> {
    if columns.is_empty() {
        return Err(RepoError::InvalidArgument(
            "data frame needs at least one column".into(),
        ));
    }
    let mut seen = HashSet::new();
    for column in columns {
        if column.name.trim().is_empty() {
            return Err(RepoError::InvalidArgument("column name must not be blank".into()));
        }
        if !seen.insert(column.name.as_str()) {
            return Err(RepoError::InvalidArgument(format!(
                "duplicate column `{}`",
                column.name
            )));
        }
        if let Some(unit) = column.unit.as_deref() {
            if !units::is_unitless(Some(unit)) && !units::is_si_unit(unit) {
                return Err(RepoError::InvalidArgument(format!(
                    "column `{}` has invalid unit `{unit}`",
                    column.name
                )));
            }
        }
    }
    Ok(())
}
