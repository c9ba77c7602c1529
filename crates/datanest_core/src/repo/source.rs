//! Source: provenance entities owned by a block, nestable to any depth.

use super::block::{Block, BlockEntity};
use super::collection::Collection;
use super::entity::{Entity, EntityCore, EntityWithMetadata};
use super::{RepoError, RepoResult};
use crate::model::entity::{create_id, NameOrId, ObjectType};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Source {
    core: EntityCore,
    block: Block,
}

impl Entity for Source {
    fn core(&self) -> &EntityCore {
        &self.core
    }
}

impl EntityWithMetadata for Source {}

impl BlockEntity for Source {
    const KIND: ObjectType = ObjectType::Source;

    fn open_in(block: &Block, location: PathBuf) -> Self {
        Self {
            core: EntityCore::open(block.ctx().clone(), location),
            block: block.clone(),
        }
    }
}

impl Source {
    pub(crate) fn create(
        block: &Block,
        location: PathBuf,
        id: &str,
        name: &str,
        entity_type: &str,
    ) -> RepoResult<Self> {
        let core = EntityCore::create(
            block.ctx().clone(),
            location,
            ObjectType::Source,
            id,
            name,
            Some(entity_type),
            Vec::new(),
        )?;
        Ok(Self {
            core,
            block: block.clone(),
        })
    }

    fn children(&self) -> Collection {
        Collection::new(self.core.directory(), ObjectType::Source)
    }

    /// Creates a source nested directly below this one.
    pub fn create_source(&self, name: &str, entity_type: &str) -> RepoResult<Source> {
        let _guard = self.core.ctx().write()?;
        if name.trim().is_empty() {
            return Err(RepoError::InvalidArgument(
                "source name must not be blank".into(),
            ));
        }
        let id = create_id();
        let location = self.children().allocate(&id);
        let source = Source::create(&self.block, location, &id, name, entity_type)?;
        self.core.touch()?;
        Ok(source)
    }

    pub fn has_source(&self, key: impl Into<NameOrId>) -> RepoResult<bool> {
        let _guard = self.core.ctx().read();
        self.children().contains(&key.into())
    }

    pub fn source_count(&self) -> RepoResult<u64> {
        let _guard = self.core.ctx().read();
        self.children().count()
    }

    pub fn get_source(&self, key: impl Into<NameOrId>) -> RepoResult<Option<Source>> {
        let _guard = self.core.ctx().read();
        Ok(self
            .children()
            .locate(&key.into())?
            .map(|location| Source::open_in(&self.block, location)))
    }

    pub fn get_source_at(&self, index: u64) -> RepoResult<Source> {
        let _guard = self.core.ctx().read();
        let location = self.children().location_at(index)?;
        Ok(Source::open_in(&self.block, location))
    }

    pub fn sources(&self) -> RepoResult<Vec<Source>> {
        let _guard = self.core.ctx().read();
        Ok(self
            .children()
            .locations()?
            .into_iter()
            .map(|location| Source::open_in(&self.block, location))
            .collect())
    }

    /// Deletes a direct child and its whole subtree.
    pub fn delete_source(&self, key: impl Into<NameOrId>) -> RepoResult<bool> {
        let _guard = self.core.ctx().write()?;
        let deleted = self.children().delete(&key.into())?;
        if deleted {
            self.core.touch()?;
        }
        Ok(deleted)
    }
}
