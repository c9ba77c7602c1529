//! Block: owner of arrays, frames, tags, groups and sources, and the
//! resolver every cross-entity link goes through.
//!
//! # Responsibility
//! - Create, enumerate and delete the entities a block owns.
//! - Resolve `(kind, name-or-id)` pairs to canonical ids and locations.
//!
//! # Invariants
//! - Id lookups are tried before name scans; the first matching name wins.
//! - Sources resolve through the whole nested source tree.
//! - Deleting an entity removes its storage only. Links to it elsewhere are
//!   left dangling and read as absent.

use super::collection::Collection;
use super::data_array::DataArray;
use super::data_frame::{Column, DataFrame};
use super::entity::{Entity, EntityCore, EntityWithMetadata};
use super::group::Group;
use super::multi_tag::MultiTag;
use super::source::Source;
use super::tag::Tag;
use super::{RepoError, RepoResult};
use crate::model::data_type::DataType;
use crate::model::entity::{create_id, EntityId, EntityRef, NameOrId, ObjectType};
use crate::store::{Directory, FileContext};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

/// Block-scoped lookup used by link sets and features.
///
/// Implementations never take the container lock; callers already hold it.
pub trait EntityResolver {
    /// Canonical id of the first entity of `kind` matching `key`.
    fn resolve_id(&self, kind: ObjectType, key: &NameOrId) -> RepoResult<Option<EntityId>>;

    /// Storage location of the entity of `kind` with exactly `id`.
    fn entity_location(&self, kind: ObjectType, id: &str) -> RepoResult<Option<PathBuf>>;

    /// True when `entity` resolves to a live entity.
    fn contains_entity(&self, entity: &EntityRef) -> RepoResult<bool> {
        Ok(self.resolve_id(entity.kind, &entity.key)?.is_some())
    }
}

/// Entity kinds a block owns directly.
pub trait BlockEntity: Entity + Sized {
    const KIND: ObjectType;

    /// Handle for an existing entity at `location` inside `block`.
    fn open_in(block: &Block, location: PathBuf) -> Self;
}

#[derive(Debug, Clone)]
pub struct Block {
    core: EntityCore,
}

impl Entity for Block {
    fn core(&self) -> &EntityCore {
        &self.core
    }
}

impl EntityWithMetadata for Block {}

impl EntityResolver for Block {
    fn resolve_id(&self, kind: ObjectType, key: &NameOrId) -> RepoResult<Option<EntityId>> {
        match self.locate_entity(kind, key)? {
            Some(location) => {
                let core = EntityCore::open(self.core.ctx().clone(), location);
                Ok(Some(core.id_unlocked()?))
            }
            None => Ok(None),
        }
    }

    fn entity_location(&self, kind: ObjectType, id: &str) -> RepoResult<Option<PathBuf>> {
        self.locate_entity(kind, &NameOrId::Id(id.to_string()))
    }
}

impl Block {
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
        entity_type: Option<&str>,
    ) -> RepoResult<Self> {
        let core = EntityCore::create(
            ctx,
            location,
            ObjectType::Block,
            id,
            name,
            entity_type,
            Vec::new(),
        )?;
        Ok(Self { core })
    }

    pub(crate) fn ctx(&self) -> &Arc<FileContext> {
        self.core.ctx()
    }

    fn collection(&self, kind: ObjectType) -> Collection {
        Collection::new(self.core.directory(), kind)
    }

    /// Location of the first entity of `kind` matching `key`. Lock-free.
    pub(crate) fn locate_entity(
        &self,
        kind: ObjectType,
        key: &NameOrId,
    ) -> RepoResult<Option<PathBuf>> {
        match kind {
            ObjectType::DataArray
            | ObjectType::DataFrame
            | ObjectType::Tag
            | ObjectType::MultiTag
            | ObjectType::Group => self.collection(kind).locate(key),
            ObjectType::Source => self.locate_source(key),
            _ => Ok(None),
        }
    }

    fn locate_source(&self, key: &NameOrId) -> RepoResult<Option<PathBuf>> {
        let root = self.collection(ObjectType::Source);
        if let NameOrId::Any(value) = key {
            let by_id = find_source(root.directory(), &NameOrId::Id(value.clone()))?;
            if by_id.is_some() {
                return Ok(by_id);
            }
            return find_source(root.directory(), &NameOrId::Name(value.clone()));
        }
        find_source(root.directory(), key)
    }

    pub fn has_entity<T: BlockEntity>(&self, key: impl Into<NameOrId>) -> RepoResult<bool> {
        let _guard = self.ctx().read();
        Ok(self.locate_entity(T::KIND, &key.into())?.is_some())
    }

    /// Number of entities of kind `T` owned directly by this block.
    pub fn entity_count<T: BlockEntity>(&self) -> RepoResult<u64> {
        let _guard = self.ctx().read();
        self.collection(T::KIND).count()
    }

    pub fn get_entity<T: BlockEntity>(&self, key: impl Into<NameOrId>) -> RepoResult<Option<T>> {
        let _guard = self.ctx().read();
        Ok(self
            .locate_entity(T::KIND, &key.into())?
            .map(|location| T::open_in(self, location)))
    }

    pub fn get_entity_at<T: BlockEntity>(&self, index: u64) -> RepoResult<T> {
        let _guard = self.ctx().read();
        let location = self.collection(T::KIND).location_at(index)?;
        Ok(T::open_in(self, location))
    }

    pub fn entities<T: BlockEntity>(&self) -> RepoResult<Vec<T>> {
        let _guard = self.ctx().read();
        Ok(self
            .collection(T::KIND)
            .locations()?
            .into_iter()
            .map(|location| T::open_in(self, location))
            .collect())
    }

    /// Deletes the entity and everything it owns.
    pub fn delete_entity<T: BlockEntity>(&self, key: impl Into<NameOrId>) -> RepoResult<bool> {
        let _guard = self.ctx().write()?;
        let key = key.into();
        let Some(location) = self.locate_entity(T::KIND, &key)? else {
            return Ok(false);
        };
        Directory::new(&location).remove_all()?;
        info!(
            "event=entity_deleted module=repo status=ok kind={} location={}",
            T::KIND,
            location.display()
        );
        self.core.touch()?;
        Ok(true)
    }

    pub fn get_data_array(&self, key: impl Into<NameOrId>) -> RepoResult<Option<DataArray>> {
        self.get_entity(key)
    }

    pub fn get_tag(&self, key: impl Into<NameOrId>) -> RepoResult<Option<Tag>> {
        self.get_entity(key)
    }

    pub fn get_multi_tag(&self, key: impl Into<NameOrId>) -> RepoResult<Option<MultiTag>> {
        self.get_entity(key)
    }

    pub fn get_group(&self, key: impl Into<NameOrId>) -> RepoResult<Option<Group>> {
        self.get_entity(key)
    }

    /// Creates a data array with the given element type and physical shape.
    pub fn create_data_array(
        &self,
        name: &str,
        entity_type: &str,
        data_type: DataType,
        extent: &[u64],
    ) -> RepoResult<DataArray> {
        let _guard = self.ctx().write()?;
        let (id, location) = self.allocate(ObjectType::DataArray, name)?;
        let array = DataArray::create(self, location, &id, name, entity_type, data_type, extent)?;
        self.core.touch()?;
        Ok(array)
    }

    pub fn create_data_frame(
        &self,
        name: &str,
        entity_type: &str,
        columns: Vec<Column>,
    ) -> RepoResult<DataFrame> {
        let _guard = self.ctx().write()?;
        let (id, location) = self.allocate(ObjectType::DataFrame, name)?;
        let frame = DataFrame::create(self, location, &id, name, entity_type, columns)?;
        self.core.touch()?;
        Ok(frame)
    }

    /// Creates a tag at `position`, one coordinate per referenced axis.
    pub fn create_tag(&self, name: &str, entity_type: &str, position: Vec<f64>) -> RepoResult<Tag> {
        let _guard = self.ctx().write()?;
        let (id, location) = self.allocate(ObjectType::Tag, name)?;
        let tag = Tag::create(self, location, &id, name, entity_type, position)?;
        self.core.touch()?;
        Ok(tag)
    }

    /// Creates a multi-tag; each row of `positions` is one tagged point.
    pub fn create_multi_tag(
        &self,
        name: &str,
        entity_type: &str,
        positions: Vec<Vec<f64>>,
    ) -> RepoResult<MultiTag> {
        let _guard = self.ctx().write()?;
        let (id, location) = self.allocate(ObjectType::MultiTag, name)?;
        let tag = MultiTag::create(self, location, &id, name, entity_type, positions)?;
        self.core.touch()?;
        Ok(tag)
    }

    pub fn create_group(&self, name: &str, entity_type: &str) -> RepoResult<Group> {
        let _guard = self.ctx().write()?;
        let (id, location) = self.allocate(ObjectType::Group, name)?;
        let group = Group::create(self, location, &id, name, entity_type)?;
        self.core.touch()?;
        Ok(group)
    }

    pub fn create_source(&self, name: &str, entity_type: &str) -> RepoResult<Source> {
        let _guard = self.ctx().write()?;
        let (id, location) = self.allocate(ObjectType::Source, name)?;
        let source = Source::create(self, location, &id, name, entity_type)?;
        self.core.touch()?;
        Ok(source)
    }

    fn allocate(&self, kind: ObjectType, name: &str) -> RepoResult<(EntityId, PathBuf)> {
        if name.trim().is_empty() {
            return Err(RepoError::InvalidArgument(format!(
                "{kind} name must not be blank"
            )));
        }
        let id = create_id();
        let location = self.collection(kind).allocate(&id);
        Ok((id, location))
    }
}

/// Depth-first search through nested source collections.
fn find_source(dir: &Directory, key: &NameOrId) -> RepoResult<Option<PathBuf>> {
    if let Some(found) = super::collection::locate(dir, key)? {
        return Ok(Some(found));
    }
    for child in dir.children()? {
        let nested = Directory::new(child).sub_dir(ObjectType::Source.collection_name());
        if let Some(found) = find_source(&nested, key)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}
