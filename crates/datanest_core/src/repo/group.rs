//! Group: named, non-owning collections of a block's entities.
//!
//! # Invariants
//! - Each member kind has its own link sub-location, so equal ids of
//!   different kinds never collide.
//! - Members must exist in the owning block when added; removing a member
//!   never deletes it.

use super::block::{Block, BlockEntity};
use super::data_array::DataArray;
use super::data_frame::DataFrame;
use super::entity::{Entity, EntityCore, EntityWithMetadata, EntityWithSources};
use super::link_set::LinkSet;
use super::multi_tag::MultiTag;
use super::tag::Tag;
use super::RepoResult;
use crate::model::entity::{NameOrId, ObjectType};
use std::path::PathBuf;

/// Entity kinds a group can hold.
pub trait GroupMember: BlockEntity {}

impl GroupMember for DataArray {}
impl GroupMember for DataFrame {}
impl GroupMember for Tag {}
impl GroupMember for MultiTag {}

#[derive(Debug, Clone)]
pub struct Group {
    core: EntityCore,
    block: Block,
}

impl Entity for Group {
    fn core(&self) -> &EntityCore {
        &self.core
    }
}

impl EntityWithMetadata for Group {}

impl EntityWithSources for Group {
    fn owner_block(&self) -> &Block {
        &self.block
    }
}

impl BlockEntity for Group {
    const KIND: ObjectType = ObjectType::Group;

    fn open_in(block: &Block, location: PathBuf) -> Self {
        Self {
            core: EntityCore::open(block.ctx().clone(), location),
            block: block.clone(),
        }
    }
}

impl Group {
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
            ObjectType::Group,
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

    fn links<T: GroupMember>(&self) -> LinkSet {
        LinkSet::new(
            self.core.directory().sub_dir(T::KIND.collection_name()),
            T::KIND,
        )
    }

    pub fn has_member<T: GroupMember>(&self, key: impl Into<NameOrId>) -> RepoResult<bool> {
        let _guard = self.core.ctx().read();
        self.links::<T>().contains(&self.block, &key.into())
    }

    pub fn member_count<T: GroupMember>(&self) -> RepoResult<u64> {
        let _guard = self.core.ctx().read();
        self.links::<T>().count()
    }

    pub fn get_member<T: GroupMember>(&self, key: impl Into<NameOrId>) -> RepoResult<Option<T>> {
        let _guard = self.core.ctx().read();
        Ok(self
            .links::<T>()
            .get(&self.block, &key.into())?
            .map(|location| T::open_in(&self.block, location)))
    }

    pub fn get_member_at<T: GroupMember>(&self, index: u64) -> RepoResult<T> {
        let _guard = self.core.ctx().read();
        let location = self.links::<T>().get_at(index)?;
        Ok(T::open_in(&self.block, location))
    }

    pub fn members<T: GroupMember>(&self) -> RepoResult<Vec<T>> {
        let _guard = self.core.ctx().read();
        Ok(self
            .links::<T>()
            .locations()?
            .into_iter()
            .map(|location| T::open_in(&self.block, location))
            .collect())
    }

    /// Adds an existing entity of the block. Adding it twice is a no-op.
    pub fn add_member<T: GroupMember>(&self, key: impl Into<NameOrId>) -> RepoResult<()> {
        let _guard = self.core.ctx().write()?;
        if self.links::<T>().add(&self.block, &key.into())? {
            self.core.touch()?;
        }
        Ok(())
    }

    pub fn remove_member<T: GroupMember>(&self, key: impl Into<NameOrId>) -> RepoResult<bool> {
        let _guard = self.core.ctx().write()?;
        let removed = self.links::<T>().remove(&key.into())?;
        if removed {
            self.core.touch()?;
        }
        Ok(removed)
    }

    /// Replaces every member of kind `T`. Other kinds are untouched.
    pub fn set_members<T, I, K>(&self, keys: I) -> RepoResult<()>
    where
        T: GroupMember,
        I: IntoIterator<Item = K>,
        K: Into<NameOrId>,
    {
        let keys: Vec<NameOrId> = keys.into_iter().map(Into::into).collect();
        let _guard = self.core.ctx().write()?;
        self.links::<T>().replace(&self.block, &keys)?;
        self.core.touch()
    }
}
