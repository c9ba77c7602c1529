//! Owned child collections (`blocks/`, `data_arrays/`, `features/`, ...).

use super::entity::ATTR_NAME;
use super::{RepoError, RepoResult};
use crate::model::entity::{NameOrId, ObjectType};
use crate::store::{Directory, StoreResult};
use log::info;
use std::path::PathBuf;

/// Resolves `key` among the live children of `dir`.
///
/// Child entries are named by id, so the id path is a single lookup. Name
/// matches fall back to a scan of each child's attribute record.
pub(crate) fn locate(dir: &Directory, key: &NameOrId) -> StoreResult<Option<PathBuf>> {
    match key {
        NameOrId::Id(id) => Ok(dir
            .has_child(id)
            .then(|| dir.location().join(id))),
        NameOrId::Name(name) => dir.find_by_attribute(ATTR_NAME, name),
        NameOrId::Any(value) => dir.find_by_name_or_attribute(ATTR_NAME, value),
    }
}

/// Entities of one kind owned by a parent location.
#[derive(Debug, Clone)]
pub(crate) struct Collection {
    dir: Directory,
    kind: ObjectType,
}

impl Collection {
    /// Collection stored under the kind's default sub-location.
    pub(crate) fn new(parent: &Directory, kind: ObjectType) -> Self {
        Self::named(parent, kind.collection_name(), kind)
    }

    pub(crate) fn named(parent: &Directory, name: &str, kind: ObjectType) -> Self {
        Self {
            dir: parent.sub_dir(name),
            kind,
        }
    }

    pub(crate) fn directory(&self) -> &Directory {
        &self.dir
    }

    pub(crate) fn locate(&self, key: &NameOrId) -> RepoResult<Option<PathBuf>> {
        Ok(locate(&self.dir, key)?)
    }

    pub(crate) fn contains(&self, key: &NameOrId) -> RepoResult<bool> {
        Ok(self.locate(key)?.is_some())
    }

    pub(crate) fn count(&self) -> RepoResult<u64> {
        Ok(self.dir.child_count()?)
    }

    pub(crate) fn location_at(&self, index: u64) -> RepoResult<PathBuf> {
        self.dir.child_at(index)?.ok_or_else(|| {
            RepoError::out_of_bounds(format!("no {} at this index", self.kind), index)
        })
    }

    pub(crate) fn locations(&self) -> RepoResult<Vec<PathBuf>> {
        Ok(self.dir.children()?)
    }

    /// Location a new child with `id` will occupy. Nothing is created.
    pub(crate) fn allocate(&self, id: &str) -> PathBuf {
        self.dir.location().join(id)
    }

    /// Deletes the matching child and everything it owns.
    pub(crate) fn delete(&self, key: &NameOrId) -> RepoResult<bool> {
        let Some(location) = self.locate(key)? else {
            return Ok(false);
        };
        Directory::new(&location).remove_all()?;
        info!(
            "event=entity_deleted module=repo status=ok kind={} location={}",
            self.kind,
            location.display()
        );
        Ok(true)
    }
}
