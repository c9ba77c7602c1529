//! Non-owning link sets: tag references, group members and sources.
//!
//! # Invariants
//! - Link entries are named by the target's id and hold a path relative to
//!   the link set, so moving the container keeps them live.
//! - Keys are resolved through the owning block on every call; nothing holds
//!   a live handle to a target.
//! - Removing a link never touches the target.

use super::block::EntityResolver;
use super::collection::locate;
use super::{RepoError, RepoResult};
use crate::model::entity::{EntityId, NameOrId, ObjectType};
use crate::store::{Directory, StoreError};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub(crate) struct LinkSet {
    dir: Directory,
    kind: ObjectType,
}

impl LinkSet {
    pub(crate) fn new(dir: Directory, kind: ObjectType) -> Self {
        Self { dir, kind }
    }

    pub(crate) fn count(&self) -> RepoResult<u64> {
        Ok(self.dir.child_count()?)
    }

    pub(crate) fn contains(
        &self,
        resolver: &impl EntityResolver,
        key: &NameOrId,
    ) -> RepoResult<bool> {
        Ok(match resolver.resolve_id(self.kind, key)? {
            Some(id) => self.dir.has_child(&id),
            None => false,
        })
    }

    /// Canonical target location, or `None` when unresolved or dangling.
    pub(crate) fn get(
        &self,
        resolver: &impl EntityResolver,
        key: &NameOrId,
    ) -> RepoResult<Option<PathBuf>> {
        let Some(id) = resolver.resolve_id(self.kind, key)? else {
            return Ok(None);
        };
        if !self.dir.has_child(&id) {
            return Ok(None);
        }
        canonical(&self.dir.location().join(&id)).map(Some)
    }

    pub(crate) fn get_at(&self, index: u64) -> RepoResult<PathBuf> {
        let link = self.dir.child_at(index)?.ok_or_else(|| {
            RepoError::out_of_bounds(format!("no linked {} at this index", self.kind), index)
        })?;
        canonical(&link)
    }

    pub(crate) fn locations(&self) -> RepoResult<Vec<PathBuf>> {
        self.dir
            .children()?
            .iter()
            .map(|link| canonical(link))
            .collect()
    }

    /// Links the resolved target. Returns `false` when it was already linked.
    pub(crate) fn add(&self, resolver: &impl EntityResolver, key: &NameOrId) -> RepoResult<bool> {
        let (id, target) = self.resolve_target(resolver, key)?;
        Ok(self.dir.create_link(&target, &id)?)
    }

    /// Unlinks by id, falling back to the linked entities' names.
    pub(crate) fn remove(&self, key: &NameOrId) -> RepoResult<bool> {
        let entry = match key {
            NameOrId::Id(id) => Some(id.clone()),
            NameOrId::Any(value) if self.dir.has_entry(value) => Some(value.clone()),
            NameOrId::Any(_) | NameOrId::Name(_) => locate(&self.dir, key)?
                .and_then(|path| path.file_name().and_then(|n| n.to_str()).map(str::to_owned)),
        };
        match entry {
            Some(name) => Ok(self.dir.remove_child(&name)?),
            None => Ok(false),
        }
    }

    /// Replaces the whole set.
    ///
    /// Every key is resolved before anything is unlinked, so an unresolvable
    /// key leaves the current set untouched. Callers hold the write lock for
    /// the duration, so readers never observe the intermediate empty set.
    pub(crate) fn replace(
        &self,
        resolver: &impl EntityResolver,
        keys: &[NameOrId],
    ) -> RepoResult<()> {
        let targets = keys
            .iter()
            .map(|key| self.resolve_target(resolver, key))
            .collect::<RepoResult<Vec<_>>>()?;

        let removed = self.dir.clear()?;
        self.dir.ensure()?;
        for (id, target) in &targets {
            self.dir.create_link(target, id)?;
        }
        info!(
            "event=links_replaced module=repo status=ok kind={} removed={} linked={} location={}",
            self.kind,
            removed,
            targets.len(),
            self.dir.location().display()
        );
        Ok(())
    }

    fn resolve_target(
        &self,
        resolver: &impl EntityResolver,
        key: &NameOrId,
    ) -> RepoResult<(EntityId, PathBuf)> {
        let id = resolver
            .resolve_id(self.kind, key)?
            .ok_or_else(|| RepoError::not_found(self.kind, key))?;
        let target = resolver
            .entity_location(self.kind, &id)?
            .ok_or_else(|| RepoError::not_found(self.kind, key))?;
        Ok((id, target))
    }
}

pub(crate) fn canonical(path: &Path) -> RepoResult<PathBuf> {
    fs::canonicalize(path).map_err(|err| StoreError::io(path, err).into())
}
