//! Identity, timestamps and the shared entity surface.
//!
//! # Invariants
//! - `id` and `kind` are written once at creation and never changed.
//! - Every mutating call bumps `updated_at` unless it is a `force_*` call.
//! - Timestamps are epoch milliseconds.

use super::block::{Block, BlockEntity};
use super::link_set::{canonical, LinkSet};
use super::section::Section;
use super::source::Source;
use super::{RepoError, RepoResult};
use crate::model::entity::{now_epoch_ms, EntityId, NameOrId, ObjectType, Timestamp};
use crate::store::{AttributedDirectory, Directory, FileContext};
use log::info;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub(crate) const ATTR_ID: &str = "id";
pub(crate) const ATTR_KIND: &str = "kind";
pub(crate) const ATTR_NAME: &str = "name";
pub(crate) const ATTR_TYPE: &str = "type";
pub(crate) const ATTR_DEFINITION: &str = "definition";
pub(crate) const ATTR_CREATED_AT: &str = "created_at";
pub(crate) const ATTR_UPDATED_AT: &str = "updated_at";

const METADATA_DIR: &str = "metadata";
const SOURCES_DIR: &str = "sources";

/// Storage handle shared by every entity kind.
#[derive(Debug, Clone)]
pub struct EntityCore {
    ctx: Arc<FileContext>,
    attrs: AttributedDirectory,
}

impl EntityCore {
    pub(crate) fn open(ctx: Arc<FileContext>, location: impl Into<PathBuf>) -> Self {
        Self {
            ctx,
            attrs: AttributedDirectory::new(location),
        }
    }

    /// Initializes a new entity record. Caller holds the write lock.
    pub(crate) fn create(
        ctx: Arc<FileContext>,
        location: impl Into<PathBuf>,
        kind: ObjectType,
        id: &str,
        name: &str,
        entity_type: Option<&str>,
        extra: Vec<(&str, Value)>,
    ) -> RepoResult<Self> {
        let core = Self::open(ctx, location);
        core.attrs.directory().ensure()?;
        let now = now_epoch_ms();
        let mut entries = vec![
            (ATTR_ID, json!(id)),
            (ATTR_KIND, json!(kind)),
            (ATTR_NAME, json!(name)),
            (ATTR_CREATED_AT, json!(now)),
            (ATTR_UPDATED_AT, json!(now)),
        ];
        if let Some(entity_type) = entity_type {
            entries.push((ATTR_TYPE, json!(entity_type)));
        }
        entries.extend(extra);
        core.attrs.set_many(entries)?;
        info!(
            "event=entity_created module=repo status=ok kind={} id={}",
            kind, id
        );
        Ok(core)
    }

    pub fn ctx(&self) -> &Arc<FileContext> {
        &self.ctx
    }

    pub fn attrs(&self) -> &AttributedDirectory {
        &self.attrs
    }

    pub fn directory(&self) -> &Directory {
        self.attrs.directory()
    }

    pub fn location(&self) -> &Path {
        self.attrs.location()
    }

    pub(crate) fn id_unlocked(&self) -> RepoResult<EntityId> {
        Ok(self.attrs.require(ATTR_ID)?)
    }

    pub(crate) fn name_unlocked(&self) -> RepoResult<String> {
        Ok(self.attrs.get(ATTR_NAME)?.unwrap_or_default())
    }

    /// Sets `updated_at` to now. Caller holds the write lock.
    pub(crate) fn touch(&self) -> RepoResult<()> {
        self.attrs.set(ATTR_UPDATED_AT, &now_epoch_ms())?;
        Ok(())
    }

    /// Writes one attribute and bumps `updated_at` in the same record update.
    pub(crate) fn set_and_touch(&self, key: &str, value: Value) -> RepoResult<()> {
        self.attrs
            .set_many([(key, value), (ATTR_UPDATED_AT, json!(now_epoch_ms()))])?;
        Ok(())
    }
}

/// Identity and bookkeeping shared by all entities.
pub trait Entity {
    fn core(&self) -> &EntityCore;

    fn id(&self) -> RepoResult<EntityId> {
        let core = self.core();
        let _guard = core.ctx().read();
        core.id_unlocked()
    }

    fn kind(&self) -> RepoResult<ObjectType> {
        let core = self.core();
        let _guard = core.ctx().read();
        Ok(core.attrs().require(ATTR_KIND)?)
    }

    fn name(&self) -> RepoResult<String> {
        let core = self.core();
        let _guard = core.ctx().read();
        core.name_unlocked()
    }

    fn set_name(&self, name: &str) -> RepoResult<()> {
        let core = self.core();
        let _guard = core.ctx().write()?;
        if name.trim().is_empty() {
            return Err(RepoError::InvalidArgument("name must not be blank".into()));
        }
        core.set_and_touch(ATTR_NAME, json!(name))
    }

    fn entity_type(&self) -> RepoResult<Option<String>> {
        let core = self.core();
        let _guard = core.ctx().read();
        Ok(core.attrs().get(ATTR_TYPE)?)
    }

    fn set_entity_type(&self, entity_type: &str) -> RepoResult<()> {
        let core = self.core();
        let _guard = core.ctx().write()?;
        core.set_and_touch(ATTR_TYPE, json!(entity_type))
    }

    fn definition(&self) -> RepoResult<Option<String>> {
        let core = self.core();
        let _guard = core.ctx().read();
        Ok(core.attrs().get(ATTR_DEFINITION)?)
    }

    fn set_definition(&self, definition: &str) -> RepoResult<()> {
        let core = self.core();
        let _guard = core.ctx().write()?;
        core.set_and_touch(ATTR_DEFINITION, json!(definition))
    }

    fn clear_definition(&self) -> RepoResult<()> {
        let core = self.core();
        let _guard = core.ctx().write()?;
        core.set_and_touch(ATTR_DEFINITION, Value::Null)
    }

    fn created_at(&self) -> RepoResult<Timestamp> {
        let core = self.core();
        let _guard = core.ctx().read();
        Ok(core.attrs().require(ATTR_CREATED_AT)?)
    }

    fn updated_at(&self) -> RepoResult<Timestamp> {
        let core = self.core();
        let _guard = core.ctx().read();
        Ok(core.attrs().require(ATTR_UPDATED_AT)?)
    }

    /// Bumps `updated_at` to now.
    fn set_updated_at(&self) -> RepoResult<()> {
        let core = self.core();
        let _guard = core.ctx().write()?;
        core.touch()
    }

    /// Overwrites `updated_at` with a historical value (imports, migrations).
    fn force_updated_at(&self, time: Timestamp) -> RepoResult<()> {
        let core = self.core();
        let _guard = core.ctx().write()?;
        core.attrs().set(ATTR_UPDATED_AT, &time)?;
        Ok(())
    }

    /// Overwrites `created_at` with a historical value (imports, migrations).
    fn force_created_at(&self, time: Timestamp) -> RepoResult<()> {
        let core = self.core();
        let _guard = core.ctx().write()?;
        core.attrs().set(ATTR_CREATED_AT, &time)?;
        Ok(())
    }

    fn location(&self) -> &Path {
        self.core().location()
    }

    /// False once the backing storage has been deleted.
    fn exists(&self) -> bool {
        self.core().attrs().has_record()
    }
}

/// Entities that can point at one metadata section.
pub trait EntityWithMetadata: Entity {
    fn metadata(&self) -> RepoResult<Option<Section>> {
        let core = self.core();
        let _guard = core.ctx().read();
        let links = core.directory().sub_dir(METADATA_DIR);
        match links.child_at(0)? {
            Some(link) => {
                let target = canonical(&link)?;
                Ok(Some(Section::open(core.ctx().clone(), target)))
            }
            None => Ok(None),
        }
    }

    /// Points this entity at `section`, replacing any previous association.
    fn set_metadata(&self, section: &Section) -> RepoResult<()> {
        let core = self.core();
        let _guard = core.ctx().write()?;
        if !section.exists() {
            return Err(RepoError::NotFound {
                kind: ObjectType::Section,
                key: section.location().display().to_string(),
            });
        }
        let section_id = section.core().id_unlocked()?;
        let links = core.directory().sub_dir(METADATA_DIR);
        links.clear()?;
        links.create_link(section.location(), &section_id)?;
        core.touch()
    }

    /// Drops the association. The section itself is untouched.
    fn remove_metadata(&self) -> RepoResult<bool> {
        let core = self.core();
        let _guard = core.ctx().write()?;
        let removed = core.directory().sub_dir(METADATA_DIR).clear()? > 0;
        if removed {
            core.touch()?;
        }
        Ok(removed)
    }
}

/// Entities that link to sources owned by their block.
pub trait EntityWithSources: EntityWithMetadata {
    fn owner_block(&self) -> &Block;

    fn has_source(&self, key: impl Into<NameOrId>) -> RepoResult<bool> {
        let _guard = self.core().ctx().read();
        source_links(self.core()).contains(self.owner_block(), &key.into())
    }

    fn source_count(&self) -> RepoResult<u64> {
        let _guard = self.core().ctx().read();
        source_links(self.core()).count()
    }

    fn get_source(&self, key: impl Into<NameOrId>) -> RepoResult<Option<Source>> {
        let _guard = self.core().ctx().read();
        let block = self.owner_block();
        Ok(source_links(self.core())
            .get(block, &key.into())?
            .map(|location| Source::open_in(block, location)))
    }

    fn get_source_at(&self, index: u64) -> RepoResult<Source> {
        let _guard = self.core().ctx().read();
        let block = self.owner_block();
        let location = source_links(self.core()).get_at(index)?;
        Ok(Source::open_in(block, location))
    }

    fn sources(&self) -> RepoResult<Vec<Source>> {
        let _guard = self.core().ctx().read();
        let block = self.owner_block();
        Ok(source_links(self.core())
            .locations()?
            .into_iter()
            .map(|location| Source::open_in(block, location))
            .collect())
    }

    fn add_source(&self, key: impl Into<NameOrId>) -> RepoResult<()> {
        let _guard = self.core().ctx().write()?;
        if source_links(self.core()).add(self.owner_block(), &key.into())? {
            self.core().touch()?;
        }
        Ok(())
    }

    fn remove_source(&self, key: impl Into<NameOrId>) -> RepoResult<bool> {
        let _guard = self.core().ctx().write()?;
        let removed = source_links(self.core()).remove(&key.into())?;
        if removed {
            self.core().touch()?;
        }
        Ok(removed)
    }

    fn set_sources<I, K>(&self, keys: I) -> RepoResult<()>
    where
        I: IntoIterator<Item = K>,
        K: Into<NameOrId>,
    {
        let keys: Vec<NameOrId> = keys.into_iter().map(Into::into).collect();
        let _guard = self.core().ctx().write()?;
        source_links(self.core()).replace(self.owner_block(), &keys)?;
        self.core().touch()
    }
}

fn source_links(core: &EntityCore) -> LinkSet {
    LinkSet::new(core.directory().sub_dir(SOURCES_DIR), ObjectType::Source)
}
