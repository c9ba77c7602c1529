//! Container root: open modes, format check, blocks and metadata sections.
//!
//! # Responsibility
//! - Open, create or overwrite a container directory.
//! - Own the top-level `blocks/` and `metadata/` collections.
//!
//! # Invariants
//! - An existing root must carry the `datanest` format tag and a matching
//!   major version; anything else is rejected without modification.
//! - A read-only open never creates or changes anything on disk.

use super::block::Block;
use super::collection::Collection;
use super::entity::{Entity, EntityCore};
use super::section::Section;
use super::{RepoError, RepoResult};
use crate::model::entity::{create_id, NameOrId, ObjectType};
use crate::service::validate::{validate_file, ValidationResult};
use crate::store::{AttributedDirectory, Directory, FileContext, FileMode};
use log::{error, info};
use serde_json::json;
use std::path::Path;
use std::time::Instant;

/// Format tag written to every container root.
pub const FORMAT_NAME: &str = "datanest";
/// On-disk layout version as `[major, minor, patch]`.
pub const FORMAT_VERSION: [u32; 3] = [1, 0, 0];

const ATTR_FORMAT: &str = "format";
const ATTR_VERSION: &str = "version";
const METADATA_COLLECTION: &str = "metadata";

#[derive(Debug, Clone)]
pub struct DataFile {
    core: EntityCore,
}

impl Entity for DataFile {
    fn core(&self) -> &EntityCore {
        &self.core
    }
}

impl DataFile {
    /// Opens the container rooted at `path`.
    ///
    /// # Side effects
    /// - `ReadWrite` creates a missing container; `Overwrite` wipes and
    ///   recreates it.
    /// - Emits `container_open` events with duration and status.
    ///
    /// # Errors
    /// - `NotFound` when a read-only open targets a missing container.
    /// - `InvalidState` when the root holds another format or major version.
    pub fn open(path: impl AsRef<Path>, mode: FileMode) -> RepoResult<Self> {
        let path = path.as_ref();
        let started_at = Instant::now();
        info!(
            "event=container_open module=repo status=start mode={:?} path={}",
            mode,
            path.display()
        );

        match Self::open_inner(path, mode) {
            Ok(file) => {
                info!(
                    "event=container_open module=repo status=ok mode={:?} duration_ms={}",
                    mode,
                    started_at.elapsed().as_millis()
                );
                Ok(file)
            }
            Err(err) => {
                error!(
                    "event=container_open module=repo status=error mode={:?} duration_ms={} error={}",
                    mode,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn open_inner(path: &Path, mode: FileMode) -> RepoResult<Self> {
        let root = Directory::new(path);
        if mode == FileMode::Overwrite {
            root.remove_all()?;
        }

        let record = AttributedDirectory::new(path);
        if record.has_record() {
            check_format(&record)?;
            let ctx = FileContext::new(path, mode);
            return Ok(Self {
                core: EntityCore::open(ctx, path),
            });
        }

        if mode == FileMode::ReadOnly {
            return Err(RepoError::NotFound {
                kind: ObjectType::File,
                key: path.display().to_string(),
            });
        }

        // Created first so the lock is keyed by the canonical root.
        root.ensure()?;
        let ctx = FileContext::new(path, mode);
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(FORMAT_NAME)
            .to_string();
        let id = create_id();
        let core = EntityCore::create(
            ctx,
            path,
            ObjectType::File,
            &id,
            &name,
            None,
            vec![
                (ATTR_FORMAT, json!(FORMAT_NAME)),
                (ATTR_VERSION, json!(FORMAT_VERSION)),
            ],
        )?;
        Ok(Self { core })
    }

    pub fn mode(&self) -> FileMode {
        self.core.ctx().mode()
    }

    pub fn format(&self) -> RepoResult<String> {
        let _guard = self.core.ctx().read();
        Ok(self.core.attrs().require(ATTR_FORMAT)?)
    }

    pub fn version(&self) -> RepoResult<[u32; 3]> {
        let _guard = self.core.ctx().read();
        Ok(self.core.attrs().require(ATTR_VERSION)?)
    }

    fn blocks_collection(&self) -> Collection {
        Collection::new(self.core.directory(), ObjectType::Block)
    }

    fn sections_collection(&self) -> Collection {
        Collection::named(self.core.directory(), METADATA_COLLECTION, ObjectType::Section)
    }

    fn open_block(&self, location: std::path::PathBuf) -> Block {
        Block::open(self.core.ctx().clone(), location)
    }

    fn open_section(&self, location: std::path::PathBuf) -> Section {
        Section::open(self.core.ctx().clone(), location)
    }

    pub fn create_block(&self, name: &str, entity_type: &str) -> RepoResult<Block> {
        let _guard = self.core.ctx().write()?;
        if name.trim().is_empty() {
            return Err(RepoError::InvalidArgument(
                "block name must not be blank".into(),
            ));
        }
        let id = create_id();
        let location = self.blocks_collection().allocate(&id);
        let block = Block::create(
            self.core.ctx().clone(),
            location,
            &id,
            name,
            Some(entity_type),
        )?;
        self.core.touch()?;
        Ok(block)
    }

    pub fn has_block(&self, key: impl Into<NameOrId>) -> RepoResult<bool> {
        let _guard = self.core.ctx().read();
        self.blocks_collection().contains(&key.into())
    }

    pub fn block_count(&self) -> RepoResult<u64> {
        let _guard = self.core.ctx().read();
        self.blocks_collection().count()
    }

    pub fn get_block(&self, key: impl Into<NameOrId>) -> RepoResult<Option<Block>> {
        let _guard = self.core.ctx().read();
        Ok(self
            .blocks_collection()
            .locate(&key.into())?
            .map(|location| self.open_block(location)))
    }

    pub fn get_block_at(&self, index: u64) -> RepoResult<Block> {
        let _guard = self.core.ctx().read();
        let location = self.blocks_collection().location_at(index)?;
        Ok(self.open_block(location))
    }

    pub fn blocks(&self) -> RepoResult<Vec<Block>> {
        let _guard = self.core.ctx().read();
        Ok(self
            .blocks_collection()
            .locations()?
            .into_iter()
            .map(|location| self.open_block(location))
            .collect())
    }

    /// Deletes a block and everything it owns.
    pub fn delete_block(&self, key: impl Into<NameOrId>) -> RepoResult<bool> {
        let _guard = self.core.ctx().write()?;
        let deleted = self.blocks_collection().delete(&key.into())?;
        if deleted {
            self.core.touch()?;
        }
        Ok(deleted)
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
            .map(|location| self.open_section(location)))
    }

    pub fn get_section_at(&self, index: u64) -> RepoResult<Section> {
        let _guard = self.core.ctx().read();
        let location = self.sections_collection().location_at(index)?;
        Ok(self.open_section(location))
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
            .map(|location| self.open_section(location))
            .collect())
    }

    /// Deletes a root section and its subtree. Links to it are left dangling.
    pub fn delete_section(&self, key: impl Into<NameOrId>) -> RepoResult<bool> {
        let _guard = self.core.ctx().write()?;
        let deleted = self.sections_collection().delete(&key.into())?;
        if deleted {
            self.core.touch()?;
        }
        Ok(deleted)
    }

    /// Every root section and its descendants down to `max_depth` levels.
    pub fn find_sections(&self, max_depth: usize) -> RepoResult<Vec<Section>> {
        let _guard = self.core.ctx().read();
        let mut found = Vec::new();
        for root in self.sections_unlocked()? {
            found.extend(root.find_sections_unlocked(max_depth)?);
        }
        Ok(found)
    }

    /// Checks every entity for structural consistency.
    pub fn validate(&self) -> RepoResult<ValidationResult> {
        validate_file(self)
    }
}

fn check_format(record: &AttributedDirectory) -> RepoResult<()> {
    let format: Option<String> = record.get(ATTR_FORMAT)?;
    if format.as_deref() != Some(FORMAT_NAME) {
        return Err(RepoError::InvalidState(format!(
            "`{}` is not a {FORMAT_NAME} container (format {:?})",
            record.location().display(),
            format
        )));
    }
    let version: Option<[u32; 3]> = record.get(ATTR_VERSION)?;
    match version {
        Some([major, ..]) if major == FORMAT_VERSION[0] => Ok(()),
        other => Err(RepoError::InvalidState(format!(
            "unsupported container version {other:?}, expected major {}",
            FORMAT_VERSION[0]
        ))),
    }
}
