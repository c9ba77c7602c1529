//! Attributed Container: typed attribute records for one location.
//!
//! # Responsibility
//! - Read and write the attribute record stored beside an entity.
//! - Keep "never set", "set" and "explicitly cleared" distinguishable.
//!
//! # Invariants
//! - A record is rewritten as a whole through a temp file in the same
//!   directory followed by an atomic rename. Readers never see a partial file.
//! - A cleared attribute is persisted as JSON `null`; an unset one is absent.

use super::directory::Directory;
use super::{StoreError, StoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// File name of the per-location attribute record.
pub const ATTRIBUTES_FILE: &str = ".attributes.json";

const TEMP_PREFIX: &str = ".attributes-";

/// Persisted state of a single attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeState {
    /// Never written.
    Unset,
    /// Written, then explicitly cleared.
    Cleared,
    /// Holds a value.
    Set(Value),
}

impl AttributeState {
    pub fn is_set(&self) -> bool {
        matches!(self, Self::Set(_))
    }
}

/// A [`Directory`] that also carries an attribute record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributedDirectory {
    dir: Directory,
}

impl AttributedDirectory {
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            dir: Directory::new(location),
        }
    }

    pub fn directory(&self) -> &Directory {
        &self.dir
    }

    pub fn location(&self) -> &Path {
        self.dir.location()
    }

    fn record_path(&self) -> PathBuf {
        self.location().join(ATTRIBUTES_FILE)
    }

    /// True once any attribute has been written here.
    pub fn has_record(&self) -> bool {
        self.record_path().is_file()
    }

    fn load(&self) -> StoreResult<Map<String, Value>> {
        let path = self.record_path();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(err) => return Err(StoreError::io(&path, err)),
        };
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(StoreError::InvalidData(format!(
                "attribute record `{}` is not an object",
                path.display()
            ))),
            Err(err) => Err(StoreError::encoding(&path, err)),
        }
    }

    fn store(&self, record: &Map<String, Value>) -> StoreResult<()> {
        self.dir.ensure()?;
        let path = self.record_path();
        let bytes =
            serde_json::to_vec_pretty(record).map_err(|err| StoreError::encoding(&path, err))?;

        let mut temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(self.location())
            .map_err(|err| StoreError::io(self.location(), err))?;
        temp.write_all(&bytes)
            .and_then(|()| temp.as_file().sync_all())
            .map_err(|err| StoreError::io(temp.path(), err))?;
        temp.persist(&path)
            .map_err(|err| StoreError::io(&path, err.error))?;
        Ok(())
    }

    pub fn state(&self, key: &str) -> StoreResult<AttributeState> {
        Ok(match self.load()?.remove(key) {
            None => AttributeState::Unset,
            Some(Value::Null) => AttributeState::Cleared,
            Some(value) => AttributeState::Set(value),
        })
    }

    pub fn has(&self, key: &str) -> StoreResult<bool> {
        Ok(self.state(key)?.is_set())
    }

    /// Returns the decoded value, or `None` when unset or cleared.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.state(key)? {
            AttributeState::Set(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|err| StoreError::encoding(self.record_path(), err)),
            AttributeState::Unset | AttributeState::Cleared => Ok(None),
        }
    }

    /// Like [`get`](Self::get) but treats absence as corrupt state.
    pub fn require<T: DeserializeOwned>(&self, key: &str) -> StoreResult<T> {
        self.get(key)?.ok_or_else(|| {
            StoreError::InvalidData(format!(
                "required attribute `{key}` missing at `{}`",
                self.location().display()
            ))
        })
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<()> {
        self.set_many([(key, encode(value, &self.record_path())?)])
    }

    /// Writes several attributes in one atomic record replacement.
    pub fn set_many<'a, I>(&self, entries: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        let mut record = self.load()?;
        for (key, value) in entries {
            record.insert(key.to_string(), value);
        }
        self.store(&record)
    }

    /// Marks the attribute as explicitly cleared.
    pub fn clear(&self, key: &str) -> StoreResult<()> {
        self.set_many([(key, Value::Null)])
    }

    /// Forgets the attribute entirely, returning it to the unset state.
    pub fn remove(&self, key: &str) -> StoreResult<()> {
        let mut record = self.load()?;
        if record.remove(key).is_some() {
            self.store(&record)?;
        }
        Ok(())
    }
}

/// Serializes one attribute value, tagging failures with the record path.
pub(crate) fn encode<T: Serialize + ?Sized>(value: &T, path: &Path) -> StoreResult<Value> {
    serde_json::to_value(value).map_err(|err| StoreError::encoding(path, err))
}
