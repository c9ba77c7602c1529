//! Directory Store: one entity location plus its immediate children.
//!
//! # Responsibility
//! - Enumerate, count and resolve child locations.
//! - Create and remove directory links keyed by entity id.
//!
//! # Invariants
//! - Hidden entries (leading `.`) are never children; they hold attribute
//!   records and in-flight temp files.
//! - A child is a directory or a link to a live directory. Dangling links are
//!   skipped by enumeration and by resolution.
//! - Children are ordered by entry name, so ordinal access is deterministic.

use super::attributes::AttributedDirectory;
use super::{StoreError, StoreResult};
use log::{debug, info};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// One location in the hierarchical namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    location: PathBuf,
}

impl Directory {
    /// Wraps a location without touching the filesystem.
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
        }
    }

    /// Wraps a location and creates it (with parents) when missing.
    pub fn create(location: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = Self::new(location);
        dir.ensure()?;
        Ok(dir)
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Returns a handle for the named sub-location; nothing is created.
    pub fn sub_dir(&self, name: &str) -> Directory {
        Directory::new(self.location.join(name))
    }

    pub fn exists(&self) -> bool {
        self.location.is_dir()
    }

    pub fn ensure(&self) -> StoreResult<()> {
        fs::create_dir_all(&self.location).map_err(|err| StoreError::io(&self.location, err))
    }

    /// Lists live children sorted by entry name.
    ///
    /// A missing location is treated as an empty collection.
    pub fn children(&self) -> StoreResult<Vec<PathBuf>> {
        let read_dir = match fs::read_dir(&self.location) {
            Ok(read_dir) => read_dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StoreError::io(&self.location, err)),
        };

        let mut names = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|err| StoreError::io(&self.location, err))?;
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let path = entry.path();
            // fs::metadata follows links, so a dangling link surfaces as NotFound.
            match fs::metadata(&path) {
                Ok(meta) if meta.is_dir() => names.push(name),
                Ok(_) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    debug!(
                        "event=dangling_link_skipped module=store status=ok location={}",
                        path.display()
                    );
                }
                Err(err) => return Err(StoreError::io(&path, err)),
            }
        }

        names.sort();
        Ok(names
            .into_iter()
            .map(|name| self.location.join(name))
            .collect())
    }

    /// Number of live children. Dangling links are not counted.
    pub fn child_count(&self) -> StoreResult<u64> {
        Ok(self.children()?.len() as u64)
    }

    /// Returns the child at `index` in entry-name order.
    pub fn child_at(&self, index: u64) -> StoreResult<Option<PathBuf>> {
        let children = self.children()?;
        Ok(usize::try_from(index)
            .ok()
            .and_then(|index| children.into_iter().nth(index)))
    }

    /// Names of all entries, including dangling links.
    pub fn entry_names(&self) -> StoreResult<Vec<String>> {
        let read_dir = match fs::read_dir(&self.location) {
            Ok(read_dir) => read_dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StoreError::io(&self.location, err)),
        };
        let mut names = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|err| StoreError::io(&self.location, err))?;
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// True when `name` is a live child (directory or link to one).
    pub fn has_child(&self, name: &str) -> bool {
        is_plain_name(name)
            && fs::metadata(self.location.join(name))
                .map(|meta| meta.is_dir())
                .unwrap_or(false)
    }

    /// True when an entry called `name` exists, even as a dangling link.
    pub fn has_entry(&self, name: &str) -> bool {
        is_plain_name(name) && fs::symlink_metadata(self.location.join(name)).is_ok()
    }

    /// Finds the first live child whose attribute `attribute` equals `value`.
    pub fn find_by_attribute(&self, attribute: &str, value: &str) -> StoreResult<Option<PathBuf>> {
        for child in self.children()? {
            let stored: Option<String> = AttributedDirectory::new(&child).get(attribute)?;
            if stored.as_deref() == Some(value) {
                return Ok(Some(child));
            }
        }
        Ok(None)
    }

    /// Exact entry-name match first, then a linear attribute scan.
    pub fn find_by_name_or_attribute(
        &self,
        attribute: &str,
        value: &str,
    ) -> StoreResult<Option<PathBuf>> {
        if self.has_child(value) {
            return Ok(Some(self.location.join(value)));
        }
        self.find_by_attribute(attribute, value)
    }

    /// Creates a directory link `link_name -> target`.
    ///
    /// The link stores a path relative to this location, so it survives when
    /// the container is moved or copied as a whole. Returns `false` when a live link with that name already exists. A
    /// dangling entry with the same name is replaced.
    pub fn create_link(&self, target: &Path, link_name: &str) -> StoreResult<bool> {
        if !is_plain_name(link_name) {
            return Err(StoreError::InvalidData(format!(
                "invalid link name `{link_name}`"
            )));
        }
        let link = self.location.join(link_name);
        if fs::symlink_metadata(&link).is_ok() {
            if fs::metadata(&link).is_ok() {
                return Ok(false);
            }
            remove_entry(&link)?;
        }

        self.ensure()?;
        let target = fs::canonicalize(target).map_err(|err| StoreError::io(target, err))?;
        let base =
            fs::canonicalize(&self.location).map_err(|err| StoreError::io(&self.location, err))?;
        let relative = relative_path(&base, &target);
        match make_dir_link(&relative, &link) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
            Err(err) => return Err(StoreError::io(&link, err)),
        }
        info!(
            "event=link_created module=store status=ok link={} target={}",
            link.display(),
            relative.display()
        );
        Ok(true)
    }

    /// Removes the first entry matching `value` by name, then by attribute.
    ///
    /// Owned sub-directories are deleted recursively; links are only unlinked.
    pub fn remove_by_name_or_attribute(&self, attribute: &str, value: &str) -> StoreResult<bool> {
        let target = if self.has_entry(value) {
            Some(self.location.join(value))
        } else {
            self.find_by_attribute(attribute, value)?
        };
        match target {
            Some(path) => {
                remove_entry(&path)?;
                info!(
                    "event=entry_removed module=store status=ok location={}",
                    path.display()
                );
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Removes the entry called exactly `name`, live or dangling.
    pub fn remove_child(&self, name: &str) -> StoreResult<bool> {
        if !self.has_entry(name) {
            return Ok(false);
        }
        let path = self.location.join(name);
        remove_entry(&path)?;
        info!(
            "event=entry_removed module=store status=ok location={}",
            path.display()
        );
        Ok(true)
    }

    /// Removes every entry, dangling links included. Returns how many went.
    pub fn clear(&self) -> StoreResult<u64> {
        let names = self.entry_names()?;
        for name in &names {
            remove_entry(&self.location.join(name))?;
        }
        Ok(names.len() as u64)
    }

    /// Deletes this location and everything it owns.
    pub fn remove_all(&self) -> StoreResult<()> {
        match fs::remove_dir_all(&self.location) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::io(&self.location, err)),
        }
    }
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
}

/// Path leading from directory `base` to `target`; both must be canonical.
///
/// Falls back to `target` itself when the two share no root, e.g. on
/// different Windows drives.
fn relative_path(base: &Path, target: &Path) -> PathBuf {
    let base_parts: Vec<Component<'_>> = base.components().collect();
    let target_parts: Vec<Component<'_>> = target.components().collect();
    let shared = base_parts
        .iter()
        .zip(&target_parts)
        .take_while(|(left, right)| left == right)
        .count();
    if shared == 0 {
        return target.to_path_buf();
    }

    let mut relative = PathBuf::new();
    for _ in shared..base_parts.len() {
        relative.push(Component::ParentDir);
    }
    for part in &target_parts[shared..] {
        relative.push(part);
    }
    if relative.as_os_str().is_empty() {
        relative.push(Component::CurDir);
    }
    relative
}

fn remove_entry(path: &Path) -> StoreResult<()> {
    let meta = fs::symlink_metadata(path).map_err(|err| StoreError::io(path, err))?;
    let result = if meta.file_type().is_symlink() {
        remove_dir_link(path)
    } else if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|err| StoreError::io(path, err))
}

#[cfg(unix)]
fn make_dir_link(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn make_dir_link(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}

#[cfg(unix)]
fn remove_dir_link(link: &Path) -> io::Result<()> {
    fs::remove_file(link)
}

#[cfg(windows)]
fn remove_dir_link(link: &Path) -> io::Result<()> {
    fs::remove_dir(link)
}

#[cfg(test)]
mod tests {
    use super::{is_plain_name, relative_path, Directory};
    use std::path::{Path, PathBuf};

    #[test]
    fn plain_names_reject_traversal_and_hidden_entries() {
        assert!(is_plain_name("0f1c2d"));
        assert!(!is_plain_name(""));
        assert!(!is_plain_name(".."));
        assert!(!is_plain_name(".attributes.json"));
        assert!(!is_plain_name("a/b"));
    }

    #[test]
    fn relative_paths_climb_to_the_shared_ancestor() {
        assert_eq!(
            relative_path(
                Path::new("/c/blocks/b/tags/t/references"),
                Path::new("/c/blocks/b/data_arrays/x")
            ),
            PathBuf::from("../../../data_arrays/x")
        );
        assert_eq!(
            relative_path(Path::new("/c/a"), Path::new("/c/a/b")),
            PathBuf::from("b")
        );
        assert_eq!(relative_path(Path::new("/c"), Path::new("/c")), PathBuf::from("."));
    }

    #[cfg(unix)]
    #[test]
    fn links_are_stored_relative_to_their_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = Directory::create(dir.path().join("data/x")).unwrap();
        let links = Directory::create(dir.path().join("tags/t/refs")).unwrap();
        assert!(links.create_link(target.location(), "x").unwrap());

        let stored = std::fs::read_link(links.location().join("x")).unwrap();
        assert_eq!(stored, PathBuf::from("../../../data/x"));
    }

    #[test]
    fn missing_location_has_no_children() {
        let dir = tempfile::tempdir().unwrap();
        let store = Directory::new(dir.path().join("absent"));
        assert_eq!(store.child_count().unwrap(), 0);
        assert!(store.child_at(0).unwrap().is_none());
        assert!(!store.exists());
    }

    #[test]
    fn children_are_sorted_and_skip_hidden_and_plain_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = Directory::create(dir.path().join("items")).unwrap();
        for name in ["b", "a", "c"] {
            store.sub_dir(name).ensure().unwrap();
        }
        std::fs::write(store.location().join(".hidden"), b"x").unwrap();
        std::fs::write(store.location().join("file.txt"), b"x").unwrap();

        let names: Vec<String> = store
            .children()
            .unwrap()
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
