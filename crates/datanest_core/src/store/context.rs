//! Per-container shared state: root location, open mode and the
//! container-scoped reader/writer lock.
//!
//! Every entity handle holds an `Arc<FileContext>`. Public read paths take the
//! read side, mutating paths the write side, so multi-step mutations such as
//! replace-all are never observed half-applied from inside this process.
//! Handles opened separately on the same root share one lock.
//! Nothing here guards against other processes.

use super::{StoreError, StoreResult};
use log::debug;
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

type ContainerLock = RwLock<()>;

/// Live container locks keyed by canonical root. Entries die with the last
/// context of their container.
static CONTAINER_LOCKS: Lazy<Mutex<HashMap<PathBuf, Weak<ContainerLock>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// How a container is opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileMode {
    /// Existing container, no mutation allowed.
    ReadOnly,
    /// Open existing or create new.
    #[default]
    ReadWrite,
    /// Discard any existing content, then create.
    Overwrite,
}

#[derive(Debug)]
pub struct FileContext {
    root: PathBuf,
    mode: FileMode,
    lock: Arc<ContainerLock>,
}

impl FileContext {
    pub(crate) fn new(root: impl Into<PathBuf>, mode: FileMode) -> Arc<Self> {
        let root = root.into();
        let lock = container_lock(&root);
        Arc::new(Self { root, mode, lock })
    }

    /// True when both contexts serialize on the same lock.
    pub fn shares_lock_with(&self, other: &FileContext) -> bool {
        Arc::ptr_eq(&self.lock, &other.lock)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn mode(&self) -> FileMode {
        self.mode
    }

    pub fn is_writable(&self) -> bool {
        self.mode != FileMode::ReadOnly
    }

    /// Shared guard for read-only traversal.
    ///
    /// Recursive acquisition keeps nested reads on one thread from blocking
    /// behind a queued writer.
    pub fn read(&self) -> RwLockReadGuard<'_, ()> {
        self.lock.read_recursive()
    }

    /// Exclusive guard for mutations; fails on read-only containers.
    pub fn write(&self) -> StoreResult<RwLockWriteGuard<'_, ()>> {
        if !self.is_writable() {
            return Err(StoreError::ReadOnly(self.root.clone()));
        }
        Ok(self.lock.write())
    }
}

fn container_lock(root: &Path) -> Arc<ContainerLock> {
    let key = lock_key(root);
    let mut registry = CONTAINER_LOCKS.lock();
    registry.retain(|_, lock| lock.strong_count() > 0);
    if let Some(lock) = registry.get(&key).and_then(Weak::upgrade) {
        return lock;
    }
    debug!(
        "event=container_lock_created module=store status=ok root={}",
        key.display()
    );
    let lock = Arc::new(ContainerLock::new(()));
    registry.insert(key, Arc::downgrade(&lock));
    lock
}

/// Canonical root when it exists, otherwise the absolute form of `root`.
fn lock_key(root: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(root) {
        return canonical;
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(root))
        .unwrap_or_else(|_| root.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::{lock_key, FileContext, FileMode, CONTAINER_LOCKS};

    #[test]
    fn contexts_on_one_root_share_a_lock() {
        let dir = tempfile::tempdir().unwrap();
        let first = FileContext::new(dir.path(), FileMode::ReadWrite);
        let second = FileContext::new(dir.path().join("."), FileMode::ReadOnly);
        let other = FileContext::new(dir.path().join("elsewhere"), FileMode::ReadWrite);

        assert!(first.shares_lock_with(&second));
        assert!(!first.shares_lock_with(&other));
    }

    #[test]
    fn lock_entry_dies_with_its_last_context() {
        let dir = tempfile::tempdir().unwrap();
        let first = FileContext::new(dir.path(), FileMode::ReadWrite);
        let second = FileContext::new(dir.path(), FileMode::ReadWrite);
        drop(first);
        assert!(live_lock(dir.path()));
        drop(second);
        assert!(!live_lock(dir.path()));
    }

    fn live_lock(root: &std::path::Path) -> bool {
        CONTAINER_LOCKS
            .lock()
            .get(&lock_key(root))
            .is_some_and(|lock| lock.strong_count() > 0)
    }
}
