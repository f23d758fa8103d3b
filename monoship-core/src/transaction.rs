//! Exclusive workspace writes with rollback.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};

pub const LOCK_FILE: &str = ".monoship.lock";

/// Exclusive claim on the workspace's manifests and root lockfile.
///
/// Released when dropped.
#[derive(Debug)]
pub struct WorkspaceWriteLock {
    path: PathBuf,
}

impl WorkspaceWriteLock {
    pub fn acquire(root: &Path) -> Result<Self> {
        let path = root.join(LOCK_FILE);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Err(Error::Locked(path)),
            Err(e) => return Err(e.into()),
        };
        writeln!(file, "{}", std::process::id())?;
        debug!(path = %path.display(), "acquired workspace lock");
        Ok(Self { path })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkspaceWriteLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove workspace lock");
        }
    }
}

/// File writes that are all kept, or all undone.
///
/// Every file is snapshotted before its first write. Dropping the
/// transaction without [`commit`](Self::commit) restores the snapshots,
/// deleting files that did not exist before.
#[derive(Debug)]
pub struct ManifestTransaction {
    lock: Option<WorkspaceWriteLock>,
    snapshots: BTreeMap<PathBuf, Option<Vec<u8>>>,
    committed: bool,
}

impl ManifestTransaction {
    pub fn begin(lock: WorkspaceWriteLock) -> Self {
        Self {
            lock: Some(lock),
            snapshots: BTreeMap::new(),
            committed: false,
        }
    }

    /// Records the current contents of `path` if not recorded yet.
    pub fn snapshot(&mut self, path: &Path) -> Result<()> {
        if self.snapshots.contains_key(path) {
            return Ok(());
        }
        let contents = match fs::read(path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        self.snapshots.insert(path.to_path_buf(), contents);
        Ok(())
    }

    pub fn write(&mut self, path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
        self.snapshot(path)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Files touched so far, sorted.
    pub fn touched(&self) -> Vec<PathBuf> {
        self.snapshots.keys().cloned().collect()
    }

    /// Keeps every write and releases the lock, returning the touched files.
    pub fn commit(mut self) -> Vec<PathBuf> {
        self.committed = true;
        self.lock.take();
        self.touched()
    }

    /// Restores every snapshot.
    pub fn rollback(&mut self) -> Result<()> {
        let mut first_error = None;
        for (path, contents) in &self.snapshots {
            let restored = match contents {
                Some(bytes) => fs::write(path, bytes),
                None => match fs::remove_file(path) {
                    Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                    other => other,
                },
            };
            if let Err(e) = restored {
                warn!(path = %path.display(), error = %e, "failed to restore file");
                first_error.get_or_insert(e);
            }
        }
        self.snapshots.clear();
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

impl Drop for ManifestTransaction {
    fn drop(&mut self) {
        if !self.committed && !self.snapshots.is_empty() {
            debug!(files = self.snapshots.len(), "rolling back workspace writes");
            let _ = self.rollback();
        }
    }
}
