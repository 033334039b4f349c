use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use fs2::FileExt;

/// Exclusive advisory lock held by the process that owns a live session.
///
/// Released when dropped. The lock file itself is left in place so a second
/// process never ends up locking a different inode.
#[derive(Debug)]
pub struct SessionLock {
    file: File,
    path: PathBuf,
}

impl SessionLock {
    /// Returns `None` when another handle already holds the lock.
    pub fn try_acquire(path: &Path) -> Result<Option<Self>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create lock directory {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("failed to open session lock {}", path.display()))?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                file,
                path: path.to_path_buf(),
            })),
            Err(err) if err.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(err) => Err(err)
                .with_context(|| format!("failed to lock session file {}", path.display())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_holder_is_refused_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mindful.lock");

        let first = SessionLock::try_acquire(&path).unwrap().expect("first lock");
        assert_eq!(first.path(), path.as_path());
        assert!(SessionLock::try_acquire(&path).unwrap().is_none());

        drop(first);
        assert!(SessionLock::try_acquire(&path).unwrap().is_some());
    }
}
