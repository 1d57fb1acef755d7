//! Cross-process guard against concurrent restores

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Exclusive advisory lock held for the duration of a restore attempt
///
/// Released when dropped.
#[derive(Debug)]
pub struct RestoreLock {
    file: File,
    path: PathBuf,
}

impl RestoreLock {
    /// Try to take the lock without blocking
    ///
    /// Returns `Ok(None)` if another process already holds it.
    pub fn try_acquire(path: &Path) -> Result<Option<Self>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        match fs2::FileExt::try_lock_exclusive(&file) {
            Ok(()) => Ok(Some(Self {
                file,
                path: path.to_path_buf(),
            })),
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => Ok(None),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to lock {}", path.display()))
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RestoreLock {
    fn drop(&mut self) {
        fs2::FileExt::unlock(&self.file).ok();
    }
}
