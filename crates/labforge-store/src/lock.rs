use crate::layout::LabsLayout;
use crate::StoreError;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Exclusive advisory lock on a labs root.
///
/// Commands that allocate or free subnets (`build`, `destroy`) hold it so
/// that two labforge processes sharing a root never hand out the same
/// `/24`. The lock lives in `<root>/.lock` and is released on drop.
#[derive(Debug)]
pub struct LabsLock {
    file: File,
    root: PathBuf,
}

impl LabsLock {
    /// Block until the labs root is free.
    pub fn acquire(layout: &LabsLayout) -> Result<Self, StoreError> {
        let file = open_lock_file(layout)?;
        file.lock_exclusive()
            .map_err(|source| locked(layout.root(), source))?;
        debug!("locked labs root {}", layout.root().display());
        Ok(Self {
            file,
            root: layout.root().to_path_buf(),
        })
    }

    /// `None` when another process holds the lock.
    pub fn try_acquire(layout: &LabsLayout) -> Result<Option<Self>, StoreError> {
        let file = open_lock_file(layout)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                file,
                root: layout.root().to_path_buf(),
            })),
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => Ok(None),
            Err(source) => Err(locked(layout.root(), source)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Drop for LabsLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!("unlocking labs root {}: {e}", self.root.display());
        }
    }
}

fn open_lock_file(layout: &LabsLayout) -> Result<File, StoreError> {
    fs::create_dir_all(layout.root()).map_err(|source| locked(layout.root(), source))?;
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(layout.lock_file())
        .map_err(|source| locked(layout.root(), source))
}

fn locked(root: &Path, source: std::io::Error) -> StoreError {
    StoreError::Lock {
        root: root.display().to_string(),
        source,
    }
}
