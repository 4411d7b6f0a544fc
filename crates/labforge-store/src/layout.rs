use std::path::{Path, PathBuf};

/// Per-lab state record file name.
pub const RECORD_FILE: &str = "state.yml";
/// Per-lab generated compose manifest file name.
pub const MANIFEST_FILE: &str = "docker-compose.yml";
/// Advisory lock file at the labs root.
pub const LOCK_FILE: &str = ".lock";

/// Directory layout of the labs root.
///
/// Every lab owns `<root>/<lab_id>/`, holding its state record and its
/// generated manifest. Directories are created lazily by the store.
#[derive(Debug, Clone)]
pub struct LabsLayout {
    root: PathBuf,
}

impl LabsLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn lab_dir(&self, lab_id: &str) -> PathBuf {
        self.root.join(lab_id)
    }

    #[inline]
    pub fn record_path(&self, lab_id: &str) -> PathBuf {
        self.lab_dir(lab_id).join(RECORD_FILE)
    }

    #[inline]
    pub fn manifest_path(&self, lab_id: &str) -> PathBuf {
        self.lab_dir(lab_id).join(MANIFEST_FILE)
    }

    #[inline]
    pub fn lock_file(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }
}

/// A lab id may only name a direct child of the labs root.
pub(crate) fn is_valid_lab_component(lab_id: &str) -> bool {
    !lab_id.is_empty()
        && !lab_id.starts_with('.')
        && !lab_id.contains(['/', '\\'])
        && lab_id != ".."
}
