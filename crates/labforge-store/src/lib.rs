//! Persistent lab state for labforge.
//!
//! This crate provides the storage layer: `LabsLayout` for the labs
//! directory structure, the `LabRecord` persisted per lab as `state.yml`, and
//! the `LabRepository` trait with its filesystem implementation `LabStore`
//! (atomic record writes, listing, used-subnet queries and partial-id
//! resolution). `LabsLock` serializes subnet allocation across processes.

pub mod layout;
pub mod lock;
pub mod record;
pub mod repository;

pub use layout::{LabsLayout, LOCK_FILE, MANIFEST_FILE, RECORD_FILE};
pub use lock::LabsLock;
pub use record::{LabRecord, LabStatus, ServiceSummary};
pub use repository::{LabRepository, LabStore};

use std::path::Path;
use thiserror::Error;

/// Fsync a directory so that a preceding `rename()` is durable.
///
/// POSIX does not guarantee a rename survives a crash until the parent
/// directory itself has been synced.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_yaml::Error),
    #[error("No lab found matching '{0}'")]
    LabNotFound(String),
    #[error("Ambiguous lab ID '{partial}'. Matches: {}", .matches.join(", "))]
    AmbiguousId {
        partial: String,
        matches: Vec<String>,
    },
    #[error("lab record for '{lab_id}' is unreadable: {reason}")]
    CorruptRecord { lab_id: String, reason: String },
    #[error("cannot lock labs root {root}: {source}")]
    Lock {
        root: String,
        #[source]
        source: std::io::Error,
    },
}
