/*!
 * Profile Types
 */

use crate::core::{EpochSecs, MiB};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// One learned profile: the peak resident memory a source file's
/// compilation has been observed to need
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileEntry {
    pub path: String,
    pub peak_mib: MiB,
    pub last_used: EpochSecs,
}

/// Profile store error types
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("failed to read profile cache {path}: {source}")]
    Load { path: PathBuf, source: io::Error },

    #[error("failed to persist profile cache {path}: {source}")]
    Persist { path: PathBuf, source: io::Error },
}

/// Profile store statistics
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProfileStats {
    pub entries: usize,
    pub dirty: bool,
}
