/*!
 * Region Types
 */

use crate::core::MiB;
use nix::errno::Errno;
use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Shared accounting region error types
#[derive(Debug, Error)]
pub enum RegionError {
    #[error("failed to open shared region {name}: {source}")]
    Open { name: String, source: Errno },

    #[error("failed to size shared region {name}: {source}")]
    Resize { name: String, source: io::Error },

    #[error("failed to map shared region {name}: {source}")]
    Map { name: String, source: Errno },

    #[error("no free reservation slot ({max} in use)")]
    SlotsExhausted { max: usize },
}

/// Shared accounting region statistics
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RegionStats {
    /// Running sum of the reservation table
    pub reserved_mib: MiB,
    /// Monitor-published sum of (historical peak - current RSS)
    pub unused_peaks_mib: MiB,
    /// Occupied slots
    pub slots_in_use: usize,
    /// High-water mark of occupied slot indices
    pub high_water: usize,
}
