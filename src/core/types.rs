/*!
 * Core Types
 * Common types used across the memory core
 */

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Process ID type
pub type Pid = u32;

/// Memory quantity in mebibytes
///
/// All accounting arithmetic is unsigned and saturates rather than
/// underflowing when a live value exceeds a recorded peak.
pub type MiB = u64;

/// Wall-clock seconds since the Unix epoch
pub type EpochSecs = i64;

/// Current wall-clock time as seconds since the epoch
pub fn epoch_secs() -> EpochSecs {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as EpochSecs)
        .unwrap_or(0)
}

/// Point-in-time view of host and build memory, as rendered on the
/// status line and exposed to the surrounding tool
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MemorySnapshot {
    /// Host free memory
    pub free_mib: MiB,
    /// Host total memory
    pub total_mib: MiB,
    /// Host used memory as a percentage of total
    pub used_percent: u8,
    /// Total RSS of all tracked build descendants
    pub tracked_mib: MiB,
    /// Reserved peaks plus unused peaks
    pub imminent_mib: MiB,
    /// Live tracked descendants
    pub jobs: u32,
}
