/*!
 * Walker Types
 */

use crate::core::{MiB, Pid};
use serde::{Deserialize, Serialize};

/// One live process transitively rooted at the top-level build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descendant {
    pub pid: Pid,
    /// Parent within the tracked tree
    pub parent: Pid,
    /// Stable profile index, or `None` for unclassifiable processes
    pub profile_idx: Option<usize>,
    /// Most recent sampled RSS
    pub current_mib: MiB,
    /// Highest RSS observed during this run
    pub peak_mib: MiB,
    /// Stored profile peak at the moment this descendant was first seen
    pub old_peak_mib: MiB,
}

/// Aggregates produced by one walk tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WalkTotals {
    /// Live tracked descendants
    pub jobs: u32,
    /// Total RSS of all descendants
    pub tracked_mib: MiB,
    /// Sum of (historical peak - current RSS) where current is below
    /// the historical peak
    pub unused_peaks_mib: MiB,
}
