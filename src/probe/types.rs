/*!
 * Probe Types
 */

use crate::core::MiB;
use serde::{Deserialize, Serialize};

/// One host memory sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HostMemory {
    /// Available memory
    pub free_mib: MiB,
    /// Total memory
    pub total_mib: MiB,
    /// Used memory as a percentage of total
    pub used_percent: u8,
}

impl HostMemory {
    /// Derive a sample from total and available quantities
    ///
    /// Returns `None` when either quantity is zero, which callers treat
    /// as "memory unknown".
    pub fn from_total_available(total_mib: MiB, available_mib: MiB) -> Option<Self> {
        if total_mib == 0 || available_mib == 0 {
            return None;
        }
        let used_percent = (100 - available_mib * 100 / total_mib) as u8;
        Some(Self {
            free_mib: available_mib,
            total_mib,
            used_percent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn derives_used_percent() {
        let sample = HostMemory::from_total_available(8192, 2048).unwrap();
        assert_eq!(sample.free_mib, 2048);
        assert_eq!(sample.used_percent, 75);
    }

    #[test]
    fn zero_quantities_are_unknown() {
        assert_eq!(HostMemory::from_total_available(0, 100), None);
        assert_eq!(HostMemory::from_total_available(100, 0), None);
    }
}
