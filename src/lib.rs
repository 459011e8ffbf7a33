/*!
 * memgate
 * Memory-aware job admission and accounting core for parallel build tools
 *
 * Before the surrounding build tool spawns a child, the admission gate
 * compares the child's learned peak-memory profile against free memory
 * minus already-reserved peaks and answers go/wait. While children run,
 * a monitor thread samples their resident sets, learns per-source-file
 * peak profiles, and shares reservation totals with sibling build
 * processes through a per-host shared accounting region.
 *
 * # Organization
 *
 * - **core**: shared types, limits, env-derived configuration
 * - **probe**: host memory and process probes (Linux /proc, mock)
 * - **classify**: source-file extraction from command lines
 * - **profile**: persistent per-source-file peak-memory store
 * - **region**: per-host shared accounting region (POSIX shm)
 * - **walker**: descendant discovery, attribution, and peak tracking
 * - **gate**: the pre-spawn go/wait decision
 * - **monitor**: the background sampling loop
 * - **render**: single-line terminal status display
 * - **runtime**: lifecycle wiring and the public core context
 */

pub mod classify;
pub mod core;
pub mod gate;
pub mod monitor;
pub mod probe;
pub mod profile;
pub mod region;
pub mod render;
pub mod runtime;
pub mod walker;

// Re-export the public surface for convenience
pub use crate::core::{Config, MemorySnapshot, MiB, Pid};
pub use classify::Classifier;
pub use gate::{Admission, AdmissionGate};
pub use probe::{HostMemory, MockProbe, ProcProbe, SystemProbe};
pub use profile::{ProfileError, ProfileStore};
pub use region::{RegionError, RegionStats, SharedRegion};
pub use runtime::MemoryCore;
pub use walker::{DescendantWalker, WalkTotals};
