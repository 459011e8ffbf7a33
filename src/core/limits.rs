/*!
 * Limits and Constants
 *
 * Centralized location for the core's limits, intervals, and names.
 */

use std::time::Duration;

// =============================================================================
// SHARED ACCOUNTING REGION
// =============================================================================

/// Well-known name of the per-host shared accounting region
pub const SHARED_REGION_NAME: &str = "/memgate_memory_shared";

/// Maximum concurrent reservations in the shared region
///
/// Any value at or above the expected peak build concurrency suffices;
/// when exhausted, spawns are admitted without a reservation.
pub const MAX_RESERVATIONS: usize = 64;

// =============================================================================
// PROFILE STORE
// =============================================================================

/// Profile cache file, relative to the top-level build's working directory
pub const PROFILE_CACHE_FILE: &str = ".make_memory_cache";

/// Initial profile table capacity; the table doubles on overflow and
/// entries are never moved or removed, so indices stay stable
pub const PROFILE_INITIAL_CAPACITY: usize = 1000;

/// Divisor for the final-exit peak decay: when a compilation's final
/// peak comes in below the stored peak, the stored value is pulled down
/// by `(stored - observed) / divisor`
pub const DEFAULT_DECAY_DIVISOR: u64 = 3;

/// Minimum interval between dirty-profile flushes
pub const PROFILE_FLUSH_INTERVAL: Duration = Duration::from_secs(10);

// =============================================================================
// MONITOR AND DISPLAY
// =============================================================================

/// Monitor loop tick
pub const MONITOR_TICK: Duration = Duration::from_millis(100);

/// Status line refresh cadence
pub const RENDER_INTERVAL: Duration = Duration::from_millis(300);

/// Status bar width in columns
pub const STATUS_BAR_WIDTH: u64 = 20;

/// Visible length of the rendered status line, used to right-align it
pub const STATUS_VISIBLE_LEN: u16 = 50;
