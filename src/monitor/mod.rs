/*!
 * Monitor Module
 * The background sampling loop of the top-level build
 *
 * One dedicated thread ticks every 100 ms: sample host memory, walk the
 * descendant tree, publish totals to the shared region, flush dirty
 * profiles, and drive the status renderer on a 300 ms cadence. The run
 * flag is a plain atomic; clearing it stops the loop at the next tick
 * boundary.
 */

use crate::classify::Classifier;
use crate::core::limits::{MONITOR_TICK, RENDER_INTERVAL};
use crate::core::{MemorySnapshot, Pid};
use crate::probe::SystemProbe;
use crate::profile::ProfileStore;
use crate::region::SharedRegion;
use crate::render::{restore_terminal, StatusRenderer};
use crate::walker::DescendantWalker;
use log::{debug, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Everything the monitor thread needs, captured at spawn
pub struct MonitorDeps {
    pub root: Pid,
    pub probe: Arc<dyn SystemProbe>,
    pub store: Arc<ProfileStore>,
    pub region: Option<Arc<SharedRegion>>,
    pub classifier: Classifier,
    pub display_enabled: bool,
}

struct MonitorState {
    running: AtomicBool,
    status_shown: AtomicBool,
}

/// Handle on the monitor thread
pub struct Monitor {
    state: Arc<MonitorState>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Monitor {
    /// Spawn the monitor thread
    pub fn start(deps: MonitorDeps) -> Self {
        let state = Arc::new(MonitorState {
            running: AtomicBool::new(true),
            status_shown: AtomicBool::new(false),
        });
        let thread_state = Arc::clone(&state);
        let handle = thread::Builder::new()
            .name("memgate-monitor".to_string())
            .spawn(move || run_loop(deps, thread_state))
            .map_err(|e| warn!("failed to spawn monitor thread: {e}"))
            .ok();

        Self {
            state,
            handle: Mutex::new(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::Acquire)
    }

    /// Stop the loop; `immediate` skips the join (the signal path) and
    /// restores the terminal from the calling thread instead
    pub fn stop(&self, immediate: bool) {
        let was_running = self.state.running.swap(false, Ordering::AcqRel);
        if immediate {
            if was_running && self.state.status_shown.load(Ordering::Acquire) {
                restore_terminal();
            }
            return;
        }
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}

fn run_loop(deps: MonitorDeps, state: Arc<MonitorState>) {
    let mut walker = DescendantWalker::new(deps.root, deps.classifier);
    let mut renderer = StatusRenderer::new(deps.display_enabled);
    let mut last_render = Instant::now();

    debug!(
        "monitor started for pid {} (display: {})",
        deps.root,
        renderer.is_active()
    );

    while state.running.load(Ordering::Acquire) {
        thread::sleep(MONITOR_TICK);

        let host = deps.probe.host_memory();
        let totals = walker.tick(&*deps.probe, &deps.store, deps.region.as_deref());

        if let Some(region) = &deps.region {
            region.publish_unused_peaks(totals.unused_peaks_mib);

            let table_sum = region.recompute_reserved();
            let scalar = region.reserved_mib();
            if table_sum != scalar {
                warn!(
                    "reservation total {scalar}MiB disagrees with table sum {table_sum}MiB"
                );
            }

            region.sweep_dead(&*deps.probe);
        }

        deps.store.flush_if_dirty();

        // Without a host sample there is nothing to display or gate,
        // but profiles keep being learned.
        let Some(host) = host else {
            continue;
        };

        if last_render.elapsed() >= RENDER_INTERVAL {
            last_render = Instant::now();
            let imminent_mib = deps
                .region
                .as_ref()
                .map(|r| r.imminent_mib())
                .unwrap_or(totals.unused_peaks_mib);
            let snapshot = MemorySnapshot {
                free_mib: host.free_mib,
                total_mib: host.total_mib,
                used_percent: host.used_percent,
                tracked_mib: totals.tracked_mib,
                imminent_mib,
                jobs: totals.jobs,
            };
            if renderer.render(&snapshot) {
                state.status_shown.store(true, Ordering::Release);
            }
        }
    }

    // Loop exit is the last write this thread makes to its descriptor
    renderer.finish();
    debug!("monitor stopped");
}
