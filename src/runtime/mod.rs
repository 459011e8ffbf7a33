/*!
 * Runtime Module
 * Lifecycle wiring and the public core context
 *
 * `MemoryCore` is the single process-wide value the surrounding build
 * tool threads through its spawn path. The top-level build constructs
 * the full graph (profiles, shared region, monitor); sub-builds
 * construct only the slice that touches the shared region, attached
 * lazily on first use. Initialization never fails outward: anything
 * that cannot come up degrades to a core that admits every spawn.
 */

use crate::classify::Classifier;
use crate::core::Config;
use crate::core::Pid;
use crate::gate::{Admission, AdmissionGate};
use crate::monitor::{Monitor, MonitorDeps};
use crate::probe::{ProcProbe, SystemProbe};
use crate::profile::{ProfileStats, ProfileStore};
use crate::region::{RegionStats, SharedRegion};
use log::{debug, error, trace, warn};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Process-wide memory-awareness context
pub struct MemoryCore {
    config: Config,
    classifier: Classifier,
    probe: Arc<dyn SystemProbe>,
    /// Loaded only in the top-level build
    store: Option<Arc<ProfileStore>>,
    /// Created at the top level, attached lazily in sub-builds
    region: RwLock<Option<Arc<SharedRegion>>>,
    region_failed: AtomicBool,
    monitor: Option<Monitor>,
    shut_down: AtomicBool,
}

impl MemoryCore {
    /// Initialize against the real host
    pub fn init(config: Config) -> Self {
        Self::init_with_probe(config, Arc::new(ProcProbe::new()))
    }

    /// Initialize with an explicit probe (tests, other hosts)
    pub fn init_with_probe(config: Config, probe: Arc<dyn SystemProbe>) -> Self {
        log::set_max_level(config.level_filter());
        let classifier = Classifier::new(config.source_suffixes.clone());

        if !config.enabled {
            debug!("memory awareness disabled by configuration");
            return Self {
                config,
                classifier,
                probe,
                store: None,
                region: RwLock::new(None),
                region_failed: AtomicBool::new(true),
                monitor: None,
                shut_down: AtomicBool::new(false),
            };
        }

        if !config.is_top_level() {
            // Sub-build: the region attaches on first reserve or
            // imminent read; profiles stay with the top level.
            return Self {
                config,
                classifier,
                probe,
                store: None,
                region: RwLock::new(None),
                region_failed: AtomicBool::new(false),
                monitor: None,
                shut_down: AtomicBool::new(false),
            };
        }

        let store = Arc::new(ProfileStore::new(
            config.cache_path.clone(),
            config.decay_divisor,
        ));
        if let Err(e) = store.load() {
            warn!("starting with an empty profile store: {e}");
        }

        let region = match SharedRegion::create() {
            Ok(region) => Some(Arc::new(region)),
            Err(e) => {
                warn!("running without shared accounting: {e}");
                None
            }
        };

        let monitor = Monitor::start(MonitorDeps {
            root: std::process::id(),
            probe: Arc::clone(&probe),
            store: Arc::clone(&store),
            region: region.clone(),
            classifier: classifier.clone(),
            display_enabled: config.display_enabled,
        });

        Self {
            config,
            classifier,
            probe,
            store: Some(store),
            region: RwLock::new(region),
            region_failed: AtomicBool::new(false),
            monitor: Some(monitor),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Ask whether a spawn described by its argument vector fits now
    pub fn may_spawn_argv<S: AsRef<str>>(&self, argv: &[S]) -> Admission {
        self.may_spawn_hint(self.classifier.classify_argv(argv).as_deref())
    }

    /// Ask whether a spawn for an already-classified source path fits
    pub fn may_spawn_path(&self, source_path: &str) -> Admission {
        self.may_spawn_hint(Some(source_path))
    }

    /// Ask with an optional pre-classified hint
    pub fn may_spawn_hint(&self, hint: Option<&str>) -> Admission {
        if !self.config.enabled {
            return Admission::Go;
        }
        self.gate().may_spawn(hint)
    }

    /// Record that an admitted spawn produced a child
    ///
    /// Discovery and attribution happen on the monitor's next walk; the
    /// call exists so the runner's hooks are symmetric.
    pub fn child_spawned(&self, pid: Pid) {
        trace!("child {pid} started");
    }

    /// Record that a child exited, releasing this process's pre-spawn
    /// reservation
    pub fn child_exited(&self, pid: Pid) {
        if !self.config.enabled {
            return;
        }
        trace!("child {pid} ended");
        if let Some(region) = self.region_handle() {
            region.release(std::process::id());
        }
    }

    pub fn profile_stats(&self) -> Option<ProfileStats> {
        self.store.as_ref().map(|s| s.stats())
    }

    pub fn region_stats(&self) -> Option<RegionStats> {
        self.region_handle().map(|r| r.stats())
    }

    /// Immediate-stop entry point for the surrounding tool's fatal
    /// paths: clears the run flag and restores the terminal without
    /// joining the monitor thread
    pub fn stop_now(&self) {
        if let Some(monitor) = &self.monitor {
            monitor.stop(true);
        }
    }

    /// Full teardown: stop the monitor, flush profiles, drop the region
    ///
    /// Safe to call more than once; only the first call acts.
    pub fn shutdown(&self, immediate: bool) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        if !self.config.enabled {
            return;
        }

        if let Some(monitor) = &self.monitor {
            monitor.stop(immediate);
        }
        self.flush_profiles();
        self.teardown_region();
    }

    fn gate(&self) -> AdmissionGate {
        AdmissionGate::new(
            std::process::id(),
            Arc::clone(&self.probe),
            self.store.clone(),
            self.region_handle(),
        )
    }

    /// The region handle, attaching on first use in sub-builds
    fn region_handle(&self) -> Option<Arc<SharedRegion>> {
        if let Some(region) = self.region.read().clone() {
            return Some(region);
        }
        if self.config.is_top_level() || self.region_failed.load(Ordering::Acquire) {
            return None;
        }

        let mut slot = self.region.write();
        if slot.is_none() {
            match SharedRegion::attach() {
                Ok(region) => *slot = Some(Arc::new(region)),
                Err(e) => {
                    warn!("running without shared accounting: {e}");
                    self.region_failed.store(true, Ordering::Release);
                }
            }
        }
        slot.clone()
    }

    fn flush_profiles(&self) {
        let Some(store) = &self.store else {
            return;
        };
        if !self.config.is_top_level() {
            error!(
                "sub-build (level {}) attempted to flush profiles, ignoring",
                self.config.level
            );
            return;
        }
        if store.is_dirty() {
            if let Err(e) = store.flush() {
                warn!("{e}");
            }
        }
    }

    fn teardown_region(&self) {
        let region = self.region.write().take();
        if region.is_some() && !self.config.is_top_level() {
            // Dropping a sub-build handle unmaps this process's view
            // only; the object itself belongs to the top level.
            debug!("detaching from shared region (level {})", self.config.level);
        }
        drop(region);
    }
}

impl Drop for MemoryCore {
    fn drop(&mut self) {
        self.shutdown(false);
    }
}
