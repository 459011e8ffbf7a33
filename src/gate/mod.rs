/*!
 * Gate Module
 * The pre-spawn go/wait admission decision
 *
 * Called immediately before the recipe runner would fork. The gate
 * never blocks; on `Wait` the caller retries, typically every 100 ms.
 * It is the single source of truth for "will this fit?" and is
 * orthogonal to jobserver token concurrency.
 */

use crate::core::{MiB, Pid};
use crate::probe::SystemProbe;
use crate::profile::ProfileStore;
use crate::region::SharedRegion;
use log::{debug, error, trace};
use std::sync::Arc;

/// Admission decision result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Spawn now; a reservation has been written when a prediction
    /// existed
    Go,
    /// Predicted peak does not fit; retry later
    Wait,
}

/// Pre-spawn admission gate
pub struct AdmissionGate {
    caller: Pid,
    probe: Arc<dyn SystemProbe>,
    /// Absent in sub-builds, which admit without predictions
    store: Option<Arc<ProfileStore>>,
    /// Absent when the shared region could not be mapped
    region: Option<Arc<SharedRegion>>,
}

impl AdmissionGate {
    pub fn new(
        caller: Pid,
        probe: Arc<dyn SystemProbe>,
        store: Option<Arc<ProfileStore>>,
        region: Option<Arc<SharedRegion>>,
    ) -> Self {
        Self {
            caller,
            probe,
            store,
            region,
        }
    }

    /// Decide whether a spawn for `source_path` fits right now
    ///
    /// On `Go` with a known prediction, a reservation of that peak is
    /// written under the caller's pid before returning.
    pub fn may_spawn(&self, source_path: Option<&str>) -> Admission {
        let required = self.required_mib(source_path);
        // Unknown history means there is nothing to reason about
        if required == 0 {
            return Admission::Go;
        }

        // Unknown host memory disables gating entirely
        let Some(host) = self.probe.host_memory() else {
            trace!("host memory unknown, admitting without gating");
            return Admission::Go;
        };

        let imminent = self
            .region
            .as_ref()
            .map(|r| r.imminent_mib())
            .unwrap_or(0);
        let effective_free = host.free_mib.saturating_sub(imminent);

        if required > effective_free {
            trace!(
                "deferring spawn for {source_path:?}: need {required}MiB, \
                 {effective_free}MiB effective free ({}MiB free - {imminent}MiB imminent)",
                host.free_mib
            );
            return Admission::Wait;
        }

        if let Some(region) = &self.region {
            if let Err(e) = region.reserve(self.caller, required) {
                // Proceed unreserved; the monitor still sees the child
                error!("admitting {source_path:?} without a reservation: {e}");
            }
        }
        debug!(
            "admitted spawn for {source_path:?}: {required}MiB of {effective_free}MiB effective free"
        );
        Admission::Go
    }

    fn required_mib(&self, source_path: Option<&str>) -> MiB {
        let (Some(path), Some(store)) = (source_path, self.store.as_ref()) else {
            return 0;
        };
        store.lookup(path).map(|(_, peak, _)| peak).unwrap_or(0)
    }
}
