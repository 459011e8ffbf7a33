/*!
 * Descendant Walker
 * Per-tick discovery and accounting of the build's process tree
 *
 * Each tick walks the live tree from the top-level pid, attributes
 * newly seen processes to profiles via their command lines, rolls
 * current/peak RSS, and retires entries whose process has exited.
 * Walks always start from the root, never follow stored parent links,
 * so OS re-parenting cannot create cycles.
 */

use super::types::{Descendant, WalkTotals};
use crate::classify::Classifier;
use crate::core::Pid;
use crate::profile::ProfileStore;
use crate::probe::SystemProbe;
use crate::region::SharedRegion;
use ahash::RandomState;
use log::{debug, trace};
use std::collections::{HashMap, HashSet, VecDeque};

/// Stateful walker over the build's descendants
pub struct DescendantWalker {
    root: Pid,
    classifier: Classifier,
    table: HashMap<Pid, Descendant, RandomState>,
}

impl DescendantWalker {
    pub fn new(root: Pid, classifier: Classifier) -> Self {
        Self {
            root,
            classifier,
            table: HashMap::with_hasher(RandomState::new()),
        }
    }

    /// Live descendants currently tracked
    pub fn tracked(&self) -> usize {
        self.table.len()
    }

    pub fn descendant(&self, pid: Pid) -> Option<&Descendant> {
        self.table.get(&pid)
    }

    /// Run one walk over the live tree and retire exited entries
    pub fn tick(
        &mut self,
        probe: &dyn SystemProbe,
        store: &ProfileStore,
        region: Option<&SharedRegion>,
    ) -> WalkTotals {
        let mut totals = WalkTotals::default();
        let mut seen: HashSet<Pid, RandomState> = HashSet::with_hasher(RandomState::new());

        let mut queue: VecDeque<(Pid, Pid)> = probe
            .children_of(self.root)
            .into_iter()
            .map(|pid| (pid, self.root))
            .collect();

        while let Some((pid, parent)) = queue.pop_front() {
            if !seen.insert(pid) {
                continue;
            }
            for child in probe.children_of(pid) {
                queue.push_back((child, pid));
            }

            // Gone mid-walk: the exit sweep below will retire it
            let Some(rss_mib) = probe.rss_mib(pid) else {
                continue;
            };

            totals.jobs += 1;
            totals.tracked_mib += rss_mib;

            if let Some(entry) = self.table.get_mut(&pid) {
                entry.current_mib = rss_mib;
                if rss_mib > entry.peak_mib {
                    entry.peak_mib = rss_mib;
                    if let Some(idx) = entry.profile_idx {
                        store.record_by_index(idx, rss_mib, false);
                    }
                }
            } else {
                let entry = self.discover(pid, parent, rss_mib, probe, store, region);
                self.table.insert(pid, entry);
            }

            let entry = &self.table[&pid];
            if entry.profile_idx.is_some() && entry.current_mib < entry.old_peak_mib {
                totals.unused_peaks_mib += entry.old_peak_mib - entry.current_mib;
            }
        }

        self.retire_exited(&seen, probe, store);
        totals
    }

    /// Classify and attribute a newly seen descendant
    fn discover(
        &self,
        pid: Pid,
        parent: Pid,
        rss_mib: u64,
        probe: &dyn SystemProbe,
        store: &ProfileStore,
        region: Option<&SharedRegion>,
    ) -> Descendant {
        let source = probe
            .cmdline(pid)
            .and_then(|cmdline| self.classifier.classify(&cmdline));

        let (profile_idx, old_peak_mib) = match source {
            Some(path) => match store.lookup(&path) {
                Some((idx, peak_mib, _)) => {
                    // The child now accounts for itself through live RSS
                    // and unused peak, so hand back the pre-spawn
                    // reservation its parent made.
                    if let Some(region) = region {
                        if peak_mib > 0 && region.release_matching(parent, peak_mib) {
                            debug!(
                                "released {peak_mib}MiB pre-spawn reservation of pid {parent} \
                                 for discovered pid {pid} ({path})"
                            );
                        }
                    }
                    store.record_by_index(idx, rss_mib, false);
                    (Some(idx), peak_mib)
                }
                None => (Some(store.insert_or_update(&path, rss_mib, false)), 0),
            },
            None => (None, 0),
        };

        trace!(
            "new descendant pid {pid} (parent {parent}, rss {rss_mib}MiB, profile {profile_idx:?}, \
             old peak {old_peak_mib}MiB)"
        );
        Descendant {
            pid,
            parent,
            profile_idx,
            current_mib: rss_mib,
            peak_mib: rss_mib,
            old_peak_mib,
        }
    }

    /// Drop entries no longer reachable from the root, submitting final
    /// peaks for processes that actually exited
    fn retire_exited(
        &mut self,
        seen: &HashSet<Pid, RandomState>,
        probe: &dyn SystemProbe,
        store: &ProfileStore,
    ) {
        self.table.retain(|&pid, entry| {
            if seen.contains(&pid) {
                return true;
            }
            if probe.alive(pid) {
                // Re-parented away from the tree
                trace!("descendant pid {pid} left the tree, dropping");
                return false;
            }
            if let Some(idx) = entry.profile_idx {
                if entry.peak_mib > 0 || entry.old_peak_mib > 0 {
                    debug!(
                        "pid {pid} exited, final peak {}MiB (previous {}MiB)",
                        entry.peak_mib, entry.old_peak_mib
                    );
                    store.record_by_index(idx, entry.peak_mib, true);
                }
            }
            false
        });
    }
}
