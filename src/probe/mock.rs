/*!
 * Mock Probe
 * Scriptable probe for deterministic walker, gate, and monitor tests
 */

use super::traits::SystemProbe;
use super::types::HostMemory;
use crate::core::{MiB, Pid};
use ahash::RandomState;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct MockProcess {
    parent: Pid,
    rss_mib: MiB,
    cmdline: String,
}

#[derive(Default)]
struct MockState {
    host: Option<HostMemory>,
    processes: HashMap<Pid, MockProcess, RandomState>,
}

/// In-memory process tree with a settable host memory sample
#[derive(Default)]
pub struct MockProbe {
    state: Mutex<MockState>,
}

impl MockProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a known host sample
    pub fn with_host(total_mib: MiB, free_mib: MiB) -> Self {
        let probe = Self::new();
        probe.set_host(total_mib, free_mib);
        probe
    }

    pub fn set_host(&self, total_mib: MiB, free_mib: MiB) {
        self.state.lock().host = HostMemory::from_total_available(total_mib, free_mib);
    }

    /// Make host memory read as unknown
    pub fn clear_host(&self) {
        self.state.lock().host = None;
    }

    pub fn spawn(&self, pid: Pid, parent: Pid, rss_mib: MiB, cmdline: &str) {
        self.state.lock().processes.insert(
            pid,
            MockProcess {
                parent,
                rss_mib,
                cmdline: cmdline.to_string(),
            },
        );
    }

    pub fn set_rss(&self, pid: Pid, rss_mib: MiB) {
        if let Some(p) = self.state.lock().processes.get_mut(&pid) {
            p.rss_mib = rss_mib;
        }
    }

    /// Re-parent a live process, as the OS does when its parent exits
    pub fn reparent(&self, pid: Pid, new_parent: Pid) {
        if let Some(p) = self.state.lock().processes.get_mut(&pid) {
            p.parent = new_parent;
        }
    }

    pub fn kill(&self, pid: Pid) {
        self.state.lock().processes.remove(&pid);
    }
}

impl SystemProbe for MockProbe {
    fn host_memory(&self) -> Option<HostMemory> {
        self.state.lock().host
    }

    fn rss_mib(&self, pid: Pid) -> Option<MiB> {
        self.state.lock().processes.get(&pid).map(|p| p.rss_mib)
    }

    fn parent_of(&self, pid: Pid) -> Option<Pid> {
        self.state.lock().processes.get(&pid).map(|p| p.parent)
    }

    fn children_of(&self, pid: Pid) -> Vec<Pid> {
        let state = self.state.lock();
        let mut children: Vec<Pid> = state
            .processes
            .iter()
            .filter(|(_, p)| p.parent == pid)
            .map(|(&child, _)| child)
            .collect();
        children.sort_unstable();
        children
    }

    fn cmdline(&self, pid: Pid) -> Option<String> {
        self.state.lock().processes.get(&pid).map(|p| p.cmdline.clone())
    }
}
