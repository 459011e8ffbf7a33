/*!
 * Linux Probe
 * /proc-backed implementation of the probe capability set
 *
 * Every read treats a vanished file as "process gone" rather than an
 * error; the next monitor tick corrects any view that raced with a
 * spawn or exit.
 */

use super::traits::SystemProbe;
use super::types::HostMemory;
use crate::core::{MiB, Pid};
use std::fs;
use std::path::PathBuf;

const KIB_PER_MIB: u64 = 1024;

/// `/proc`-backed probe
#[derive(Debug, Clone)]
pub struct ProcProbe {
    root: PathBuf,
}

impl ProcProbe {
    pub fn new() -> Self {
        Self {
            root: PathBuf::from("/proc"),
        }
    }

    /// Probe a fake proc tree, for tests against canned file layouts
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn pid_dir(&self, pid: Pid) -> PathBuf {
        self.root.join(pid.to_string())
    }

    /// Scan `/proc/<pid>/status` for a single `key: value kB`-style field
    fn status_field(&self, pid: Pid, key: &str) -> Option<String> {
        let text = fs::read_to_string(self.pid_dir(pid).join("status")).ok()?;
        for line in text.lines() {
            if let Some(rest) = line.strip_prefix(key) {
                return Some(rest.trim().to_string());
            }
        }
        None
    }
}

impl Default for ProcProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemProbe for ProcProbe {
    fn host_memory(&self) -> Option<HostMemory> {
        let text = fs::read_to_string(self.root.join("meminfo")).ok()?;
        let mut total_kib = 0u64;
        let mut available_kib = 0u64;
        for line in text.lines() {
            if let Some(rest) = line.strip_prefix("MemTotal:") {
                total_kib = parse_kib(rest)?;
            } else if let Some(rest) = line.strip_prefix("MemAvailable:") {
                available_kib = parse_kib(rest)?;
                break;
            }
        }
        HostMemory::from_total_available(total_kib / KIB_PER_MIB, available_kib / KIB_PER_MIB)
    }

    fn rss_mib(&self, pid: Pid) -> Option<MiB> {
        // Status must exist for the process to count as live; a live
        // process without VmRSS (zombie, kernel thread) reads as zero.
        let text = fs::read_to_string(self.pid_dir(pid).join("status")).ok()?;
        for line in text.lines() {
            if let Some(rest) = line.strip_prefix("VmRSS:") {
                return Some(parse_kib(rest).unwrap_or(0) / KIB_PER_MIB);
            }
        }
        Some(0)
    }

    fn parent_of(&self, pid: Pid) -> Option<Pid> {
        self.status_field(pid, "PPid:")?.parse().ok()
    }

    fn children_of(&self, pid: Pid) -> Vec<Pid> {
        // /proc/<pid>/task/<tid>/children keeps enumeration scoped to
        // this pid instead of a full process-table scan.
        let mut children = Vec::new();
        let task_dir = self.pid_dir(pid).join("task");
        let Ok(tasks) = fs::read_dir(&task_dir) else {
            return children;
        };
        for task in tasks.flatten() {
            let Ok(text) = fs::read_to_string(task.path().join("children")) else {
                continue;
            };
            children.extend(text.split_whitespace().filter_map(|t| t.parse::<Pid>().ok()));
        }
        children
    }

    fn cmdline(&self, pid: Pid) -> Option<String> {
        let bytes = fs::read(self.pid_dir(pid).join("cmdline")).ok()?;
        if bytes.is_empty() {
            return None;
        }
        let text: String = bytes
            .iter()
            .map(|&b| if b == 0 { ' ' } else { b as char })
            .collect();
        Some(text.trim_end().to_string())
    }

    fn alive(&self, pid: Pid) -> bool {
        self.pid_dir(pid).join("status").exists()
    }
}

/// Parse the numeric head of a `/proc` field like ` 16384 kB`
fn parse_kib(rest: &str) -> Option<u64> {
    rest.split_whitespace().next()?.parse().ok()
}
