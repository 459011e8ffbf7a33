/*!
 * Probe Traits
 * The capability set the core requires from a host
 */

use super::types::HostMemory;
use crate::core::{MiB, Pid};

/// Host memory and process visibility
///
/// Every operation is non-blocking and infallible in the error sense: a
/// process that disappears mid-read is reported as gone (`None` or an
/// empty set), and a host without a cheap memory source reports
/// `None` from `host_memory`, which degrades admission to always-go.
pub trait SystemProbe: Send + Sync {
    /// Sample free/total host memory, or `None` when unknown
    fn host_memory(&self) -> Option<HostMemory>;

    /// Resident set size of `pid`, or `None` when the process is gone
    ///
    /// A live process without a measurable resident set (for example a
    /// zombie) reports `Some(0)`.
    fn rss_mib(&self, pid: Pid) -> Option<MiB>;

    /// Parent of `pid`, or `None` when the process is gone
    fn parent_of(&self, pid: Pid) -> Option<Pid>;

    /// Direct children of `pid`
    ///
    /// Must be scoped to `pid` rather than scanning the whole process
    /// table; the walker relies on this for O(live descendants) ticks.
    fn children_of(&self, pid: Pid) -> Vec<Pid>;

    /// Command line of `pid` with NUL separators folded to spaces, or
    /// `None` when the process is gone
    fn cmdline(&self, pid: Pid) -> Option<String>;

    /// Whether `pid` refers to a live process
    fn alive(&self, pid: Pid) -> bool {
        self.parent_of(pid).is_some()
    }
}
