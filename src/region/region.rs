/*!
 * Shared Region
 * Mapping and reservation operations over the shared accounting region
 */

use super::layout::{init_shared_mutex, RegionLayout, RegionMutex, ReservationSlot};
use super::types::{RegionError, RegionStats};
use crate::core::limits::{MAX_RESERVATIONS, SHARED_REGION_NAME};
use crate::core::{MiB, Pid};
use crate::probe::SystemProbe;
use log::{debug, info, trace, warn};
use nix::fcntl::OFlag;
use nix::sys::mman::{mmap, munmap, shm_open, shm_unlink, MapFlags, ProtFlags};
use nix::sys::stat::Mode;
use std::fs::File;
use std::mem;
use std::num::NonZeroUsize;
use std::ptr::{self, NonNull};
use std::sync::atomic::Ordering;

/// Handle on the mapped per-host accounting region
///
/// The top-level build constructs the owning handle, which zeroes the
/// object (fresh or stale) and unlinks it on drop; sub-builds attach
/// without touching initialization.
pub struct SharedRegion {
    ptr: NonNull<RegionLayout>,
    name: String,
    owner: bool,
}

// The mapping is valid for the life of the handle and all access goes
// through atomics or the embedded process-shared mutexes.
unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}

impl SharedRegion {
    /// Create (or reuse and re-zero) the region as the top-level build
    pub fn create() -> Result<Self, RegionError> {
        Self::open(SHARED_REGION_NAME, true)
    }

    /// Attach to the region from a sub-build
    pub fn attach() -> Result<Self, RegionError> {
        Self::open(SHARED_REGION_NAME, false)
    }

    /// Open the named region; `top_level` zeroes it and takes ownership
    /// of teardown
    pub fn open(name: &str, top_level: bool) -> Result<Self, RegionError> {
        let size = mem::size_of::<RegionLayout>();

        let fd = shm_open(name, OFlag::O_CREAT | OFlag::O_RDWR, Mode::from_bits_truncate(0o666))
            .map_err(|source| RegionError::Open {
                name: name.to_string(),
                source,
            })?;
        let file = File::from(fd);

        let current_len = file
            .metadata()
            .map(|m| m.len())
            .map_err(|source| RegionError::Resize {
                name: name.to_string(),
                source,
            })?;
        let fresh = (current_len as usize) < size;
        if fresh {
            file.set_len(size as u64).map_err(|source| RegionError::Resize {
                name: name.to_string(),
                source,
            })?;
        }

        let mapping = unsafe {
            mmap(
                None,
                NonZeroUsize::new(size).expect("region layout is not zero-sized"),
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                &file,
                0,
            )
        }
        .map_err(|source| RegionError::Map {
            name: name.to_string(),
            source,
        })?;

        let region = Self {
            ptr: mapping.cast(),
            name: name.to_string(),
            owner: top_level,
        };

        if top_level {
            // Zero everything, stale leftovers from a crashed build
            // included, then bring the mutexes up process-shared while
            // this process is still the only attacher.
            unsafe {
                ptr::write_bytes(region.ptr.as_ptr().cast::<u8>(), 0, size);
                let layout = region.layout();
                init_shared_mutex(layout.slot_lock.get());
                init_shared_mutex(layout.total_lock.get());
            }
            info!(
                "{} shared region {} ({} bytes)",
                if fresh { "created" } else { "reusing" },
                name,
                size
            );
        } else {
            debug!("attached to shared region {name}");
        }

        Ok(region)
    }

    fn layout(&self) -> &RegionLayout {
        unsafe { self.ptr.as_ref() }
    }

    /// Occupied prefix of the slot table, clamped to the fixed capacity
    fn active_slots(&self) -> &[ReservationSlot] {
        let layout = self.layout();
        let count = (layout.reservation_count.load(Ordering::Acquire) as usize)
            .min(MAX_RESERVATIONS);
        &layout.slots[..count]
    }

    fn slot_of(&self, pid: Pid) -> Option<usize> {
        self.active_slots()
            .iter()
            .position(|s| s.pid.load(Ordering::Acquire) == pid)
    }

    /// Reserve `mib` under `pid`, overwriting any prior reservation for
    /// that pid; a zero amount is a pure release
    pub fn reserve(&self, pid: Pid, mib: MiB) -> Result<(), RegionError> {
        if mib == 0 {
            self.release(pid);
            return Ok(());
        }

        let layout = self.layout();
        let mut slot_idx = self.slot_of(pid);
        if slot_idx.is_none() {
            let _guard = RegionMutex::lock(layout.slot_lock.get());
            slot_idx = self.slot_of(pid);
            if slot_idx.is_none() {
                let free = layout
                    .slots
                    .iter()
                    .position(|s| s.pid.load(Ordering::Acquire) == 0);
                let Some(idx) = free else {
                    return Err(RegionError::SlotsExhausted {
                        max: MAX_RESERVATIONS,
                    });
                };
                layout.slots[idx].reserved_mib.store(0, Ordering::Release);
                layout.slots[idx].pid.store(pid, Ordering::Release);
                let count = layout.reservation_count.load(Ordering::Acquire) as usize;
                if idx >= count {
                    layout
                        .reservation_count
                        .store((idx + 1) as u32, Ordering::Release);
                }
                slot_idx = Some(idx);
            }
        }

        let slot = &layout.slots[slot_idx.expect("slot claimed above")];
        let _guard = RegionMutex::lock(layout.total_lock.get());
        let old = slot.reserved_mib.load(Ordering::Acquire);
        slot.reserved_mib.store(mib, Ordering::Release);
        let total = layout.reserved_mib.load(Ordering::Acquire);
        let new_total = if mib >= old {
            total.saturating_add(mib - old)
        } else {
            total.saturating_sub(old - mib)
        };
        layout.reserved_mib.store(new_total, Ordering::Release);
        debug!("reserved {mib}MiB for pid {pid} (total {total}MiB -> {new_total}MiB)");
        Ok(())
    }

    /// Free the reservation held under `pid`; returns whether one
    /// existed
    pub fn release(&self, pid: Pid) -> bool {
        self.release_amount(pid).is_some()
    }

    /// Free the reservation held under `pid` and report whether it held
    /// exactly `mib`; the walker's implicit-release form
    pub fn release_matching(&self, pid: Pid, mib: MiB) -> bool {
        self.release_amount(pid) == Some(mib)
    }

    fn release_amount(&self, pid: Pid) -> Option<MiB> {
        let layout = self.layout();
        let idx = self.slot_of(pid)?;
        let slot = &layout.slots[idx];
        let old = {
            let _guard = RegionMutex::lock(layout.total_lock.get());
            let old = slot.reserved_mib.load(Ordering::Acquire);
            slot.reserved_mib.store(0, Ordering::Release);
            let total = layout.reserved_mib.load(Ordering::Acquire);
            layout
                .reserved_mib
                .store(total.saturating_sub(old), Ordering::Release);
            old
        };
        // Clearing the pid frees the slot for reuse
        slot.pid.store(0, Ordering::Release);
        debug!("released {old}MiB reservation of pid {pid}");
        Some(old)
    }

    /// Running sum of the reservation table
    pub fn reserved_mib(&self) -> MiB {
        self.layout().reserved_mib.load(Ordering::Relaxed)
    }

    /// Monitor-published unused-peaks total
    pub fn unused_peaks_mib(&self) -> MiB {
        self.layout().unused_peaks_mib.load(Ordering::Relaxed)
    }

    /// Reserved peaks plus unused peaks: memory about to be used
    pub fn imminent_mib(&self) -> MiB {
        self.reserved_mib().saturating_add(self.unused_peaks_mib())
    }

    /// Publish the walker's unused-peaks total
    pub fn publish_unused_peaks(&self, mib: MiB) {
        self.layout().unused_peaks_mib.store(mib, Ordering::Relaxed);
    }

    /// Recompute the reservation total from the table, for the
    /// monitor's integrity check
    pub fn recompute_reserved(&self) -> MiB {
        self.active_slots()
            .iter()
            .filter(|s| s.pid.load(Ordering::Acquire) != 0)
            .map(|s| s.reserved_mib.load(Ordering::Acquire))
            .sum()
    }

    /// Release reservations whose owning process has exited
    pub fn sweep_dead(&self, probe: &dyn SystemProbe) -> usize {
        let dead: Vec<Pid> = self
            .active_slots()
            .iter()
            .map(|s| s.pid.load(Ordering::Acquire))
            .filter(|&pid| pid != 0 && !probe.alive(pid))
            .collect();
        let mut swept = 0;
        for pid in dead {
            if self.release(pid) {
                trace!("swept reservation of exited pid {pid}");
                swept += 1;
            }
        }
        swept
    }

    pub fn stats(&self) -> RegionStats {
        let slots_in_use = self
            .active_slots()
            .iter()
            .filter(|s| s.pid.load(Ordering::Acquire) != 0)
            .count();
        RegionStats {
            reserved_mib: self.reserved_mib(),
            unused_peaks_mib: self.unused_peaks_mib(),
            slots_in_use,
            high_water: self.active_slots().len(),
        }
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = munmap(self.ptr.cast(), mem::size_of::<RegionLayout>()) {
                warn!("failed to unmap shared region {}: {e}", self.name);
            }
        }
        if self.owner {
            match shm_unlink(self.name.as_str()) {
                Ok(()) => debug!("removed shared region {}", self.name),
                Err(nix::errno::Errno::ENOENT) => {}
                Err(e) => warn!("failed to remove shared region {}: {e}", self.name),
            }
        }
    }
}
