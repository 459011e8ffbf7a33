/*!
 * Region Layout
 * The fixed wire layout of the shared accounting region
 *
 * Every participating process maps this struct at offset zero of the
 * shared object, so the layout is `repr(C)`, 8-byte aligned for the
 * atomic scalars, and must never change shape between builds sharing a
 * host.
 */

use crate::core::limits::MAX_RESERVATIONS;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU32, AtomicU64};

/// One per-pid reservation: pid doubles as the occupancy marker (zero
/// means free)
#[repr(C, align(8))]
pub(crate) struct ReservationSlot {
    pub pid: AtomicU32,
    _pad: u32,
    pub reserved_mib: AtomicU64,
}

#[repr(C, align(8))]
pub(crate) struct RegionLayout {
    /// High-water mark of occupied slot indices
    pub reservation_count: AtomicU32,
    _pad: u32,
    /// Running sum of the reservation table
    pub reserved_mib: AtomicU64,
    /// Published by the top-level monitor each tick
    pub unused_peaks_mib: AtomicU64,
    /// Guards slot allocation (`reservation_count` and pid claiming)
    pub slot_lock: UnsafeCell<libc::pthread_mutex_t>,
    /// Guards `reserved_mib` arithmetic
    pub total_lock: UnsafeCell<libc::pthread_mutex_t>,
    pub slots: [ReservationSlot; MAX_RESERVATIONS],
}

// All mutation goes through the atomics or the embedded process-shared
// mutexes; the UnsafeCells are only touched via pthread calls.
unsafe impl Sync for RegionLayout {}

/// Initialize one of the region's mutexes as process-shared
///
/// Only the top level may call this, and only while it is the sole
/// attacher.
pub(crate) unsafe fn init_shared_mutex(mutex: *mut libc::pthread_mutex_t) {
    let mut attr = MaybeUninit::<libc::pthread_mutexattr_t>::uninit();
    libc::pthread_mutexattr_init(attr.as_mut_ptr());
    libc::pthread_mutexattr_setpshared(attr.as_mut_ptr(), libc::PTHREAD_PROCESS_SHARED);
    libc::pthread_mutex_init(mutex, attr.as_ptr());
    libc::pthread_mutexattr_destroy(attr.as_mut_ptr());
}

/// RAII lock on one of the region's process-shared mutexes
pub(crate) struct RegionMutex {
    mutex: *mut libc::pthread_mutex_t,
}

impl RegionMutex {
    pub(crate) fn lock(mutex: *mut libc::pthread_mutex_t) -> Self {
        unsafe { libc::pthread_mutex_lock(mutex) };
        Self { mutex }
    }
}

impl Drop for RegionMutex {
    fn drop(&mut self) {
        unsafe { libc::pthread_mutex_unlock(self.mutex) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, offset_of};

    #[test]
    fn scalar_fields_are_8_byte_aligned() {
        assert_eq!(align_of::<RegionLayout>() % 8, 0);
        assert_eq!(offset_of!(RegionLayout, reserved_mib) % 8, 0);
        assert_eq!(offset_of!(RegionLayout, unused_peaks_mib) % 8, 0);
        assert_eq!(offset_of!(RegionLayout, slots) % 8, 0);
        assert_eq!(align_of::<ReservationSlot>() % 8, 0);
    }
}
