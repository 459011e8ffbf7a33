/*!
 * Shared Region Tests
 * Reservation table semantics over a real POSIX shared-memory object
 */

use memgate::core::limits::MAX_RESERVATIONS;
use memgate::{MockProbe, RegionError, SharedRegion};
use pretty_assertions::assert_eq;
use serial_test::serial;

#[test]
#[serial]
fn reserve_and_release_balance() {
    let region = SharedRegion::open("/memgate_test_balance", true).unwrap();

    region.reserve(100, 512).unwrap();
    assert_eq!(region.reserved_mib(), 512);

    region.reserve(200, 128).unwrap();
    assert_eq!(region.reserved_mib(), 640);

    assert!(region.release(100));
    assert_eq!(region.reserved_mib(), 128);

    // Released pid no longer occupies a slot
    assert!(!region.release(100));

    assert!(region.release(200));
    assert_eq!(region.reserved_mib(), 0);
}

#[test]
#[serial]
fn repeat_reserve_is_idempotent() {
    let region = SharedRegion::open("/memgate_test_idempotent", true).unwrap();

    region.reserve(100, 512).unwrap();
    region.reserve(100, 512).unwrap();
    assert_eq!(region.reserved_mib(), 512);
    assert_eq!(region.stats().slots_in_use, 1);
}

#[test]
#[serial]
fn reserve_overwrites_per_pid() {
    let region = SharedRegion::open("/memgate_test_overwrite", true).unwrap();

    region.reserve(100, 512).unwrap();
    region.reserve(100, 200).unwrap();
    assert_eq!(region.reserved_mib(), 200);

    region.reserve(100, 800).unwrap();
    assert_eq!(region.reserved_mib(), 800);
}

#[test]
#[serial]
fn zero_reserve_is_a_release() {
    let region = SharedRegion::open("/memgate_test_zero", true).unwrap();

    region.reserve(100, 512).unwrap();
    region.reserve(100, 0).unwrap();
    assert_eq!(region.reserved_mib(), 0);
    assert_eq!(region.stats().slots_in_use, 0);
}

#[test]
#[serial]
fn release_matching_reports_the_amount() {
    let region = SharedRegion::open("/memgate_test_matching", true).unwrap();

    region.reserve(100, 200).unwrap();
    assert!(region.release_matching(100, 200));

    region.reserve(100, 200).unwrap();
    // Mismatched amount still frees the slot but reports false
    assert!(!region.release_matching(100, 300));
    assert_eq!(region.reserved_mib(), 0);

    assert!(!region.release_matching(999, 50));
}

#[test]
#[serial]
fn freed_slots_are_refilled() {
    let region = SharedRegion::open("/memgate_test_refill", true).unwrap();

    region.reserve(100, 10).unwrap();
    region.reserve(200, 20).unwrap();
    let high_water = region.stats().high_water;

    region.release(100);
    region.reserve(300, 30).unwrap();

    // The freed slot is reused rather than extending the table
    assert_eq!(region.stats().high_water, high_water);
    assert_eq!(region.reserved_mib(), 50);
}

#[test]
#[serial]
fn table_exhaustion_fails_gracefully() {
    let region = SharedRegion::open("/memgate_test_exhaustion", true).unwrap();

    for i in 0..MAX_RESERVATIONS {
        region.reserve(1000 + i as u32, 1).unwrap();
    }
    let result = region.reserve(9999, 1);
    assert!(matches!(result, Err(RegionError::SlotsExhausted { .. })));

    // The failed attempt left totals untouched
    assert_eq!(region.reserved_mib(), MAX_RESERVATIONS as u64);
}

#[test]
#[serial]
fn scalar_total_matches_table_sum() {
    let region = SharedRegion::open("/memgate_test_integrity", true).unwrap();

    region.reserve(100, 512).unwrap();
    region.reserve(200, 128).unwrap();
    region.release(100);
    region.reserve(300, 64).unwrap();

    assert_eq!(region.recompute_reserved(), region.reserved_mib());
}

#[test]
#[serial]
fn unused_peaks_publish_and_read_back() {
    let region = SharedRegion::open("/memgate_test_unused", true).unwrap();

    assert_eq!(region.unused_peaks_mib(), 0);
    region.publish_unused_peaks(300);
    assert_eq!(region.unused_peaks_mib(), 300);

    region.reserve(100, 200).unwrap();
    assert_eq!(region.imminent_mib(), 500);
}

#[test]
#[serial]
fn attacher_sees_the_creators_reservations() {
    let creator = SharedRegion::open("/memgate_test_attach", true).unwrap();
    creator.reserve(100, 512).unwrap();

    let attacher = SharedRegion::open("/memgate_test_attach", false).unwrap();
    assert_eq!(attacher.reserved_mib(), 512);

    attacher.reserve(200, 100).unwrap();
    assert_eq!(creator.reserved_mib(), 612);
}

#[test]
#[serial]
fn top_level_zeroes_a_stale_region() {
    {
        let stale = SharedRegion::open("/memgate_test_stale", false).unwrap();
        stale.reserve(100, 512).unwrap();
        // Dropping a non-owner handle leaves the object behind
    }
    let fresh = SharedRegion::open("/memgate_test_stale", true).unwrap();
    assert_eq!(fresh.reserved_mib(), 0);
    assert_eq!(fresh.stats().slots_in_use, 0);
}

#[test]
#[serial]
fn sweep_releases_dead_owners() {
    let region = SharedRegion::open("/memgate_test_sweep", true).unwrap();
    let probe = MockProbe::new();
    probe.spawn(100, 1, 0, "make");

    region.reserve(100, 512).unwrap();
    region.reserve(200, 128).unwrap();

    // Pid 200 is not alive; its reservation goes away
    assert_eq!(region.sweep_dead(&probe), 1);
    assert_eq!(region.reserved_mib(), 512);
    assert_eq!(region.stats().slots_in_use, 1);
}
