/*!
 * Lifecycle Tests
 * MemoryCore wiring for top-level builds, sub-builds, and the disabled
 * path
 */

use memgate::{Admission, Config, MemoryCore, MockProbe, SharedRegion};
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

fn quiet_config(dir: &tempfile::TempDir) -> Config {
    Config {
        display_enabled: false,
        cache_path: dir.path().join(".make_memory_cache"),
        ..Config::default()
    }
}

#[test]
fn disabled_core_is_inert() {
    let config = Config {
        enabled: false,
        ..Config::default()
    };
    let core = MemoryCore::init_with_probe(config, Arc::new(MockProbe::new()));

    assert!(!core.enabled());
    assert_eq!(core.may_spawn_path("src/a.cpp"), Admission::Go);
    assert!(core.profile_stats().is_none());
    assert!(core.region_stats().is_none());
    core.child_spawned(1);
    core.child_exited(1);
    core.shutdown(false);
}

#[test]
#[serial]
fn top_level_learns_admits_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let self_pid = std::process::id();

    let probe = Arc::new(MockProbe::with_host(8192, 8192));
    probe.spawn(self_pid, 1, 0, "make -j8");
    probe.spawn(4001, self_pid, 42, "g++ -c src/a.cpp");

    let core = MemoryCore::init_with_probe(
        quiet_config(&dir),
        Arc::clone(&probe) as Arc<dyn memgate::SystemProbe>,
    );
    assert!(core.enabled());

    // Unknown file: nothing to reason about
    assert_eq!(core.may_spawn_argv(&["g++", "-c", "src/x.cpp"]), Admission::Go);

    // Let the monitor walk a few ticks and learn src/a.cpp
    std::thread::sleep(Duration::from_millis(600));
    assert!(core.profile_stats().unwrap().entries >= 1);

    // The learned peak now gates a warm admission
    probe.set_host(8192, 10);
    assert_eq!(core.may_spawn_path("src/a.cpp"), Admission::Wait);

    probe.set_host(8192, 4096);
    assert_eq!(core.may_spawn_path("src/a.cpp"), Admission::Go);
    assert_eq!(core.region_stats().unwrap().reserved_mib, 42);

    // The post-exit hook hands the reservation back
    core.child_exited(4001);
    assert_eq!(core.region_stats().unwrap().reserved_mib, 0);

    core.shutdown(false);
    let text = fs::read_to_string(dir.path().join(".make_memory_cache")).unwrap();
    assert!(text.contains("src/a.cpp"));
    assert!(text.lines().next().unwrap().starts_with("42 "));
}

#[test]
#[serial]
fn subbuild_attaches_lazily_and_never_unlinks() {
    let dir = tempfile::tempdir().unwrap();
    let owner = SharedRegion::create().unwrap();
    owner.reserve(7777, 300).unwrap();

    let config = Config {
        level: 1,
        ..quiet_config(&dir)
    };
    let core = MemoryCore::init_with_probe(config, Arc::new(MockProbe::with_host(8192, 200)));

    // No profile store in a sub-build: admission has nothing to reason
    // about and proceeds
    assert_eq!(core.may_spawn_path("src/a.cpp"), Admission::Go);
    assert!(core.profile_stats().is_none());

    // First region read attaches and sees the owner's reservations
    assert_eq!(core.region_stats().unwrap().reserved_mib, 300);

    // Sub-build teardown detaches without destroying the object
    core.shutdown(false);
    let check = SharedRegion::attach().unwrap();
    assert_eq!(check.reserved_mib(), 300);
}

#[test]
#[serial]
fn shutdown_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let probe = Arc::new(MockProbe::with_host(8192, 8192));
    let core = MemoryCore::init_with_probe(quiet_config(&dir), probe);

    core.shutdown(false);
    core.shutdown(false);
    core.stop_now();
}
