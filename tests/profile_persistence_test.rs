/*!
 * Profile Persistence Tests
 * Cache-file round trips and corruption tolerance
 */

use memgate::ProfileStore;
use pretty_assertions::assert_eq;
use std::fs;

fn cache_in(dir: &tempfile::TempDir) -> std::path::PathBuf {
    dir.path().join(".make_memory_cache")
}

#[test]
fn fresh_host_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = ProfileStore::new(cache_in(&dir), 3);
    assert_eq!(store.load().unwrap(), 0);
    assert!(store.is_empty());
}

#[test]
fn persist_then_load_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = cache_in(&dir);

    let store = ProfileStore::new(path.clone(), 3);
    store.insert_or_update("src/a.cpp", 42, false);
    store.insert_or_update("lib/b.cc", 512, false);
    store.flush().unwrap();

    let reloaded = ProfileStore::new(path, 3);
    assert_eq!(reloaded.load().unwrap(), 2);
    let (_, peak, _) = reloaded.lookup("src/a.cpp").unwrap();
    assert_eq!(peak, 42);
    let (_, peak, _) = reloaded.lookup("lib/b.cc").unwrap();
    assert_eq!(peak, 512);
}

#[test]
fn zero_peak_entries_are_dropped_on_persist() {
    let dir = tempfile::tempdir().unwrap();
    let path = cache_in(&dir);

    let store = ProfileStore::new(path.clone(), 3);
    store.insert_or_update("src/empty.cpp", 0, false);
    store.insert_or_update("src/real.cpp", 10, false);
    store.flush().unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(!text.contains("src/empty.cpp"));
    assert!(text.contains("src/real.cpp"));

    let reloaded = ProfileStore::new(path, 3);
    assert_eq!(reloaded.load().unwrap(), 1);
}

#[test]
fn record_format_is_peak_lastused_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = cache_in(&dir);

    let store = ProfileStore::new(path.clone(), 3);
    store.insert_or_update("src/a.cpp", 42, false);
    store.flush().unwrap();

    let text = fs::read_to_string(&path).unwrap();
    let line = text.lines().next().unwrap();
    assert!(line.starts_with("42 "));
    assert!(line.ends_with(" src/a.cpp"));
    let fields: Vec<&str> = line.split_whitespace().collect();
    assert_eq!(fields.len(), 3);
    assert!(fields[1].parse::<i64>().is_ok());
}

#[test]
fn unparseable_lines_are_skipped_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = cache_in(&dir);
    fs::write(
        &path,
        "42 1700000000 src/good.cpp\ngarbage line\n100 not_a_number src/bad.cpp\n7 1700000001 src/other.cc\n",
    )
    .unwrap();

    let store = ProfileStore::new(path, 3);
    assert_eq!(store.load().unwrap(), 2);
    assert!(store.lookup("src/good.cpp").is_some());
    assert!(store.lookup("src/other.cc").is_some());
    assert!(store.lookup("src/bad.cpp").is_none());
}

#[test]
fn flush_leaves_no_tmp_file_behind() {
    let dir = tempfile::tempdir().unwrap();
    let path = cache_in(&dir);

    let store = ProfileStore::new(path.clone(), 3);
    store.insert_or_update("src/a.cpp", 42, false);
    store.flush().unwrap();

    assert!(path.exists());
    assert!(!dir.path().join(".make_memory_cache.tmp").exists());
}

#[test]
fn flush_clears_dirty() {
    let dir = tempfile::tempdir().unwrap();
    let store = ProfileStore::new(cache_in(&dir), 3);
    store.insert_or_update("src/a.cpp", 42, false);
    assert!(store.is_dirty());
    store.flush().unwrap();
    assert!(!store.is_dirty());
}
