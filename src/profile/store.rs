/*!
 * Profile Store
 * Growable table of per-source-file peak profiles with an atomically
 * persisted text cache
 *
 * The table only grows; entries are never moved or removed, so an
 * index handed out once stays valid for the life of the process. The
 * top-level build is the only writer of the cache file.
 */

use super::types::{ProfileEntry, ProfileError, ProfileStats};
use crate::core::limits::{PROFILE_FLUSH_INTERVAL, PROFILE_INITIAL_CAPACITY};
use crate::core::{epoch_secs, MiB};
use ahash::RandomState;
use log::{debug, info, trace, warn};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

struct StoreInner {
    entries: Vec<ProfileEntry>,
    index: HashMap<String, usize, RandomState>,
    dirty: bool,
    last_flush: Option<Instant>,
}

/// Per-source-file peak-memory profile table
pub struct ProfileStore {
    cache_path: PathBuf,
    decay_divisor: u64,
    inner: RwLock<StoreInner>,
}

impl ProfileStore {
    pub fn new(cache_path: impl Into<PathBuf>, decay_divisor: u64) -> Self {
        Self {
            cache_path: cache_path.into(),
            decay_divisor: decay_divisor.max(1),
            inner: RwLock::new(StoreInner {
                entries: Vec::with_capacity(PROFILE_INITIAL_CAPACITY),
                index: HashMap::with_hasher(RandomState::new()),
                dirty: false,
                last_flush: None,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.read().dirty
    }

    pub fn stats(&self) -> ProfileStats {
        let inner = self.inner.read();
        ProfileStats {
            entries: inner.entries.len(),
            dirty: inner.dirty,
        }
    }

    /// Look up a profile by path, returning its stable index, peak, and
    /// last-used time
    pub fn lookup(&self, path: &str) -> Option<(usize, MiB, i64)> {
        let inner = self.inner.read();
        let idx = *inner.index.get(path)?;
        let entry = &inner.entries[idx];
        Some((idx, entry.peak_mib, entry.last_used))
    }

    /// Peak of an entry by stable index
    pub fn peak_of(&self, index: usize) -> Option<MiB> {
        self.inner.read().entries.get(index).map(|e| e.peak_mib)
    }

    /// Path of an entry by stable index
    pub fn path_of(&self, index: usize) -> Option<String> {
        self.inner.read().entries.get(index).map(|e| e.path.clone())
    }

    /// Record an observation for `path`, creating the profile on first
    /// sight, and return its stable index
    ///
    /// Non-final observations only raise the stored peak. A final
    /// observation below the stored peak pulls the stored value down by
    /// a third of the gap, smoothing away transient highs from earlier
    /// runs.
    pub fn insert_or_update(&self, path: &str, observed_mib: MiB, final_update: bool) -> usize {
        let mut inner = self.inner.write();
        if let Some(&idx) = inner.index.get(path) {
            self.apply(&mut inner, idx, observed_mib, final_update);
            return idx;
        }

        let idx = inner.entries.len();
        inner.entries.push(ProfileEntry {
            path: path.to_string(),
            peak_mib: observed_mib,
            last_used: epoch_secs(),
        });
        inner.index.insert(path.to_string(), idx);
        inner.dirty = true;
        debug!(
            "added profile {}: {}MiB ({} profiles)",
            path,
            observed_mib,
            inner.entries.len()
        );
        idx
    }

    /// Record an observation for an already-indexed profile
    pub fn record_by_index(&self, index: usize, observed_mib: MiB, final_update: bool) {
        let mut inner = self.inner.write();
        if index >= inner.entries.len() {
            warn!("profile update for out-of-range index {index}, ignoring");
            return;
        }
        self.apply(&mut inner, index, observed_mib, final_update);
    }

    fn apply(&self, inner: &mut StoreInner, idx: usize, observed_mib: MiB, final_update: bool) {
        let prev = inner.entries[idx].peak_mib;
        if !final_update && observed_mib <= prev {
            return;
        }

        let new_peak = if final_update && observed_mib < prev {
            prev - (prev - observed_mib) / self.decay_divisor
        } else {
            observed_mib
        };

        let entry = &mut inner.entries[idx];
        entry.peak_mib = new_peak;
        entry.last_used = epoch_secs();
        inner.dirty = true;
        trace!(
            "profile {} peak {}MiB -> {}MiB (final: {})",
            entry.path,
            prev,
            new_peak,
            final_update
        );
    }

    /// Load the persisted cache, skipping lines that do not parse
    ///
    /// Returns the number of profiles loaded. A missing file is a fresh
    /// host, not an error.
    pub fn load(&self) -> Result<usize, ProfileError> {
        let text = match fs::read_to_string(&self.cache_path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no profile cache at {}, starting empty", self.cache_path.display());
                return Ok(0);
            }
            Err(source) => {
                return Err(ProfileError::Load {
                    path: self.cache_path.clone(),
                    source,
                })
            }
        };

        let mut inner = self.inner.write();
        let mut loaded = 0usize;
        for line in text.lines() {
            let Some(entry) = parse_record(line) else {
                trace!("skipping unparseable profile line: {line:?}");
                continue;
            };
            if inner.index.contains_key(&entry.path) {
                continue;
            }
            let idx = inner.entries.len();
            inner.index.insert(entry.path.clone(), idx);
            inner.entries.push(entry);
            loaded += 1;
        }
        info!(
            "loaded {} profiles from {}",
            loaded,
            self.cache_path.display()
        );
        Ok(loaded)
    }

    /// Flush when dirty and the rate limit allows; returns whether a
    /// flush happened
    pub fn flush_if_dirty(&self) -> bool {
        {
            let inner = self.inner.read();
            if !inner.dirty {
                return false;
            }
            if let Some(last) = inner.last_flush {
                if last.elapsed() < PROFILE_FLUSH_INTERVAL {
                    return false;
                }
            }
        }
        match self.flush() {
            Ok(()) => true,
            Err(e) => {
                warn!("{e}");
                false
            }
        }
    }

    /// Write the cache file unconditionally via a sibling `.tmp` and an
    /// atomic rename
    ///
    /// Entries whose peak is zero are omitted to keep the file compact.
    pub fn flush(&self) -> Result<(), ProfileError> {
        let tmp_path = tmp_sibling(&self.cache_path);
        let mut inner = self.inner.write();

        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp_path)?;
            for entry in inner.entries.iter().filter(|e| e.peak_mib > 0) {
                writeln!(file, "{} {} {}", entry.peak_mib, entry.last_used, entry.path)?;
            }
            file.flush()?;
            fs::rename(&tmp_path, &self.cache_path)
        };
        write().map_err(|source| ProfileError::Persist {
            path: self.cache_path.clone(),
            source,
        })?;

        inner.dirty = false;
        inner.last_flush = Some(Instant::now());
        debug!(
            "saved {} profiles to {}",
            inner.entries.len(),
            self.cache_path.display()
        );
        Ok(())
    }
}

/// Parse one `<peak_mib> <last_used_secs> <path>` record
fn parse_record(line: &str) -> Option<ProfileEntry> {
    let mut fields = line.split_whitespace();
    let peak_mib: MiB = fields.next()?.parse().ok()?;
    let last_used: i64 = fields.next()?.parse().ok()?;
    let path = fields.next()?;
    Some(ProfileEntry {
        path: path.to_string(),
        peak_mib,
        last_used,
    })
}

fn tmp_sibling(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}.tmp", path.display()))
}
