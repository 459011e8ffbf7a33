/*!
 * Configuration
 * Environment-derived settings for the memory core
 *
 * The surrounding tool may also construct a `Config` directly; the env
 * variables exist so recursive sub-builds inherit the same settings
 * without any extra plumbing.
 */

use super::limits::{DEFAULT_DECAY_DIVISOR, PROFILE_CACHE_FILE};
use log::LevelFilter;
use std::env;
use std::path::PathBuf;

/// Master on/off toggle; falsy values `0`, `no`, `false` disable the core
pub const ENV_ENABLED: &str = "MEMGATE";

/// Disables the status line without disabling admission or learning
pub const ENV_NO_STATUS: &str = "MEMGATE_NO_STATUS";

/// Diagnostic verbosity, 0 (silent) through 4 (maximum)
pub const ENV_VERBOSE: &str = "MEMGATE_VERBOSE";

/// Comma-separated list of recognized source-file suffixes
pub const ENV_SUFFIXES: &str = "MEMGATE_SUFFIXES";

/// Divisor for the final-exit peak decay
pub const ENV_DECAY_DIVISOR: &str = "MEMGATE_DECAY_DIVISOR";

/// Default source-file suffixes recognized by the classifier
pub const DEFAULT_SUFFIXES: &[&str] = &[".cpp", ".cc", ".c"];

/// Memory-core settings
#[derive(Debug, Clone)]
pub struct Config {
    /// Master toggle; a disabled core answers every admission with go
    pub enabled: bool,
    /// Status line toggle
    pub display_enabled: bool,
    /// Diagnostic verbosity, 0 (silent) through 4 (maximum)
    pub verbosity: u8,
    /// Recursion depth of this build process; 0 is the top level
    pub level: u32,
    /// Source-file suffixes the classifier recognizes
    pub source_suffixes: Vec<String>,
    /// Final-exit peak decay divisor
    pub decay_divisor: u64,
    /// Location of the persisted profile cache
    pub cache_path: PathBuf,
}

impl Config {
    /// Build a config from the environment for a build at `level`
    pub fn from_env(level: u32) -> Self {
        Self {
            enabled: env::var(ENV_ENABLED)
                .map(|v| parse_toggle(&v))
                .unwrap_or(true),
            display_enabled: env::var(ENV_NO_STATUS)
                .map(|v| !parse_toggle(&v))
                .unwrap_or(true),
            verbosity: env::var(ENV_VERBOSE)
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0),
            level,
            source_suffixes: env::var(ENV_SUFFIXES)
                .map(|v| parse_suffixes(&v))
                .unwrap_or_else(|_| default_suffixes()),
            decay_divisor: env::var(ENV_DECAY_DIVISOR)
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .filter(|&d| d > 0)
                .unwrap_or(DEFAULT_DECAY_DIVISOR),
            cache_path: PathBuf::from(PROFILE_CACHE_FILE),
        }
    }

    /// Whether this process is the top-level build
    pub fn is_top_level(&self) -> bool {
        self.level == 0
    }

    /// Map the verbosity integer onto a `log` level filter
    pub fn level_filter(&self) -> LevelFilter {
        match self.verbosity {
            0 => LevelFilter::Off,
            1 => LevelFilter::Error,
            2 => LevelFilter::Info,
            3 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            display_enabled: true,
            verbosity: 0,
            level: 0,
            source_suffixes: default_suffixes(),
            decay_divisor: DEFAULT_DECAY_DIVISOR,
            cache_path: PathBuf::from(PROFILE_CACHE_FILE),
        }
    }
}

fn default_suffixes() -> Vec<String> {
    DEFAULT_SUFFIXES.iter().map(|s| s.to_string()).collect()
}

/// Recognize the toggle grammar: `0`, `no`, `false` are off, anything
/// else (including empty) is on
fn parse_toggle(value: &str) -> bool {
    !matches!(value.trim(), "0" | "no" | "false")
}

fn parse_suffixes(value: &str) -> Vec<String> {
    let parsed: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if parsed.is_empty() {
        default_suffixes()
    } else {
        parsed
    }
}
