use std::path::PathBuf;

use serde_derive::{Deserialize, Serialize};

/// Tunables for a `MvccStore`: lock TTL, latch width, rollback-GC safe
/// margin and interval, and the lock-log path, each a documented field with
/// a hand-written `Default` impl rather than buried constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// TTL (milliseconds) assigned to a lock when the caller does not override it.
    pub default_lock_ttl_ms: u32,

    /// Number of latch buckets; keys hashing to the same bucket serialize
    /// against each other even when they differ.
    pub latch_buckets: usize,

    /// A rollback marker is only GC-eligible once `latest_ts` exceeds its
    /// `start_ts` by at least this many logical ticks.
    pub rollback_gc_safe_margin: u64,

    /// How often the rollback-marker GC worker wakes up.
    pub gc_interval_ms: u64,

    /// Where the lock-log file lives; `None` disables persistence (useful
    /// for purely in-memory tests).
    pub lock_log_path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            default_lock_ttl_ms: 3000,
            latch_buckets: 256,
            rollback_gc_safe_margin: 1,
            gc_interval_ms: 10_000,
            lock_log_path: None,
        }
    }
}
