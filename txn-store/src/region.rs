use std::sync::atomic::{AtomicI64, Ordering};

use crate::latch::{LatchGuard, LatchManager};

/// The region context an MVCC operation runs under: the key range it owns,
/// its latch set, and a size-accounting counter. Real deployments share one
/// `RegionCtx` per range across requests; this crate's `MvccStore` owns a
/// single region covering the whole keyspace, which is enough to exercise
/// every transaction operation without a range-routing layer.
pub struct RegionCtx {
    pub start_key: Vec<u8>,
    pub end_key: Vec<u8>,
    latches: LatchManager,
    diff: AtomicI64,
}

impl RegionCtx {
    pub fn new(start_key: Vec<u8>, end_key: Vec<u8>, latch_buckets: usize) -> Self {
        RegionCtx { start_key, end_key, latches: LatchManager::new(latch_buckets), diff: AtomicI64::new(0) }
    }

    pub fn whole_keyspace(latch_buckets: usize) -> Self {
        Self::new(Vec::new(), Vec::new(), latch_buckets)
    }

    pub fn acquire_latches<'a>(&'a self, keys: impl IntoIterator<Item = impl AsRef<[u8]>>) -> LatchGuard<'a> {
        self.latches.acquire(keys)
    }

    pub fn in_range(&self, key: &[u8]) -> bool {
        key >= self.start_key.as_slice() && (self.end_key.is_empty() || key < self.end_key.as_slice())
    }

    /// Adds `delta` bytes to the region's split-size accounting counter.
    pub fn add_diff(&self, delta: i64) {
        self.diff.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn diff(&self) -> i64 {
        self.diff.load(Ordering::Relaxed)
    }
}
