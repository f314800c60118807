use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard};

/// A fixed-width array of mutexes indexed by `hash(key) % N`, serializing
/// writers whose mutation sets overlap (or merely collide in the hash).
///
/// Latches for a batch of keys are always acquired in ascending bucket
/// order, so two callers racing over overlapping key sets never deadlock —
/// they simply wait on the same sequence of mutexes.
pub struct LatchManager {
    latches: Vec<Mutex<()>>,
}

impl LatchManager {
    pub fn new(buckets: usize) -> Self {
        let buckets = buckets.max(1);
        let mut latches = Vec::with_capacity(buckets);
        latches.resize_with(buckets, || Mutex::new(()));
        LatchManager { latches }
    }

    fn bucket(&self, key: &[u8]) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.latches.len()
    }

    /// Acquires latches for every key, sorted by bucket index ascending and
    /// deduplicated, releasing all of them when the returned guard drops.
    pub fn acquire<'a>(&'a self, keys: impl IntoIterator<Item = impl AsRef<[u8]>>) -> LatchGuard<'a> {
        let mut buckets: Vec<usize> = keys.into_iter().map(|k| self.bucket(k.as_ref())).collect();
        buckets.sort_unstable();
        buckets.dedup();

        let guards = buckets.into_iter().map(|i| self.latches[i].lock().unwrap()).collect();
        LatchGuard { guards }
    }
}

/// RAII guard releasing every latch it holds on drop.
pub struct LatchGuard<'a> {
    guards: Vec<MutexGuard<'a, ()>>,
}
