use std::ops::Bound;

use crossbeam_skiplist::SkipMap;

use crate::codec::LockRecord;
use crate::error::CResult;

/// In-memory ordered map from data key to its encoded lock record.
///
/// A `SkipMap` gives lock-free, snapshot-consistent reads with concurrent
/// writers, satisfying the Design Notes' "any concurrent ordered-key
/// structure supporting snapshot iteration (e.g. skiplist...)" directly.
/// Mutation still only happens from the lock-write pipeline worker
/// (`pipeline::Pipeline`), so there is a single writer at a time; the
/// skiplist is what lets readers (`CheckKeysLock`, `ScanLock`) proceed
/// without taking a lock of their own.
#[derive(Default)]
pub struct LockTable {
    map: SkipMap<Vec<u8>, Vec<u8>>,
}

impl LockTable {
    pub fn new() -> Self {
        LockTable::default()
    }

    pub fn get(&self, key: &[u8]) -> CResult<Option<LockRecord>> {
        match self.map.get(key) {
            Some(entry) => Ok(Some(LockRecord::decode(key, entry.value())?)),
            None => Ok(None),
        }
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.map.contains_key(key)
    }

    /// Raw encoded bytes of the lock at `key`, for byte-identical
    /// before/after comparison (used by `ResolveLock`'s re-verification).
    pub fn get_raw(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.map.get(key).map(|entry| entry.value().clone())
    }

    pub(crate) fn insert_raw(&self, key: Vec<u8>, bytes: Vec<u8>) {
        self.map.insert(key, bytes);
    }

    pub(crate) fn remove(&self, key: &[u8]) {
        self.map.remove(key);
    }

    /// Decoded locks within `[start, end)`, in key order. An empty `end`
    /// means unbounded.
    pub fn scan_range(&self, start: &[u8], end: &[u8]) -> CResult<Vec<(Vec<u8>, LockRecord)>> {
        let upper = if end.is_empty() { Bound::Unbounded } else { Bound::Excluded(end.to_vec()) };
        let bounds = (Bound::Included(start.to_vec()), upper);
        self.map
            .range(bounds)
            .map(|entry| {
                let lock = LockRecord::decode(entry.key(), entry.value())?;
                Ok((entry.key().clone(), lock))
            })
            .collect()
    }

    /// Snapshot of `(key, raw lock bytes)` for every lock with the given
    /// `start_ts`, taken without holding any latch — used by `ResolveLock`,
    /// which re-verifies each entry after acquiring its latch.
    pub fn snapshot_by_start_ts(&self, start_ts: u64) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.map
            .iter()
            .filter(|entry| {
                LockRecord::decode(entry.key(), entry.value())
                    .map(|l| l.start_ts == start_ts)
                    .unwrap_or(false)
            })
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Vec<u8>, Vec<u8>)> + '_ {
        self.map.iter().map(|entry| (entry.key().clone(), entry.value().clone()))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
