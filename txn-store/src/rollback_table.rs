use crossbeam_skiplist::SkipMap;

use crate::codec::{decode_suffixed_key, encode_rollback_key};

/// In-memory ordered set of rollback-key markers. The value carries no
/// payload — presence at `encode_rollback_key(key, start_ts)` is the
/// signal.
#[derive(Default)]
pub struct RollbackTable {
    map: SkipMap<Vec<u8>, ()>,
}

impl RollbackTable {
    pub fn new() -> Self {
        RollbackTable::default()
    }

    pub fn contains(&self, user_key: &[u8], start_ts: u64) -> bool {
        self.map.contains_key(&encode_rollback_key(user_key, start_ts))
    }

    pub(crate) fn insert(&self, user_key: &[u8], start_ts: u64) {
        self.map.insert(encode_rollback_key(user_key, start_ts), ());
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Removes every marker whose `start_ts` is strictly below `watermark`.
    /// Returns the number of markers removed. Intended to run from a single
    /// dedicated GC thread, never concurrently with another writer to this
    /// table.
    pub fn gc_before(&self, watermark: u64) -> usize {
        let mut removed = 0;
        for entry in self.map.iter() {
            if let Ok((_, start_ts)) = decode_suffixed_key(entry.key()) {
                if start_ts < watermark {
                    entry.remove();
                    removed += 1;
                }
            }
        }
        removed
    }
}
