use crate::codec::{LockRecord, Op};
use crate::error::{CResult, Error};
use crate::storage::engine::Engine;

use super::{LockInfo, MvccStore};

impl<E: Engine> MvccStore<E> {
    /// `CheckKeysLock`: fails if any of `keys` is blocked by a visible lock.
    pub fn check_keys_lock(&self, start_ts: u64, keys: &[Vec<u8>]) -> CResult<()> {
        for key in keys {
            if let Some(lock) = self.locks.get(key)? {
                self.check_lock(key, &lock, start_ts)?;
            }
        }
        Ok(())
    }

    /// `CheckRangeLock`: same check as `CheckKeysLock`, over every locked
    /// key in `[start_key, end_key)`.
    pub fn check_range_lock(&self, start_ts: u64, start_key: &[u8], end_key: &[u8]) -> CResult<()> {
        for (key, lock) in self.locks.scan_range(start_key, end_key)? {
            self.check_lock(&key, &lock, start_ts)?;
        }
        Ok(())
    }

    /// `ScanLock`: every lock in `[start_key, end_key)` visible to `start_ts`.
    pub fn scan_lock(&self, start_ts: u64, start_key: &[u8], end_key: &[u8]) -> CResult<Vec<LockInfo>> {
        Ok(self
            .locks
            .scan_range(start_key, end_key)?
            .into_iter()
            .filter(|(_, lock)| lock.start_ts < start_ts)
            .map(|(key, lock)| LockInfo { key, primary: lock.primary, start_ts: lock.start_ts, ttl: lock.ttl })
            .collect())
    }

    /// One key's lock-visibility decision: a `Put`/`Delete` lock older than
    /// `start_ts` blocks, unless this is the primary-key existence probe
    /// (`start_ts == u64::MAX` and `key` is the lock's own primary), which
    /// bypasses the check so `ResolveLock` callers can always read the
    /// primary's outcome. `Lock`-only locks (from a pessimistic-style
    /// "lock but don't write" mutation) never block readers.
    pub(crate) fn check_lock(&self, key: &[u8], lock: &LockRecord, start_ts: u64) -> CResult<()> {
        let lock_visible = lock.start_ts < start_ts;
        let is_write_lock = matches!(lock.op, Op::Put | Op::Delete);
        let is_primary_probe = start_ts == u64::MAX && lock.primary == key;

        if lock_visible && is_write_lock && !is_primary_probe {
            return Err(Error::Locked {
                key: key.to_vec(),
                primary: lock.primary.clone(),
                start_ts: lock.start_ts,
                ttl: lock.ttl,
            });
        }
        Ok(())
    }
}
