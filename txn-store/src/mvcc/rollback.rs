use crate::codec::{encode_data_key, is_visible_key, ValueRecord};
use crate::error::{CResult, Error};
use crate::region::RegionCtx;
use crate::request::{RequestCtx, TraceEvent};
use crate::storage::engine::Engine;

use super::{LockBatch, LockWriteOp, MvccStore};

impl<E: Engine> MvccStore<E> {
    /// Rolls back every key of a transaction that never committed, leaving
    /// a rollback marker behind so a late-arriving `Prewrite` for the same
    /// `start_ts` can never resurrect it.
    pub fn rollback(&self, keys: &[Vec<u8>], start_ts: u64, region: &RegionCtx, req: &RequestCtx) -> CResult<()> {
        self.update_latest_ts(start_ts);
        req.trace(TraceEvent::AcquireLatches);
        let _guard = region.acquire_latches(keys.iter());

        req.trace(TraceEvent::ReadLock);
        let mut batch: LockBatch = Vec::new();
        for key in keys {
            self.rollback_one(key, start_ts, req, &mut batch)?;
        }

        if !batch.is_empty() {
            req.trace(TraceEvent::EndWriteLock);
            self.lock_pipeline.submit(batch)?;
        }
        Ok(())
    }

    /// `Cleanup`: `Rollback` restricted to a single key, used when a reader
    /// discovers a stale lock and wants to clear it out of its way.
    pub fn cleanup(&self, key: &[u8], start_ts: u64, region: &RegionCtx, req: &RequestCtx) -> CResult<()> {
        self.rollback(std::slice::from_ref(&key.to_vec()), start_ts, region, req)
    }

    fn rollback_one(&self, key: &[u8], start_ts: u64, req: &RequestCtx, batch: &mut LockBatch) -> CResult<()> {
        if self.rollbacks.contains(key, start_ts) {
            return Ok(());
        }

        let lock = self.locks.get(key)?;
        if let Some(l) = &lock {
            if l.start_ts < start_ts {
                batch.push(LockWriteOp::PutRollback(key.to_vec(), start_ts));
                return Ok(());
            }
            if l.start_ts == start_ts {
                batch.push(LockWriteOp::PutRollback(key.to_vec(), start_ts));
                batch.push(LockWriteOp::DeleteLock(key.to_vec()));
                return Ok(());
            }
            // l.start_ts > start_ts: a newer transaction holds the lock;
            // fall through to the engine check below.
        }
        let has_newer_lock = matches!(&lock, Some(l) if l.start_ts > start_ts);

        req.trace(TraceEvent::ReadDB);
        let latest = self.engine_get(&encode_data_key(key))?;

        let bytes = match latest {
            None => {
                if !has_newer_lock {
                    batch.push(LockWriteOp::PutRollback(key.to_vec(), start_ts));
                }
                return Ok(());
            }
            Some(bytes) => bytes,
        };

        let value = ValueRecord::decode(&bytes)?;
        if value.start_ts == start_ts {
            return Err(Error::AlreadyCommitted { key: key.to_vec(), commit_ts: value.commit_ts });
        }
        if value.start_ts < start_ts && !has_newer_lock {
            batch.push(LockWriteOp::PutRollback(key.to_vec(), start_ts));
            return Ok(());
        }

        // Remaining case: search old versions, newest first, for the one
        // this transaction actually wrote. The first version visible to
        // `start_ts` is the newest one this transaction could have raced
        // against; a match found before that point means it already
        // committed under an earlier commit_ts.
        for (old_key, old_value) in self.old_versions(key)? {
            if is_visible_key(&old_key, start_ts)? {
                break;
            }
            if old_value.start_ts == start_ts {
                return Err(Error::AlreadyCommitted { key: key.to_vec(), commit_ts: old_value.commit_ts });
            }
        }
        Ok(())
    }
}
