use crate::codec::{encode_data_key, LockRecord, Op, ValueRecord};
use crate::error::CResult;
use crate::region::RegionCtx;
use crate::request::{RequestCtx, TraceEvent};
use crate::storage::engine::Engine;

use super::{DataBatch, DataWriteOp, LockBatch, LockWriteOp, MvccStore};

impl<E: Engine> MvccStore<E> {
    /// Resolves every lock belonging to `start_ts` the same way: commit
    /// them all at `commit_ts` if it is nonzero, or roll them all back if
    /// it is zero. Used after `CheckTxnStatus` (outside this crate's
    /// scope) has already decided the transaction's fate.
    ///
    /// Takes a snapshot of matching locks without holding any latch, then
    /// re-verifies each one after acquiring its latch — a lock can change
    /// out from under the snapshot (e.g. it was already resolved by a
    /// concurrent caller) between the two steps.
    pub fn resolve_lock(&self, start_ts: u64, commit_ts: u64, region: &RegionCtx, req: &RequestCtx) -> CResult<()> {
        let snapshot = self.locks.snapshot_by_start_ts(start_ts);
        if snapshot.is_empty() {
            return Ok(());
        }

        req.trace(TraceEvent::AcquireLatches);
        let _guard = region.acquire_latches(snapshot.iter().map(|(key, _)| key));

        req.trace(TraceEvent::ReadLock);
        let mut data_batch: DataBatch = Vec::new();
        let mut lock_batch: LockBatch = Vec::new();

        for (key, snapshot_bytes) in &snapshot {
            if self.locks.get_raw(key).as_ref() != Some(snapshot_bytes) {
                // Changed since the snapshot (resolved, committed, or
                // rolled back by a racing caller) — nothing left to do.
                continue;
            }
            let lock = LockRecord::decode(key, snapshot_bytes)?;

            if commit_ts > 0 {
                if lock.op != Op::Lock {
                    let value = ValueRecord::from_lock(&lock, commit_ts);
                    data_batch.push(DataWriteOp::Put(encode_data_key(key), value.encode()));
                }
            } else {
                lock_batch.push(LockWriteOp::PutRollback(key.clone(), start_ts));
            }
            lock_batch.push(LockWriteOp::DeleteLock(key.clone()));
        }

        if !data_batch.is_empty() {
            self.data_pipeline.submit(data_batch)?;
        }

        req.trace(TraceEvent::EndWriteLock);
        if !lock_batch.is_empty() {
            self.lock_pipeline.submit(lock_batch)?;
        }
        Ok(())
    }
}
