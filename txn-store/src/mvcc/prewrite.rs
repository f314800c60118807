use crate::codec::{encode_data_key, LockRecord, ValueRecord};
use crate::error::{CResult, Error};
use crate::region::RegionCtx;
use crate::request::{RequestCtx, TraceEvent};
use crate::storage::engine::Engine;

use super::{LockBatch, LockWriteOp, Mutation, MvccStore};

enum Decision {
    /// A lock from this exact `start_ts` already covers this key: the
    /// request is a retried duplicate, nothing more to write.
    AlreadyLocked,
    Write { has_old_ver: bool },
}

impl<E: Engine> MvccStore<E> {
    /// Installs a lock per mutation, all-or-nothing: every mutation is
    /// checked before any lock is written, so a failing mutation never
    /// leaves a partial lock set behind.
    pub fn prewrite(
        &self,
        mutations: &[Mutation],
        primary: &[u8],
        start_ts: u64,
        ttl: u32,
        region: &RegionCtx,
        req: &RequestCtx,
    ) -> Vec<CResult<()>> {
        req.trace(TraceEvent::AcquireLatches);
        let _guard = region.acquire_latches(mutations.iter().map(|m| &m.key));

        req.trace(TraceEvent::ReadLock);
        let mut results = Vec::with_capacity(mutations.len());
        let mut batch: LockBatch = Vec::new();
        let mut failed = false;

        for mutation in mutations {
            match self.check_prewrite_one(mutation, start_ts, req) {
                Ok(Decision::AlreadyLocked) => results.push(Ok(())),
                Ok(Decision::Write { has_old_ver }) => {
                    let lock = LockRecord {
                        start_ts,
                        op: mutation.op,
                        has_old_ver,
                        ttl,
                        primary: primary.to_vec(),
                        value: mutation.value.clone(),
                    };
                    batch.push(LockWriteOp::PutLock(mutation.key.clone(), lock.encode()));
                    results.push(Ok(()));
                }
                Err(e) => {
                    failed = true;
                    results.push(Err(e));
                }
            }
        }

        if failed {
            return results;
        }

        if !batch.is_empty() {
            req.trace(TraceEvent::EndWriteLock);
            if let Err(e) = self.lock_pipeline.submit(batch) {
                return mutations.iter().map(|_| Err(e.clone())).collect();
            }
        }
        results
    }

    fn check_prewrite_one(&self, mutation: &Mutation, start_ts: u64, req: &RequestCtx) -> CResult<Decision> {
        let key = &mutation.key;

        if self.rollbacks.contains(key, start_ts) {
            return Err(Error::AlreadyRollback { key: key.clone(), start_ts });
        }

        if let Some(lock) = self.locks.get(key)? {
            if lock.start_ts == start_ts {
                return Ok(Decision::AlreadyLocked);
            }
            return Err(Error::Locked {
                key: key.clone(),
                primary: lock.primary,
                start_ts: lock.start_ts,
                ttl: lock.ttl,
            });
        }

        req.trace(TraceEvent::ReadDB);
        match self.engine_get(&encode_data_key(key))? {
            Some(bytes) => {
                let value = ValueRecord::decode(&bytes)?;
                if value.commit_ts > start_ts {
                    return Err(Error::Retryable(format!(
                        "key {:?} has a newer committed version at commit_ts {}",
                        key, value.commit_ts
                    )));
                }
                Ok(Decision::Write { has_old_ver: true })
            }
            None => Ok(Decision::Write { has_old_ver: false }),
        }
    }
}
