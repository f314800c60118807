use crate::codec::{encode_data_key, encode_old_key, Op, ValueRecord};
use crate::error::{CResult, Error};
use crate::region::RegionCtx;
use crate::request::{RequestCtx, TraceEvent};
use crate::storage::engine::Engine;

use super::{DataBatch, DataWriteOp, LockBatch, LockWriteOp, MvccStore};

impl<E: Engine> MvccStore<E> {
    /// Commits a previously prewritten transaction. Builds the full data
    /// batch before submitting anything, then relies on the pipelines'
    /// strict ordering: the data batch is durable before the lock-deletion
    /// batch is even submitted, so a crash in between leaves committed
    /// values visible with their locks still standing — recoverable by a
    /// retried `Commit`, never by losing data.
    pub fn commit(
        &self,
        keys: &[Vec<u8>],
        start_ts: u64,
        commit_ts: u64,
        region: &RegionCtx,
        req: &RequestCtx,
    ) -> CResult<()> {
        self.update_latest_ts(commit_ts);
        req.trace(TraceEvent::AcquireLatches);
        let _guard = region.acquire_latches(keys.iter());

        req.trace(TraceEvent::ReadLock);
        let mut data_batch: DataBatch = Vec::new();
        let mut need_move_to_old: Vec<Vec<u8>> = Vec::new();
        let mut committed: Vec<Vec<u8>> = Vec::with_capacity(keys.len());

        for key in keys {
            let lock = match self.locks.get(key)? {
                Some(lock) => lock,
                None => return self.handle_lock_not_found(key, start_ts, commit_ts),
            };
            if lock.start_ts != start_ts {
                return Err(Error::Replaced { key: key.clone(), start_ts });
            }

            if lock.op != Op::Lock {
                let value = ValueRecord::from_lock(&lock, commit_ts);
                region.add_diff((key.len() + value.value.len()) as i64);
                data_batch.push(DataWriteOp::Put(encode_data_key(key), value.encode()));
            }
            if lock.has_old_ver {
                need_move_to_old.push(key.clone());
            }
            committed.push(key.clone());
        }

        req.trace(TraceEvent::ReadDB);
        for key in &need_move_to_old {
            if let Some(bytes) = self.engine_get(&encode_data_key(key))? {
                let current = ValueRecord::decode(&bytes)?;
                data_batch.push(DataWriteOp::Put(encode_old_key(key, current.commit_ts), bytes));
            }
        }

        if !data_batch.is_empty() {
            self.data_pipeline.submit(data_batch)?;
        }

        req.trace(TraceEvent::EndWriteLock);
        let lock_batch: LockBatch = committed.iter().map(|key| LockWriteOp::DeleteLock(key.clone())).collect();
        if !lock_batch.is_empty() {
            self.lock_pipeline.submit(lock_batch)?;
        }

        Ok(())
    }

    /// No lock is standing at `key`: either this commit already ran (the
    /// current value carries this `start_ts`, or an old version at exactly
    /// `commit_ts` does), or it genuinely never happened.
    fn handle_lock_not_found(&self, key: &[u8], start_ts: u64, commit_ts: u64) -> CResult<()> {
        if let Some(bytes) = self.engine_get(&encode_data_key(key))? {
            let latest = ValueRecord::decode(&bytes)?;
            if latest.start_ts == start_ts {
                return Ok(());
            }
        }
        if self.engine_get(&encode_old_key(key, commit_ts))?.is_some() {
            return Ok(());
        }
        Err(Error::LockNotFound { key: key.to_vec(), start_ts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Op as MutOp;
    use crate::config::StoreConfig;
    use crate::mvcc::Mutation;
    use crate::region::RegionCtx;
    use crate::request::RequestCtx;
    use crate::storage::memory::Memory;

    fn store() -> MvccStore<Memory> {
        MvccStore::new(Memory::new(), StoreConfig { lock_log_path: None, ..StoreConfig::default() }).unwrap()
    }

    #[test]
    fn commit_writes_value_and_drops_lock() {
        let store = store();
        let region = RegionCtx::whole_keyspace(store.config().latch_buckets);
        let req = RequestCtx::new();

        let mutations = vec![Mutation { key: b"a".to_vec(), op: MutOp::Put, value: b"v1".to_vec() }];
        store.prewrite(&mutations, b"a", 10, 1000, &region, &req)[0].as_ref().unwrap();
        store.commit(&[b"a".to_vec()], 10, 20, &region, &req).unwrap();

        assert!(store.lock_table().is_empty());
        assert_eq!(store.get(b"a", 100, &req).unwrap(), Some(b"v1".to_vec()));
    }

    #[test]
    fn commit_retried_after_success_is_idempotent() {
        let store = store();
        let region = RegionCtx::whole_keyspace(store.config().latch_buckets);
        let req = RequestCtx::new();

        let mutations = vec![Mutation { key: b"a".to_vec(), op: MutOp::Put, value: b"v1".to_vec() }];
        store.prewrite(&mutations, b"a", 10, 1000, &region, &req)[0].as_ref().unwrap();
        store.commit(&[b"a".to_vec()], 10, 20, &region, &req).unwrap();
        // Lock is gone; handle_lock_not_found must recognize this as already committed.
        store.commit(&[b"a".to_vec()], 10, 20, &region, &req).unwrap();
    }

    #[test]
    fn commit_without_prewrite_or_prior_success_fails() {
        let store = store();
        let region = RegionCtx::whole_keyspace(store.config().latch_buckets);
        let req = RequestCtx::new();

        let result = store.commit(&[b"a".to_vec()], 10, 20, &region, &req);
        assert!(matches!(result, Err(Error::LockNotFound { .. })));
    }

    #[test]
    fn commit_replaced_lock_is_rejected() {
        let store = store();
        let region = RegionCtx::whole_keyspace(store.config().latch_buckets);
        let req = RequestCtx::new();

        let mutations = vec![Mutation { key: b"a".to_vec(), op: MutOp::Put, value: b"v1".to_vec() }];
        store.prewrite(&mutations, b"a", 10, 1000, &region, &req)[0].as_ref().unwrap();
        store.rollback(&[b"a".to_vec()], 10, &region, &req).unwrap();

        let mutations2 = vec![Mutation { key: b"a".to_vec(), op: MutOp::Put, value: b"v2".to_vec() }];
        store.prewrite(&mutations2, b"a", 30, 1000, &region, &req)[0].as_ref().unwrap();

        let result = store.commit(&[b"a".to_vec()], 10, 40, &region, &req);
        assert!(matches!(result, Err(Error::Replaced { .. })));
    }
}
