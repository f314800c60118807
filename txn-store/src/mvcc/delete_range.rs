use std::ops::Bound;

use crate::codec::{decode_data_key, decode_suffixed_key, encode_data_key, encode_old_key};
use crate::error::CResult;
use crate::region::RegionCtx;
use crate::storage::engine::Engine;

use super::{DataBatch, DataWriteOp, MvccStore};

/// Caps a single data-write batch so `DeleteRange` over a huge range
/// doesn't hold a batch's worth of keys in memory or block the pipeline
/// for too long in one shot.
const BATCH_SIZE: usize = 4096;

impl<E: Engine> MvccStore<E> {
    /// Deletes every latest-version and old-version entry in
    /// `[start_key, end_key)`. Proceeds in batches of up to `BATCH_SIZE`
    /// keys, each under its own latch acquisition — not atomic across
    /// batches, so a reader racing a `DeleteRange` can observe a range
    /// that is partway deleted.
    pub fn delete_range(&self, start_key: &[u8], end_key: &[u8], region: &RegionCtx) -> CResult<()> {
        let data_start = encode_data_key(start_key);
        let data_end = if end_key.is_empty() { Vec::new() } else { encode_data_key(end_key) };
        self.delete_keys_in(&data_start, &data_end, region, decode_data_key)?;

        let old_start = encode_old_key(start_key, u64::MAX);
        let old_end = encode_old_key(end_key, u64::MAX);
        self.delete_keys_in(&old_start, &old_end, region, |engine_key| {
            let (encoded, _) = decode_suffixed_key(engine_key)?;
            decode_data_key(encoded)
        })?;
        Ok(())
    }

    /// `start`/`end` are already-encoded engine-key bounds. `decode_latch_key`
    /// recovers the raw user key from a scanned engine key, so this latches
    /// on the same key space `Prewrite`/`Commit`/`Rollback` do.
    fn delete_keys_in(
        &self,
        start: &[u8],
        end: &[u8],
        region: &RegionCtx,
        decode_latch_key: impl Fn(&[u8]) -> CResult<Vec<u8>>,
    ) -> CResult<()> {
        loop {
            let keys = self.collect_keys(start, end, BATCH_SIZE)?;
            if keys.is_empty() {
                return Ok(());
            }
            let exhausted = keys.len() < BATCH_SIZE;

            let latch_keys = keys.iter().map(|k| decode_latch_key(k)).collect::<CResult<Vec<_>>>()?;
            let _guard = region.acquire_latches(latch_keys.iter());
            let batch: DataBatch = keys.into_iter().map(DataWriteOp::Delete).collect();
            self.data_pipeline.submit(batch)?;

            if exhausted {
                return Ok(());
            }
        }
    }

    fn collect_keys(&self, start: &[u8], end: &[u8], limit: usize) -> CResult<Vec<Vec<u8>>> {
        let upper = if end.is_empty() { Bound::Unbounded } else { Bound::Excluded(end.to_vec()) };
        let mut engine = self.engine.lock().unwrap();
        engine
            .scan((Bound::Included(start.to_vec()), upper))
            .take(limit)
            .map(|item| item.map(|(key, _)| key))
            .collect()
    }
}
