//! The transactional MVCC core: lock table, rollback table, versioned
//! value store, and the 2PC protocol operations described by the store's
//! request model, wired together by `MvccStore`.

pub mod check_lock;
pub mod commit;
pub mod delete_range;
pub mod prewrite;
pub mod resolve_lock;
pub mod rollback;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::codec::{encode_data_key, encode_old_key, Op, ValueRecord};
use crate::config::StoreConfig;
use crate::error::CResult;
use crate::gc::RollbackGcWorker;
use crate::lock::LockTable;
use crate::pipeline::Pipeline;
use crate::recovery;
use crate::rollback_table::RollbackTable;
use crate::storage::engine::Engine;
use crate::storage::log::Log;

/// One key's requested mutation within a Prewrite call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    pub key: Vec<u8>,
    pub op: Op,
    pub value: Vec<u8>,
}

/// Lock metadata surfaced by `ScanLock` and the `Locked` error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockInfo {
    pub key: Vec<u8>,
    pub primary: Vec<u8>,
    pub start_ts: u64,
    pub ttl: u32,
}

pub(crate) enum LockWriteOp {
    PutLock(Vec<u8>, Vec<u8>),
    DeleteLock(Vec<u8>),
    PutRollback(Vec<u8>, u64),
}

pub(crate) type LockBatch = Vec<LockWriteOp>;

pub(crate) enum DataWriteOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

pub(crate) type DataBatch = Vec<DataWriteOp>;

/// A transactional MVCC engine over an `Engine` backing store.
///
/// Owns the lock table, rollback table, the two durable write pipelines,
/// the rollback-GC worker, and (if configured) the persisted lock-log.
pub struct MvccStore<E: Engine> {
    engine: Arc<Mutex<E>>,
    locks: Arc<LockTable>,
    rollbacks: Arc<RollbackTable>,
    latest_ts: Arc<AtomicU64>,
    lock_pipeline: Pipeline<LockBatch>,
    data_pipeline: Pipeline<DataBatch>,
    gc_worker: RollbackGcWorker,
    lock_log: Arc<Mutex<Option<Log>>>,
    config: StoreConfig,
}

impl<E: Engine> MvccStore<E> {
    /// Builds a store over `engine`, replaying the lock-log (if configured)
    /// before accepting requests.
    pub fn new(engine: E, config: StoreConfig) -> CResult<Self> {
        let locks = Arc::new(LockTable::new());
        let rollbacks = Arc::new(RollbackTable::new());
        let latest_ts = Arc::new(AtomicU64::new(0));

        let lock_log = match &config.lock_log_path {
            Some(path) => Some(recovery::load_locks(path, &locks)?),
            None => None,
        };
        let lock_log = Arc::new(Mutex::new(lock_log));

        let lock_pipeline = {
            let locks = locks.clone();
            let rollbacks = rollbacks.clone();
            let lock_log = lock_log.clone();
            Pipeline::spawn(move |batch: LockBatch| -> CResult<()> {
                let mut log_guard = lock_log.lock().unwrap();
                for op in &batch {
                    match op {
                        LockWriteOp::PutLock(key, bytes) => {
                            locks.insert_raw(key.clone(), bytes.clone());
                            if let Some(log) = log_guard.as_mut() {
                                log.write_entry(key, Some(bytes))?;
                            }
                        }
                        LockWriteOp::DeleteLock(key) => {
                            locks.remove(key);
                            if let Some(log) = log_guard.as_mut() {
                                log.write_entry(key, None)?;
                            }
                        }
                        LockWriteOp::PutRollback(key, start_ts) => {
                            // Rollback markers are not persisted: they are
                            // recreated lazily by later operations and are
                            // safe to lose on a crash.
                            rollbacks.insert(key, *start_ts);
                        }
                    }
                }
                if let Some(log) = log_guard.as_ref() {
                    log.sync()?;
                }
                Ok(())
            })
        };

        let engine = Arc::new(Mutex::new(engine));
        let data_pipeline = {
            let engine = engine.clone();
            Pipeline::spawn(move |batch: DataBatch| -> CResult<()> {
                let mut eng = engine.lock().unwrap();
                for op in &batch {
                    match op {
                        DataWriteOp::Put(key, value) => eng.set(key, value.clone())?,
                        DataWriteOp::Delete(key) => {
                            eng.delete(key)?;
                        }
                    }
                }
                eng.flush()
            })
        };

        let gc_worker = RollbackGcWorker::spawn(
            rollbacks.clone(),
            latest_ts.clone(),
            Duration::from_millis(config.gc_interval_ms),
            config.rollback_gc_safe_margin,
        );

        Ok(MvccStore { engine, locks, rollbacks, latest_ts, lock_pipeline, data_pipeline, gc_worker, lock_log, config })
    }

    /// Stops the background workers and, if a lock-log is configured,
    /// rewrites it from the final in-memory lock table.
    pub fn shutdown(self) -> CResult<()> {
        self.gc_worker.shutdown();
        self.lock_pipeline.shutdown();
        self.data_pipeline.shutdown();

        let mut log_guard = self.lock_log.lock().unwrap();
        if let Some(log) = log_guard.as_mut() {
            recovery::dump_mem_locks(log, &self.locks)?;
        }
        Ok(())
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn lock_table(&self) -> &LockTable {
        &self.locks
    }

    pub fn rollback_table(&self) -> &RollbackTable {
        &self.rollbacks
    }

    /// Monotonic CAS-max watermark; the `u64::MAX` primary-probe sentinel
    /// used by `CheckKeysLock` is never folded in.
    pub(crate) fn update_latest_ts(&self, ts: u64) {
        if ts == u64::MAX {
            return;
        }
        self.latest_ts.fetch_max(ts, Ordering::SeqCst);
    }

    pub fn latest_ts(&self) -> u64 {
        self.latest_ts.load(Ordering::SeqCst)
    }

    /// `key` must already be in the engine's own key space (see
    /// `codec::encode_data_key`/`encode_old_key`) — this is a thin
    /// passthrough, not a user-key lookup.
    pub(crate) fn engine_get(&self, key: &[u8]) -> CResult<Option<Vec<u8>>> {
        self.engine.lock().unwrap().get(key)
    }

    /// Old versions of `key`, in descending `commit_ts` order.
    pub(crate) fn old_versions(&self, key: &[u8]) -> CResult<Vec<(Vec<u8>, ValueRecord)>> {
        let start = encode_old_key(key, u64::MAX);
        let end = encode_old_key(key, 0);
        let mut engine = self.engine.lock().unwrap();
        engine
            .scan(start..=end)
            .map(|item| {
                let (k, v) = item?;
                let value = ValueRecord::decode(&v)?;
                Ok((k, value))
            })
            .collect()
    }

    /// A snapshot read at `start_ts`: checks for a blocking lock first, then
    /// reads the latest visible version (the current data key if its
    /// `commit_ts` qualifies, else the newest qualifying old version). Not
    /// one of the five core operations; exists purely so the store is
    /// exercisable end-to-end without a separate read path.
    pub fn get(&self, key: &[u8], start_ts: u64, req: &crate::request::RequestCtx) -> CResult<Option<Vec<u8>>> {
        use crate::request::TraceEvent;

        req.trace(TraceEvent::ReadLock);
        if let Some(lock) = self.locks.get(key)? {
            self.check_lock(key, &lock, start_ts)?;
        }

        req.trace(TraceEvent::ReadDB);
        if let Some(bytes) = self.engine_get(&encode_data_key(key))? {
            let value = ValueRecord::decode(&bytes)?;
            if value.commit_ts <= start_ts {
                return Ok(Some(value.value));
            }
        }

        for (old_key, value) in self.old_versions(key)? {
            if crate::codec::is_visible_key(&old_key, start_ts)? {
                return Ok(Some(value.value));
            }
        }
        Ok(None)
    }
}
