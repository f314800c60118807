use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, Sender};

use crate::rollback_table::RollbackTable;

/// Background worker that periodically scans the rollback table and drops
/// markers old enough that no in-flight transaction can still reference
/// them. Runs on its own thread and never concurrently with another writer
/// to the rollback table, since `RollbackTable::gc_before` is the only
/// caller that removes entries outside of `MvccStore::rollback`.
pub struct RollbackGcWorker {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl RollbackGcWorker {
    pub fn spawn(
        rollbacks: Arc<RollbackTable>,
        latest_ts: Arc<AtomicU64>,
        interval: Duration,
        safe_margin: u64,
    ) -> Self {
        let (stop_tx, stop_rx) = bounded(1);
        let handle = std::thread::spawn(move || {
            let ticker = tick(interval);
            loop {
                select! {
                    recv(stop_rx) -> _ => break,
                    recv(ticker) -> _ => {
                        let watermark = latest_ts.load(Ordering::SeqCst).saturating_sub(safe_margin);
                        let removed = rollbacks.gc_before(watermark);
                        if removed > 0 {
                            log::debug!("rollback gc removed {removed} markers below watermark {watermark}");
                        }
                    }
                }
            }
        });
        RollbackGcWorker { stop_tx, handle: Some(handle) }
    }

    pub fn shutdown(mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
