use std::path::Path;

use crate::error::CResult;
use crate::lock::LockTable;
use crate::storage::log::Log;

/// On startup, replays the lock-log into the in-memory lock table; on
/// shutdown, rewrites the log from memory.
///
/// The lock-log reuses the append-only `Log` format (`storage::log`): each
/// entry is `(data_key, lock_record_bytes)`, with a tombstone meaning the
/// lock at that key was deleted. `Log::build_keydir` already collapses a
/// stream of inserts/tombstones down to "what's live right now", which is
/// exactly the replay semantics recovery needs.
pub fn load_locks(path: &Path, locks: &LockTable) -> CResult<Log> {
    let mut log = Log::new(path.to_path_buf())?;
    let keydir = log.build_keydir()?;
    for (key, (pos, len)) in keydir {
        let value = log.read_value(pos, len)?;
        locks.insert_raw(key, value);
    }
    Ok(log)
}

/// Rewrites the lock-log from the current in-memory lock table, the
/// mirror operation of `load_locks`. Called after the write pipelines have
/// drained, so the in-memory table is quiescent.
pub fn dump_mem_locks(log: &mut Log, locks: &LockTable) -> CResult<()> {
    log.truncate()?;
    for (key, value) in locks.iter() {
        log.write_entry(&key, Some(&value))?;
    }
    Ok(())
}
