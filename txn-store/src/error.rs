use std::fmt;

use crate::codec::Op;

/// Result alias used throughout the crate.
pub type CResult<T> = std::result::Result<T, Error>;

/// Errors surfaced by the MVCC core to its callers.
///
/// `Locked`, `AlreadyRollback`, `Retryable`, `Replaced`, `LockNotFound` and
/// `AlreadyCommitted` are the protocol-level outcomes described by the
/// transaction model; `Io` and `Engine` wrap the underlying storage layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A concurrent writer holds a lock that blocks this read or prewrite.
    Locked { key: Vec<u8>, primary: Vec<u8>, start_ts: u64, ttl: u32 },

    /// A rollback marker already exists at `(key, start_ts)`.
    AlreadyRollback { key: Vec<u8>, start_ts: u64 },

    /// A write conflict was detected; the caller should retry with a new start_ts.
    Retryable(String),

    /// The lock found at `key` does not match the commit's start_ts.
    Replaced { key: Vec<u8>, start_ts: u64 },

    /// Commit arrived without a prior lock and no committed evidence was found.
    LockNotFound { key: Vec<u8>, start_ts: u64 },

    /// Rollback attempted on a transaction that was already committed.
    AlreadyCommitted { key: Vec<u8>, commit_ts: u64 },

    /// The lock record at `key` carries an unexpected op byte.
    InvalidLockOp { key: Vec<u8>, op: u8 },

    /// Lower-layer storage engine failure, other than not-found.
    Engine(String),

    /// Lock-log I/O failure (fatal on startup/shutdown per the recovery contract).
    Io(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Locked { key, primary, start_ts, ttl } => write!(
                f,
                "key {:?} locked by primary {:?} at start_ts {} (ttl {})",
                key, primary, start_ts, ttl
            ),
            Error::AlreadyRollback { key, start_ts } => {
                write!(f, "key {:?} already rolled back at start_ts {}", key, start_ts)
            }
            Error::Retryable(msg) => write!(f, "write conflict, retry: {}", msg),
            Error::Replaced { key, start_ts } => {
                write!(f, "lock at key {:?} was replaced, start_ts {} no longer holds it", key, start_ts)
            }
            Error::LockNotFound { key, start_ts } => {
                write!(f, "no lock and no committed evidence for key {:?} at start_ts {}", key, start_ts)
            }
            Error::AlreadyCommitted { key, commit_ts } => {
                write!(f, "key {:?} already committed at commit_ts {}", key, commit_ts)
            }
            Error::InvalidLockOp { key, op } => {
                write!(f, "key {:?} has invalid lock op byte {}", key, op)
            }
            Error::Engine(msg) => write!(f, "storage engine error: {}", msg),
            Error::Io(msg) => write!(f, "lock-log I/O error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl Error {
    pub(crate) fn invalid_op(key: &[u8], op: u8) -> Self {
        Error::InvalidLockOp { key: key.to_vec(), op }
    }
}

/// Helper shared by commands that need to name the mutation's op in an error.
pub(crate) fn unexpected_op(key: &[u8], op: Op) -> Error {
    Error::invalid_op(key, op as u8)
}
