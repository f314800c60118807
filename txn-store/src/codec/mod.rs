//! Key and record encodings for the MVCC core.
//!
//! All multi-byte integers are big-endian, matching the rest of the crate's
//! on-disk formats (see `storage::log`). User keys are opaque bytes, but the
//! engine's flat keyspace holds three different kinds of key side by side
//! (latest-version, old-version, and — in a separate map — rollback
//! markers), so a raw user key is never written as-is: it first goes
//! through `encode_bytes`, a memcomparable, prefix-free, order-preserving
//! encoding. Without that, a longer key sharing a shorter key's bytes as a
//! prefix (`"ab"` vs `"abc"`) could fall inside the shorter key's
//! old-version scan range.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read};

use crate::error::{CResult, Error};

/// The mutation kind carried by a lock record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Put = 0,
    Delete = 1,
    Lock = 2,
}

impl Op {
    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            0 => Some(Op::Put),
            1 => Some(Op::Delete),
            2 => Some(Op::Lock),
            _ => None,
        }
    }
}

/// Group width for `encode_bytes`'s memcomparable encoding.
const ENC_GROUP_SIZE: usize = 8;
/// Marker byte for a full (unpadded) group.
const ENC_MARKER: u8 = 0xFF;

/// Encodes `data` as a sequence of `ENC_GROUP_SIZE`-byte groups, each
/// followed by a marker byte: `0xFF` for a full group, `0xFF - pad` for the
/// final, possibly-padded one. Always emits at least one group, so an exact
/// multiple of the group size (including the empty key) still ends in a
/// trailing all-padding group — that's what keeps the encoding prefix-free:
/// without it, an 8-byte key's encoding would be a literal byte-prefix of
/// a 9-byte key sharing its first 8 bytes. Preserves the original
/// lexicographic order of `data`.
fn encode_bytes(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity((data.len() / ENC_GROUP_SIZE + 1) * (ENC_GROUP_SIZE + 1));
    let mut rest = data;
    loop {
        if rest.len() >= ENC_GROUP_SIZE {
            out.extend_from_slice(&rest[..ENC_GROUP_SIZE]);
            out.push(ENC_MARKER);
            rest = &rest[ENC_GROUP_SIZE..];
        } else {
            let pad = ENC_GROUP_SIZE - rest.len();
            out.extend_from_slice(rest);
            out.extend(std::iter::repeat(0u8).take(pad));
            out.push(ENC_MARKER - pad as u8);
            return out;
        }
    }
}

/// Inverse of `encode_bytes`.
fn decode_bytes(encoded: &[u8]) -> CResult<Vec<u8>> {
    let mut out = Vec::with_capacity(encoded.len());
    let mut rest = encoded;
    loop {
        if rest.len() < ENC_GROUP_SIZE + 1 {
            return Err(Error::Engine(format!("truncated memcomparable group in {:?}", encoded)));
        }
        let (group, tail) = rest.split_at(ENC_GROUP_SIZE);
        let marker = tail[0];
        rest = &tail[1..];
        if marker == ENC_MARKER {
            out.extend_from_slice(group);
            continue;
        }
        let pad = (ENC_MARKER - marker) as usize;
        if pad == 0 || pad > ENC_GROUP_SIZE {
            return Err(Error::Engine(format!("invalid memcomparable marker in {:?}", encoded)));
        }
        out.extend_from_slice(&group[..ENC_GROUP_SIZE - pad]);
        if !rest.is_empty() {
            return Err(Error::Engine(format!("trailing bytes after memcomparable key in {:?}", encoded)));
        }
        return Ok(out);
    }
}

/// Returns the memcomparable encoding of `key`, the data key holding the
/// latest committed version.
pub fn encode_data_key(key: &[u8]) -> Vec<u8> {
    encode_bytes(key)
}

/// Recovers the raw key from an `encode_data_key` (or, once its timestamp
/// suffix is stripped via `decode_suffixed_key`, an `encode_old_key` /
/// `encode_rollback_key`) result.
pub fn decode_data_key(encoded: &[u8]) -> CResult<Vec<u8>> {
    decode_bytes(encoded)
}

/// Returns `encode_bytes(key) || ^be64(commit_ts)`, the old-version key.
///
/// Larger `commit_ts` sorts earlier, so forward iteration from
/// `encode_old_key(key, u64::MAX)` yields versions in descending commit-ts
/// order.
pub fn encode_old_key(key: &[u8], commit_ts: u64) -> Vec<u8> {
    encode_suffixed(key, commit_ts)
}

/// Returns `encode_bytes(key) || ^be64(start_ts)`, the rollback-table key.
pub fn encode_rollback_key(key: &[u8], start_ts: u64) -> Vec<u8> {
    encode_suffixed(key, start_ts)
}

fn encode_suffixed(key: &[u8], ts: u64) -> Vec<u8> {
    let mut buf = encode_bytes(key);
    buf.write_u64::<BigEndian>(!ts).expect("write to Vec never fails");
    buf
}

/// Splits an old-version or rollback key back into `(encoded_user_key, ts)`.
/// The first element is still memcomparable-encoded; pass it to
/// `decode_data_key` to recover the raw key.
pub fn decode_suffixed_key(encoded: &[u8]) -> CResult<(&[u8], u64)> {
    if encoded.len() < 8 {
        return Err(Error::Engine(format!("key {:?} too short to carry a timestamp suffix", encoded)));
    }
    let split = encoded.len() - 8;
    let (user_key, suffix) = encoded.split_at(split);
    let mut cursor = Cursor::new(suffix);
    let not_ts = cursor.read_u64::<BigEndian>().map_err(|e| Error::Engine(e.to_string()))?;
    Ok((user_key, !not_ts))
}

/// `true` iff a version written at `commit_ts` (as recovered from an
/// old-version key) is visible to a read running at `start_ts`.
pub fn is_visible_key(old_key: &[u8], start_ts: u64) -> CResult<bool> {
    let (_, commit_ts) = decode_suffixed_key(old_key)?;
    Ok(start_ts >= commit_ts)
}

/// A committed value record: `start_ts | commit_ts | payload`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueRecord {
    pub start_ts: u64,
    pub commit_ts: u64,
    pub value: Vec<u8>,
}

impl ValueRecord {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(16 + self.value.len());
        buf.write_u64::<BigEndian>(self.start_ts).unwrap();
        buf.write_u64::<BigEndian>(self.commit_ts).unwrap();
        buf.extend_from_slice(&self.value);
        buf
    }

    pub fn decode(bytes: &[u8]) -> CResult<Self> {
        let mut cursor = Cursor::new(bytes);
        let start_ts = cursor
            .read_u64::<BigEndian>()
            .map_err(|e| crate::error::Error::Engine(e.to_string()))?;
        let commit_ts = cursor
            .read_u64::<BigEndian>()
            .map_err(|e| crate::error::Error::Engine(e.to_string()))?;
        let mut value = Vec::new();
        cursor.read_to_end(&mut value).map_err(|e| crate::error::Error::Engine(e.to_string()))?;
        Ok(ValueRecord { start_ts, commit_ts, value })
    }

    /// Builds the value record that `Commit` writes for a mutation.
    pub fn from_lock(lock: &LockRecord, commit_ts: u64) -> Self {
        ValueRecord { start_ts: lock.start_ts, commit_ts, value: lock.value.clone() }
    }
}

/// A pending lock, stored at the data key while a transaction is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRecord {
    pub start_ts: u64,
    pub op: Op,
    pub has_old_ver: bool,
    pub ttl: u32,
    pub primary: Vec<u8>,
    pub value: Vec<u8>,
}

impl LockRecord {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(15 + self.primary.len() + self.value.len());
        buf.write_u64::<BigEndian>(self.start_ts).unwrap();
        buf.write_u8(self.op as u8).unwrap();
        buf.write_u8(self.has_old_ver as u8).unwrap();
        buf.write_u32::<BigEndian>(self.ttl).unwrap();
        buf.write_u16::<BigEndian>(self.primary.len() as u16).unwrap();
        buf.extend_from_slice(&self.primary);
        buf.extend_from_slice(&self.value);
        buf
    }

    pub fn decode(key: &[u8], bytes: &[u8]) -> CResult<Self> {
        let mut cursor = Cursor::new(bytes);
        let eng = |e: std::io::Error| crate::error::Error::Engine(e.to_string());
        let start_ts = cursor.read_u64::<BigEndian>().map_err(eng)?;
        let op_byte = cursor.read_u8().map_err(eng)?;
        let op = Op::from_u8(op_byte).ok_or_else(|| crate::error::Error::invalid_op(key, op_byte))?;
        let has_old_ver = cursor.read_u8().map_err(eng)? != 0;
        let ttl = cursor.read_u32::<BigEndian>().map_err(eng)?;
        let primary_len = cursor.read_u16::<BigEndian>().map_err(eng)? as usize;
        let mut primary = vec![0u8; primary_len];
        cursor.read_exact(&mut primary).map_err(eng)?;
        let mut value = Vec::new();
        cursor.read_to_end(&mut value).map_err(eng)?;
        Ok(LockRecord { start_ts, op, has_old_ver, ttl, primary, value })
    }
}
