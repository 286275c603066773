//! Atomically commit a small, versioned payload.
//!
//! # Format
//!
//! The payload is written to either a "left" or a "right" blob:
//!
//! ```text
//! +---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+
//! | 0 | 1 |    ...    | 7 | 8 |    ...    |   |   |   |   |   |
//! +---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+
//! |    Version (u64)      |    Payload    |    CRC32 (u32)    |
//! +---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+
//! ```
//!
//! _The CRC32 covers the version and the payload, so partial writes are detected before any data
//! is relied on._
//!
//! # Atomic Updates
//!
//! A commit always overwrites the blob holding the older version and syncs it before the newer
//! blob is ever touched again. After a crash, at least one blob holds a complete version and the
//! newest valid one wins on [Metadata::init].

use crate::Error;
use geoseis_runtime::{Blob, Storage};
use tracing::debug;

const BLOB_NAMES: [&[u8]; 2] = [b"left", b"right"];

/// Bytes of framing around the payload.
const FRAME: usize = 8 + 4;

struct Side<B: Blob> {
    blob: B,
    version: u64,
}

/// Two-blob store for a single payload.
pub struct Metadata<B: Blob> {
    sides: [Side<B>; 2],
    cursor: usize,
    payload: Option<Vec<u8>>,
}

impl<B: Blob> Metadata<B> {
    /// Verify a blob, returning its version and payload if it is intact.
    fn verify(blob: &B, len: u64) -> Result<Option<(u64, Vec<u8>)>, Error> {
        if len == 0 {
            return Ok(None);
        }
        let len: usize = len
            .try_into()
            .map_err(|_| Error::Corrupt(format!("metadata blob of {len} bytes")))?;
        if len < FRAME {
            debug!(len, "metadata blob too short: ignoring");
            return Ok(None);
        }
        let mut buf = vec![0u8; len];
        blob.read_at(&mut buf, 0)?;

        let (body, checksum) = buf.split_at(len - 4);
        let stored = u32::from_be_bytes([checksum[0], checksum[1], checksum[2], checksum[3]]);
        let computed = crc32fast::hash(body);
        if stored != computed {
            debug!(stored, computed, "checksum mismatch: ignoring");
            return Ok(None);
        }
        let mut version = [0u8; 8];
        version.copy_from_slice(&body[..8]);
        Ok(Some((u64::from_be_bytes(version), body[8..].to_vec())))
    }

    /// Open (or create) the metadata blobs in `partition`.
    pub fn init<S: Storage<Blob = B>>(storage: &S, partition: &str) -> Result<Self, Error> {
        let (left, left_len) = storage.open(partition, BLOB_NAMES[0])?;
        let (right, right_len) = storage.open(partition, BLOB_NAMES[1])?;
        let left_result = Self::verify(&left, left_len)?;
        let right_result = Self::verify(&right, right_len)?;

        let mut sides = [
            Side {
                blob: left,
                version: 0,
            },
            Side {
                blob: right,
                version: 0,
            },
        ];
        let (cursor, payload) = match (left_result, right_result) {
            (Some((lv, lp)), Some((rv, rp))) => {
                sides[0].version = lv;
                sides[1].version = rv;
                if rv > lv {
                    (1, Some(rp))
                } else {
                    (0, Some(lp))
                }
            }
            (Some((lv, lp)), None) => {
                sides[0].version = lv;
                (0, Some(lp))
            }
            (None, Some((rv, rp))) => {
                sides[1].version = rv;
                (1, Some(rp))
            }
            (None, None) => (1, None),
        };
        debug!(partition, cursor, found = payload.is_some(), "loaded metadata");
        Ok(Self {
            sides,
            cursor,
            payload,
        })
    }

    /// The latest committed payload, if any.
    pub fn get(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    /// Version of the latest committed payload (zero before the first commit).
    pub fn version(&self) -> u64 {
        self.sides[self.cursor].version
    }

    /// Durably commit `payload`, replacing the previous one.
    pub fn put(&mut self, payload: Vec<u8>) -> Result<(), Error> {
        let version = self.version() + 1;
        let target = 1 - self.cursor;

        let mut buf = Vec::with_capacity(payload.len() + FRAME);
        buf.extend_from_slice(&version.to_be_bytes());
        buf.extend_from_slice(&payload);
        let checksum = crc32fast::hash(&buf);
        buf.extend_from_slice(&checksum.to_be_bytes());

        let side = &mut self.sides[target];
        side.blob.write_at(&buf, 0)?;
        side.blob.resize(buf.len() as u64)?;
        side.blob.sync()?;
        side.version = version;
        self.cursor = target;
        self.payload = Some(payload);
        debug!(version, len = buf.len(), "committed metadata");
        Ok(())
    }
}
