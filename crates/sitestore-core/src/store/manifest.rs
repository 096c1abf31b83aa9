//! The manifest: the committed view of the store.
//!
//! Layout:
//!   [ magic "SSMAN" | version (1) | body | blake3(magic || version || body) (32) ]
//!
//! Body:
//!   generation u64 | committed_len u64 | entry_count u32 | entry*
//!   entry = origin str | name str | offset u64 | frame_len u32 | version u32
//!           | sensitive u8 | updated_at i64 millis
//!
//! Replacing this file is the single commit point for every mutation.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};

use super::fsutil::write_atomic;
use super::log::LOG_HEADER_LEN;
use crate::codec::{ByteReader, ByteWriter, CodecError};
use crate::error::{Result, StoreError};
use crate::origin::Origin;

pub const MANIFEST_FILE: &str = "MANIFEST";
const MANIFEST_MAGIC: &[u8; 5] = b"SSMAN";
const MANIFEST_VERSION: u8 = 1;
const CHECKSUM_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub origin: Origin,
    pub name: String,
}

impl RecordKey {
    pub fn new(origin: &Origin, name: &str) -> Self {
        Self {
            origin: origin.clone(),
            name: name.to_string(),
        }
    }
}

/// Where a live record's current frame sits in the data log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub offset: u64,
    pub frame_len: u32,
    pub version: u32,
    pub sensitive: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub generation: u64,
    /// Log length covered by this manifest; anything past it is uncommitted.
    pub committed_len: u64,
    pub entries: HashMap<RecordKey, Slot>,
}

impl Manifest {
    pub fn empty(generation: u64) -> Self {
        Self {
            generation,
            committed_len: LOG_HEADER_LEN,
            entries: HashMap::new(),
        }
    }

    /// Header plus every live frame.
    pub fn live_bytes(&self) -> u64 {
        LOG_HEADER_LEN
            + self
                .entries
                .values()
                .map(|slot| u64::from(slot.frame_len))
                .sum::<u64>()
    }

    pub fn encode(&self) -> std::result::Result<Vec<u8>, CodecError> {
        let mut keys: Vec<&RecordKey> = self.entries.keys().collect();
        keys.sort();

        let mut w = ByteWriter::with_capacity(64 + keys.len() * 64);
        w.put_raw(MANIFEST_MAGIC);
        w.put_u8(MANIFEST_VERSION);
        w.put_u64(self.generation);
        w.put_u64(self.committed_len);
        w.put_u32(keys.len() as u32);
        for key in keys {
            let slot = &self.entries[key];
            w.put_str(&key.origin.to_string())?;
            w.put_str(&key.name)?;
            w.put_u64(slot.offset);
            w.put_u32(slot.frame_len);
            w.put_u32(slot.version);
            w.put_u8(u8::from(slot.sensitive));
            w.put_timestamp(&slot.updated_at);
        }
        let mut out = w.into_inner();
        let checksum = blake3::hash(&out);
        out.extend_from_slice(checksum.as_bytes());
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let corrupt = |msg: String| StoreError::Corrupt(format!("manifest: {msg}"));
        if bytes.len() < MANIFEST_MAGIC.len() + 1 + CHECKSUM_LEN {
            return Err(corrupt("file too short".into()));
        }
        let (covered, checksum) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
        if blake3::hash(covered).as_bytes() != checksum {
            return Err(corrupt("checksum mismatch".into()));
        }

        let parse = || -> std::result::Result<Self, CodecError> {
            let mut r = ByteReader::new(covered);
            if &r.array::<5>()? != MANIFEST_MAGIC {
                return Err(CodecError::Malformed("bad magic".into()));
            }
            let version = r.u8()?;
            if version != MANIFEST_VERSION {
                return Err(CodecError::UnsupportedSchema(version));
            }
            let generation = r.u64()?;
            let committed_len = r.u64()?;
            let count = r.u32()? as usize;
            let mut entries = HashMap::with_capacity(count.min(1 << 16));
            for _ in 0..count {
                let origin = Origin::parse(&r.string()?)
                    .map_err(|e| CodecError::Malformed(e.to_string()))?;
                let name = r.string()?;
                let slot = Slot {
                    offset: r.u64()?,
                    frame_len: r.u32()?,
                    version: r.u32()?,
                    sensitive: r.bool()?,
                    updated_at: r.timestamp()?,
                };
                entries.insert(RecordKey { origin, name }, slot);
            }
            r.finish()?;
            Ok(Self {
                generation,
                committed_len,
                entries,
            })
        };
        parse().map_err(|e| corrupt(e.to_string()))
    }

    /// `Ok(None)` when no manifest has been committed yet.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        match fs::read(dir.join(MANIFEST_FILE)) {
            Ok(bytes) => Self::decode(&bytes).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Atomically replace the on-disk manifest with this one.
    pub fn commit(&self, dir: &Path) -> Result<()> {
        let bytes = self.encode()?;
        write_atomic(dir, MANIFEST_FILE, &bytes)?;
        Ok(())
    }
}
