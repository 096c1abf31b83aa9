//! Append-only data log.
//!
//! File layout:
//!   [ magic "SSLOG" | format version (1) | generation u64 LE ]
//!   frame*
//!
//! Frame layout:
//!   [ kind (1) | body_len u32 LE | body | blake3(kind || body_len || body)[..16] ]
//!
//! Frames are never rewritten in place. A frame becomes live only when the
//! manifest points at it.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::codec::{ByteReader, ByteWriter, CodecError};
use crate::origin::Origin;

pub const LOG_MAGIC: &[u8; 5] = b"SSLOG";
pub const LOG_FORMAT_VERSION: u8 = 1;
pub const LOG_HEADER_LEN: u64 = 5 + 1 + 8;

const CHECKSUM_LEN: usize = 16;
const FRAME_PREFIX_LEN: usize = 1 + 4;
pub const FRAME_OVERHEAD: usize = FRAME_PREFIX_LEN + CHECKSUM_LEN;

const KIND_PUT: u8 = 1;
const KIND_TOMBSTONE: u8 = 2;

pub fn log_file_name(generation: u64) -> String {
    format!("data-{generation}.log")
}

pub fn log_path(dir: &Path, generation: u64) -> PathBuf {
    dir.join(log_file_name(generation))
}

/// Generation encoded in a data log file name, if it is one.
pub fn parse_log_file_name(name: &str) -> Option<u64> {
    name.strip_prefix("data-")?
        .strip_suffix(".log")?
        .parse()
        .ok()
}

#[derive(Debug, Clone, PartialEq)]
pub struct PutEntry {
    pub origin: Origin,
    pub name: String,
    pub version: u32,
    pub sensitive: bool,
    pub updated_at: DateTime<Utc>,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TombstoneEntry {
    pub origin: Origin,
    pub name: String,
    pub version: u32,
    pub deleted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogEntry {
    Put(PutEntry),
    Tombstone(TombstoneEntry),
}

impl LogEntry {
    pub fn origin(&self) -> &Origin {
        match self {
            LogEntry::Put(p) => &p.origin,
            LogEntry::Tombstone(t) => &t.origin,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            LogEntry::Put(p) => &p.name,
            LogEntry::Tombstone(t) => &t.name,
        }
    }

    pub fn encode_frame(&self) -> Result<Vec<u8>, CodecError> {
        let mut body = ByteWriter::with_capacity(64);
        let kind = match self {
            LogEntry::Put(p) => {
                body.put_str(&p.origin.to_string())?;
                body.put_str(&p.name)?;
                body.put_u32(p.version);
                body.put_u8(u8::from(p.sensitive));
                body.put_timestamp(&p.updated_at);
                body.put_len_prefixed(&p.payload)?;
                KIND_PUT
            }
            LogEntry::Tombstone(t) => {
                body.put_str(&t.origin.to_string())?;
                body.put_str(&t.name)?;
                body.put_u32(t.version);
                body.put_timestamp(&t.deleted_at);
                KIND_TOMBSTONE
            }
        };
        let body = body.into_inner();

        let mut frame = ByteWriter::with_capacity(FRAME_OVERHEAD + body.len());
        frame.put_u8(kind);
        frame.put_u32(body.len() as u32);
        frame.put_raw(&body);
        let mut frame = frame.into_inner();
        let checksum = frame_checksum(&frame);
        frame.extend_from_slice(&checksum);
        Ok(frame)
    }

    /// Verify and decode one complete frame.
    pub fn decode_frame(frame: &[u8]) -> Result<Self, CodecError> {
        if frame.len() < FRAME_OVERHEAD {
            return Err(CodecError::Truncated {
                needed: FRAME_OVERHEAD,
                remaining: frame.len(),
            });
        }
        let (covered, checksum) = frame.split_at(frame.len() - CHECKSUM_LEN);
        if frame_checksum(covered) != checksum {
            return Err(CodecError::ChecksumMismatch);
        }

        let mut r = ByteReader::new(covered);
        let kind = r.u8()?;
        let body_len = r.u32()? as usize;
        if body_len != r.remaining() {
            return Err(CodecError::LengthMismatch(format!(
                "frame body declares {body_len} bytes, holds {}",
                r.remaining()
            )));
        }
        let origin = parse_origin(&r.string()?)?;
        let name = r.string()?;
        let entry = match kind {
            KIND_PUT => LogEntry::Put(PutEntry {
                origin,
                name,
                version: r.u32()?,
                sensitive: r.bool()?,
                updated_at: r.timestamp()?,
                payload: r.len_prefixed()?.to_vec(),
            }),
            KIND_TOMBSTONE => LogEntry::Tombstone(TombstoneEntry {
                origin,
                name,
                version: r.u32()?,
                deleted_at: r.timestamp()?,
            }),
            other => return Err(CodecError::UnknownTag(other)),
        };
        r.finish()?;
        Ok(entry)
    }
}

fn parse_origin(raw: &str) -> Result<Origin, CodecError> {
    Origin::parse(raw).map_err(|e| CodecError::Malformed(e.to_string()))
}

fn frame_checksum(covered: &[u8]) -> [u8; CHECKSUM_LEN] {
    let digest = blake3::hash(covered);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest.as_bytes()[..CHECKSUM_LEN]);
    out
}

fn encode_header(generation: u64) -> Vec<u8> {
    let mut w = ByteWriter::with_capacity(LOG_HEADER_LEN as usize);
    w.put_raw(LOG_MAGIC);
    w.put_u8(LOG_FORMAT_VERSION);
    w.put_u64(generation);
    w.into_inner()
}

/// Read and validate the header; returns the generation.
pub fn read_header(file: &mut File) -> io::Result<u64> {
    let mut buf = [0u8; LOG_HEADER_LEN as usize];
    file.read_exact(&mut buf)?;
    let invalid = |msg: &str| io::Error::new(io::ErrorKind::InvalidData, msg.to_string());
    if &buf[..LOG_MAGIC.len()] != LOG_MAGIC {
        return Err(invalid("data log magic mismatch"));
    }
    if buf[5] != LOG_FORMAT_VERSION {
        return Err(invalid("unsupported data log format version"));
    }
    let mut generation = [0u8; 8];
    generation.copy_from_slice(&buf[6..14]);
    Ok(u64::from_le_bytes(generation))
}

/// Positional read of `len` bytes at `offset`; safe to call from many threads.
pub fn read_at(file: &File, offset: u64, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileExt;
        file.read_exact_at(&mut buf, offset)?;
    }
    #[cfg(windows)]
    {
        use std::os::windows::fs::FileExt;
        let mut done = 0;
        while done < buf.len() {
            let n = file.seek_read(&mut buf[done..], offset + done as u64)?;
            if n == 0 {
                return Err(io::ErrorKind::UnexpectedEof.into());
            }
            done += n;
        }
    }
    Ok(buf)
}

/// Append handle for the current generation.
#[derive(Debug)]
pub struct LogWriter {
    file: File,
    path: PathBuf,
    generation: u64,
    len: u64,
}

impl LogWriter {
    /// Create a new, empty log. Fails if the file exists.
    pub fn create(path: &Path, generation: u64) -> io::Result<Self> {
        let mut file = OpenOptions::new()
            .create_new(true)
            .append(true)
            .open(path)?;
        file.write_all(&encode_header(generation))?;
        file.sync_all()?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            generation,
            len: LOG_HEADER_LEN,
        })
    }

    pub fn open(path: &Path) -> io::Result<Self> {
        let mut file = OpenOptions::new().read(true).append(true).open(path)?;
        let generation = read_header(&mut file)?;
        let len = file.metadata()?.len();
        Ok(Self {
            file,
            path: path.to_path_buf(),
            generation,
            len,
        })
    }

    /// Append frames in one write; returns `(offset, len)` per frame.
    pub fn append(&mut self, frames: &[Vec<u8>]) -> io::Result<Vec<(u64, u32)>> {
        let total: usize = frames.iter().map(Vec::len).sum();
        let mut buf = Vec::with_capacity(total);
        let mut locations = Vec::with_capacity(frames.len());
        let mut offset = self.len;
        for frame in frames {
            locations.push((offset, frame.len() as u32));
            offset += frame.len() as u64;
            buf.extend_from_slice(frame);
        }
        if let Err(e) = self.file.write_all(&buf).and_then(|_| self.file.flush()) {
            // A short write leaves an unreferenced tail; track the real end.
            self.len = self.file.metadata().map(|m| m.len()).unwrap_or(self.len);
            return Err(e);
        }
        self.len = offset;
        Ok(locations)
    }

    pub fn sync(&mut self) -> io::Result<()> {
        self.file.sync_data()
    }

    /// Cut the log back to `len` bytes, dropping anything appended past it.
    pub fn truncate(&mut self, len: u64) -> io::Result<()> {
        // An append-only handle may not be allowed to shrink the file.
        let file = OpenOptions::new().write(true).open(&self.path)?;
        file.set_len(len)?;
        file.sync_all()?;
        self.len = len;
        Ok(())
    }

    /// Sync a finished log and rename it to `dest`. The handle stays usable.
    pub fn publish(&mut self, dest: &Path) -> io::Result<()> {
        self.file.sync_all()?;
        fs::rename(&self.path, dest)?;
        self.path = dest.to_path_buf();
        Ok(())
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// One frame recovered by [`scan`].
#[derive(Debug)]
pub struct ScannedFrame {
    pub offset: u64,
    pub len: u32,
    pub entry: LogEntry,
}

#[derive(Debug)]
pub struct ScanResult {
    pub generation: u64,
    pub frames: Vec<ScannedFrame>,
    /// End of the last intact frame.
    pub valid_end: u64,
    /// Bytes that belong to no intact frame (damaged regions and torn tail).
    pub discarded: u64,
}

/// Sequentially read a log, keeping every intact frame.
///
/// A damaged or torn region is stepped over one byte at a time until the next
/// offset where a whole frame verifies, so frames written after it still count.
pub fn scan(path: &Path) -> io::Result<ScanResult> {
    let mut file = File::open(path)?;
    let generation = read_header(&mut file)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;

    let mut frames = Vec::new();
    let mut pos = 0usize;
    let mut valid_end = 0usize;
    let mut intact = 0usize;
    while data.len() - pos >= FRAME_OVERHEAD {
        let body_len = u32::from_le_bytes([
            data[pos + 1],
            data[pos + 2],
            data[pos + 3],
            data[pos + 4],
        ]) as usize;
        let frame_len = FRAME_OVERHEAD.saturating_add(body_len);
        let entry = if data.len() - pos >= frame_len {
            LogEntry::decode_frame(&data[pos..pos + frame_len]).ok()
        } else {
            None
        };
        match entry {
            Some(entry) => {
                frames.push(ScannedFrame {
                    offset: LOG_HEADER_LEN + pos as u64,
                    len: frame_len as u32,
                    entry,
                });
                pos += frame_len;
                valid_end = pos;
                intact += frame_len;
            }
            None => pos += 1,
        }
    }
    Ok(ScanResult {
        generation,
        frames,
        valid_end: LOG_HEADER_LEN + valid_end as u64,
        discarded: (data.len() - intact) as u64,
    })
}

/// Data log files in `dir`, as `(generation, path)`, oldest first.
pub fn list_logs(dir: &Path) -> io::Result<Vec<(u64, PathBuf)>> {
    let mut logs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if let Some(generation) = parse_log_file_name(&name.to_string_lossy()) {
            logs.push((generation, entry.path()));
        }
    }
    logs.sort_by_key(|(generation, _)| *generation);
    Ok(logs)
}
