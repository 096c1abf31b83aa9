//! Value codec: compact, deterministic binary encoding for stored values.
//!
//! Layout:
//!   [ schema_version: u8 | tag: u8 | body ]
//!
//! Integers and float bits are little-endian. Strings and byte strings are
//! `u32 LE length || data`. Timestamps are `i64` Unix milliseconds, so a
//! value always encodes to the same bytes.
//!
//! `ByteWriter` / `ByteReader` are the primitives shared with the on-disk
//! log and manifest formats.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Schema versions this build can read and write.
pub const SCHEMA_V1: u8 = 1;
pub const CURRENT_SCHEMA: u8 = SCHEMA_V1;
const SUPPORTED_SCHEMAS: &[u8] = &[SCHEMA_V1];

/// Upper bound for a single length-prefixed field (16 MiB).
pub const MAX_FIELD_LEN: usize = 16 * 1024 * 1024;

const TAG_BOOL: u8 = 0x01;
const TAG_INT: u8 = 0x02;
const TAG_FLOAT: u8 = 0x03;
const TAG_TEXT: u8 = 0x04;
const TAG_BYTES: u8 = 0x05;
const TAG_ZOOM: u8 = 0x10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("truncated buffer: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },
    #[error("length mismatch: {0}")]
    LengthMismatch(String),
    #[error("unsupported schema version {0}")]
    UnsupportedSchema(u8),
    #[error("unknown value tag 0x{0:02x}")]
    UnknownTag(u8),
    #[error("invalid UTF-8 in string field")]
    InvalidUtf8,
    #[error("timestamp out of range: {0}")]
    InvalidTimestamp(i64),
    #[error("field of {0} bytes exceeds the 16 MiB limit")]
    TooLarge(usize),
    #[error("checksum mismatch")]
    ChecksumMismatch,
    #[error("malformed data: {0}")]
    Malformed(String),
}

/// Zoom level remembered for a site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoomLevel {
    pub scale: f64,
    pub updated_at: DateTime<Utc>,
}

impl ZoomLevel {
    pub fn new(scale: f64) -> Self {
        Self {
            scale,
            updated_at: now_millis(),
        }
    }
}

/// A typed value as stored in a record payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Zoom(ZoomLevel),
}

/// Encode `value` under `schema_version`.
pub fn encode(value: &Value, schema_version: u8) -> Result<Vec<u8>, CodecError> {
    if !SUPPORTED_SCHEMAS.contains(&schema_version) {
        return Err(CodecError::UnsupportedSchema(schema_version));
    }
    let mut w = ByteWriter::with_capacity(16);
    w.put_u8(schema_version);
    match value {
        Value::Bool(b) => {
            w.put_u8(TAG_BOOL);
            w.put_u8(u8::from(*b));
        }
        Value::Int(i) => {
            w.put_u8(TAG_INT);
            w.put_i64(*i);
        }
        Value::Float(f) => {
            w.put_u8(TAG_FLOAT);
            w.put_f64(*f);
        }
        Value::Text(s) => {
            w.put_u8(TAG_TEXT);
            w.put_len_prefixed(s.as_bytes())?;
        }
        Value::Bytes(b) => {
            w.put_u8(TAG_BYTES);
            w.put_len_prefixed(b)?;
        }
        Value::Zoom(z) => {
            w.put_u8(TAG_ZOOM);
            w.put_f64(z.scale);
            w.put_timestamp(&z.updated_at);
        }
    }
    Ok(w.into_inner())
}

/// Decode bytes produced by [`encode`]; returns the value and its schema version.
pub fn decode(bytes: &[u8]) -> Result<(Value, u8), CodecError> {
    let mut r = ByteReader::new(bytes);
    let schema = r.u8()?;
    if !SUPPORTED_SCHEMAS.contains(&schema) {
        return Err(CodecError::UnsupportedSchema(schema));
    }
    let tag = r.u8()?;
    let value = match tag {
        TAG_BOOL => match r.u8()? {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            other => {
                return Err(CodecError::LengthMismatch(format!(
                    "bool byte must be 0 or 1, got {other}"
                )))
            }
        },
        TAG_INT => Value::Int(r.i64()?),
        TAG_FLOAT => Value::Float(r.f64()?),
        TAG_TEXT => Value::Text(r.string()?),
        TAG_BYTES => Value::Bytes(r.len_prefixed()?.to_vec()),
        TAG_ZOOM => Value::Zoom(ZoomLevel {
            scale: r.f64()?,
            updated_at: r.timestamp()?,
        }),
        other => return Err(CodecError::UnknownTag(other)),
    };
    r.finish()?;
    Ok((value, schema))
}

/// Current time truncated to millisecond precision (the stored resolution).
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

// ── Byte primitives ─────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_bits().to_le_bytes());
    }

    pub fn put_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn put_len_prefixed(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        if bytes.len() > MAX_FIELD_LEN {
            return Err(CodecError::TooLarge(bytes.len()));
        }
        self.put_u32(bytes.len() as u32);
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    pub fn put_str(&mut self, s: &str) -> Result<(), CodecError> {
        self.put_len_prefixed(s.as_bytes())
    }

    pub fn put_timestamp(&mut self, ts: &DateTime<Utc>) {
        self.put_i64(ts.timestamp_millis());
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

#[derive(Debug)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::Truncated {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn u64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    pub fn i64(&mut self) -> Result<i64, CodecError> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    pub fn f64(&mut self) -> Result<f64, CodecError> {
        Ok(f64::from_bits(u64::from_le_bytes(self.array()?)))
    }

    pub fn bool(&mut self) -> Result<bool, CodecError> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::LengthMismatch(format!(
                "flag byte must be 0 or 1, got {other}"
            ))),
        }
    }

    pub fn len_prefixed(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.u32()? as usize;
        if len > MAX_FIELD_LEN {
            return Err(CodecError::LengthMismatch(format!(
                "length prefix {len} exceeds field limit"
            )));
        }
        self.take(len)
    }

    pub fn string(&mut self) -> Result<String, CodecError> {
        let raw = self.len_prefixed()?;
        String::from_utf8(raw.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }

    pub fn timestamp(&mut self) -> Result<DateTime<Utc>, CodecError> {
        let millis = self.i64()?;
        DateTime::from_timestamp_millis(millis).ok_or(CodecError::InvalidTimestamp(millis))
    }

    /// Fails unless every byte has been consumed.
    pub fn finish(&self) -> Result<(), CodecError> {
        if self.remaining() != 0 {
            return Err(CodecError::LengthMismatch(format!(
                "{} trailing bytes",
                self.remaining()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_values() -> Vec<Value> {
        vec![
            Value::Bool(true),
            Value::Bool(false),
            Value::Int(-42),
            Value::Int(i64::MAX),
            Value::Float(1.25),
            Value::Text("dark mode".into()),
            Value::Text(String::new()),
            Value::Bytes(vec![0, 1, 2, 255]),
            Value::Zoom(ZoomLevel::new(1.5)),
        ]
    }

    #[test]
    fn roundtrip_all_value_types() {
        for value in sample_values() {
            let bytes = encode(&value, CURRENT_SCHEMA).unwrap();
            let (decoded, schema) = decode(&bytes).unwrap();
            assert_eq!(decoded, value);
            assert_eq!(schema, CURRENT_SCHEMA);
        }
    }

    #[test]
    fn encoding_is_deterministic() {
        let ts = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        let zoom = Value::Zoom(ZoomLevel {
            scale: 1.5,
            updated_at: ts,
        });
        let a = encode(&zoom, SCHEMA_V1).unwrap();
        let b = encode(&zoom.clone(), SCHEMA_V1).unwrap();
        assert_eq!(a, b);
        let mut expected = vec![SCHEMA_V1, TAG_ZOOM];
        expected.extend_from_slice(&1.5f64.to_bits().to_le_bytes());
        expected.extend_from_slice(&1_700_000_000_123i64.to_le_bytes());
        assert_eq!(a, expected);
    }

    #[test]
    fn unknown_schema_rejected_both_ways() {
        assert_eq!(
            encode(&Value::Int(1), 9),
            Err(CodecError::UnsupportedSchema(9))
        );
        let mut bytes = encode(&Value::Int(1), CURRENT_SCHEMA).unwrap();
        bytes[0] = 7;
        assert_eq!(decode(&bytes), Err(CodecError::UnsupportedSchema(7)));
    }

    #[test]
    fn truncated_buffer_rejected() {
        let bytes = encode(&Value::Text("hello".into()), CURRENT_SCHEMA).unwrap();
        for cut in 0..bytes.len() {
            let err = decode(&bytes[..cut]).unwrap_err();
            assert!(
                matches!(err, CodecError::Truncated { .. }),
                "cut at {cut}: {err:?}"
            );
        }
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut bytes = encode(&Value::Int(7), CURRENT_SCHEMA).unwrap();
        bytes.push(0);
        assert!(matches!(decode(&bytes), Err(CodecError::LengthMismatch(_))));
    }

    #[test]
    fn unknown_tag_rejected() {
        assert_eq!(
            decode(&[CURRENT_SCHEMA, 0x7f]),
            Err(CodecError::UnknownTag(0x7f))
        );
    }

    #[test]
    fn oversized_length_prefix_rejected() {
        let mut bytes = vec![CURRENT_SCHEMA, TAG_BYTES];
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(decode(&bytes), Err(CodecError::LengthMismatch(_))));
    }
}
