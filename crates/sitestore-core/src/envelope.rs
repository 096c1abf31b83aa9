//! Crypto envelope for sensitive record payloads.
//!
//! ChaCha20-Poly1305 (RFC 8439). Key: 32 bytes, supplied by the host.
//! Nonce: 12 bytes, drawn from the OS RNG on every seal. Tag: 16 bytes.
//!
//! Envelope byte form:
//!   [ version (1) | nonce (12) | ciphertext | tag (16) ]
//!
//! The associated data binds an envelope to the record it was written for,
//! so ciphertext moved to another `(origin, name)` fails to open.

use std::fmt;

use chacha20poly1305::{
    aead::{AeadInPlace, KeyInit, OsRng},
    ChaCha20Poly1305, Key, Nonce, Tag,
};
use rand::RngCore;
use zeroize::{ZeroizeOnDrop, Zeroizing};

use crate::codec::{ByteReader, ByteWriter, CodecError};
use crate::error::StoreError;
use crate::origin::Origin;

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
pub const ENVELOPE_VERSION: u8 = 1;

const AAD_DOMAIN: &[u8] = b"sitestore-record-v1\x00";

/// 32-byte store key. Zeroized on drop; never printed.
#[derive(Clone, ZeroizeOnDrop)]
pub struct StoreKey([u8; KEY_LEN]);

impl StoreKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        let key: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            StoreError::InvalidKey(format!("expected {KEY_LEN} bytes, got {}", bytes.len()))
        })?;
        Ok(Self(key))
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, StoreError> {
        let bytes = Zeroizing::new(
            hex::decode(hex_str.trim()).map_err(|e| StoreError::InvalidKey(e.to_string()))?,
        );
        Self::from_bytes(&bytes)
    }

    /// Fresh random key, for hosts provisioning a new store.
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self(key)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(&self.0))
    }
}

impl fmt::Debug for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StoreKey(<redacted>)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_LEN],
}

impl Envelope {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(1 + NONCE_LEN + self.ciphertext.len() + TAG_LEN);
        w.put_u8(ENVELOPE_VERSION);
        w.put_raw(&self.nonce);
        w.put_raw(&self.ciphertext);
        w.put_raw(&self.tag);
        w.into_inner()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let min = 1 + NONCE_LEN + TAG_LEN;
        if bytes.len() < min {
            return Err(CodecError::Truncated {
                needed: min,
                remaining: bytes.len(),
            });
        }
        let mut r = ByteReader::new(bytes);
        let version = r.u8()?;
        if version != ENVELOPE_VERSION {
            return Err(CodecError::UnsupportedSchema(version));
        }
        let nonce = r.array::<NONCE_LEN>()?;
        let ciphertext = r.take(r.remaining() - TAG_LEN)?.to_vec();
        let tag = r.array::<TAG_LEN>()?;
        r.finish()?;
        Ok(Self {
            nonce,
            ciphertext,
            tag,
        })
    }
}

/// Associated data for the record `(origin, name)`.
pub fn record_aad(origin: &Origin, name: &str) -> Vec<u8> {
    let origin = origin.to_string();
    let mut aad = Vec::with_capacity(AAD_DOMAIN.len() + 8 + origin.len() + name.len());
    aad.extend_from_slice(AAD_DOMAIN);
    aad.extend_from_slice(&(origin.len() as u32).to_le_bytes());
    aad.extend_from_slice(origin.as_bytes());
    aad.extend_from_slice(&(name.len() as u32).to_le_bytes());
    aad.extend_from_slice(name.as_bytes());
    aad
}

/// Encrypt `plaintext` under `key` with a fresh random nonce.
pub fn seal(plaintext: &[u8], key: &StoreKey, aad: &[u8]) -> Result<Envelope, StoreError> {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    let mut ciphertext = plaintext.to_vec();
    let tag = key
        .cipher()
        .encrypt_in_place_detached(Nonce::from_slice(&nonce), aad, &mut ciphertext)
        .map_err(|_| StoreError::InvalidValue("payload too large to seal".into()))?;
    let mut envelope = Envelope {
        nonce,
        ciphertext,
        tag: [0u8; TAG_LEN],
    };
    envelope.tag.copy_from_slice(&tag);
    Ok(envelope)
}

/// Verify and decrypt. Any tag mismatch is `AuthenticationFailed`.
pub fn open(
    envelope: &Envelope,
    key: &StoreKey,
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>, StoreError> {
    let mut buffer = Zeroizing::new(envelope.ciphertext.clone());
    key.cipher()
        .decrypt_in_place_detached(
            Nonce::from_slice(&envelope.nonce),
            aad,
            buffer.as_mut_slice(),
            Tag::from_slice(&envelope.tag),
        )
        .map_err(|_| StoreError::AuthenticationFailed)?;
    Ok(buffer)
}
