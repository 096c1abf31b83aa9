use std::path::PathBuf;

use thiserror::Error;

use crate::codec::CodecError;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Decode error: {0}")]
    Decode(#[from] CodecError),

    #[error("Authentication failed: envelope tag mismatch (tampered data or wrong key)")]
    AuthenticationFailed,

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store at {} is locked by another handle", .0.display())]
    Locked(PathBuf),

    #[error("Store is closed")]
    Closed,

    #[error("Store is corrupt: {0}")]
    Corrupt(String),

    #[error("Invalid origin: {0}")]
    InvalidOrigin(String),

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Record {origin} {name} exists with a different sensitivity; delete it first")]
    SensitivityMismatch { origin: String, name: String },

    #[error("Options error: {0}")]
    Options(String),
}

impl StoreError {
    /// Per-record failures that leave the rest of the store usable.
    pub fn is_record_level(&self) -> bool {
        matches!(self, StoreError::Decode(_) | StoreError::AuthenticationFailed)
    }
}
