//! sitestore-core: crash-safe, origin-scoped state for a browser host
//!
//! # Storage
//! Each record is keyed by `(origin, name)` and lives as a checksummed frame in
//! an append-only data log. A small manifest lists the live frames; replacing
//! it atomically is the commit point of every write, so a crash leaves either
//! the old state or the new one.
//!
//! # Encryption
//! Sensitive records (site credentials) are sealed with ChaCha20-Poly1305
//! under a caller-supplied 256-bit key. The envelope's associated data binds
//! it to its origin and name. Zoom levels and preferences are stored in the
//! clear.
//!
//! # Module layout
//! - `codec`     versioned binary encoding of typed values
//! - `envelope`  AEAD seal/open and the store key
//! - `origin`    origin parsing and normalization
//! - `index`     in-memory origin -> names index
//! - `store`     data log, manifest, locking, compaction
//! - `facade`    `SiteStore`, the host-facing API
//! - `options`   tunables loadable from JSON
//! - `paths`     default on-disk locations
//! - `error`     unified error type

pub mod codec;
pub mod envelope;
pub mod error;
pub mod facade;
pub mod index;
pub mod options;
pub mod origin;
pub mod paths;
pub mod store;

pub use codec::{Value, ZoomLevel};
pub use envelope::StoreKey;
pub use error::{Result, StoreError};
pub use facade::SiteStore;
pub use options::{CompactionPolicy, StoreOptions};
pub use origin::{AsOrigin, Origin};
pub use store::{CompactionReport, OpenReport, SkippedRecord, StoreStats, VerifyReport};
