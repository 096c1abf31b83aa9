//! `SiteStore`: the narrow API hosts program against.
//!
//! Records are namespaced per origin:
//!
//! | name            | payload                                  | sensitive |
//! |-----------------|------------------------------------------|-----------|
//! | `zoom`          | codec-encoded [`Value::Zoom`]            | no        |
//! | `pref/<name>`   | codec-encoded [`Value`]                  | no        |
//! | `secret/<name>` | sealed [`Envelope`] bytes                | yes       |

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::codec::{self, CodecError, Value, ZoomLevel, CURRENT_SCHEMA};
use crate::envelope::{self, record_aad, Envelope, StoreKey};
use crate::error::{Result, StoreError};
use crate::options::StoreOptions;
use crate::origin::{AsOrigin, Origin};
use crate::store::{CompactionReport, OpenReport, RecordStore, StoreStats, VerifyReport};

pub const DEFAULT_ZOOM: f64 = 1.0;
pub const ZOOM_RECORD: &str = "zoom";
pub const PREF_PREFIX: &str = "pref/";
pub const SECRET_PREFIX: &str = "secret/";
pub const MAX_NAME_LEN: usize = 1024;

struct Inner {
    records: RecordStore,
    key: StoreKey,
}

/// Handle to an open store. Cheap to share across threads behind an `Arc`.
pub struct SiteStore {
    path: PathBuf,
    open_report: OpenReport,
    inner: RwLock<Option<Inner>>,
}

impl std::fmt::Debug for SiteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteStore")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .finish()
    }
}

impl SiteStore {
    pub fn open(path: impl AsRef<Path>, key: StoreKey) -> Result<Self> {
        Self::open_with(path, key, StoreOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, key: StoreKey, options: StoreOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let (records, open_report) = RecordStore::open(&path, options)?;
        Ok(Self {
            path,
            open_report,
            inner: RwLock::new(Some(Inner { records, key })),
        })
    }

    /// Flush and release the store. Waits for in-flight operations.
    pub fn close(&self) -> Result<()> {
        let inner = self.inner.write().take().ok_or(StoreError::Closed)?;
        inner.records.close()
    }

    pub fn is_open(&self) -> bool {
        self.inner.read().is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// What recovery, if any, happened when this handle was opened.
    pub fn open_report(&self) -> &OpenReport {
        &self.open_report
    }

    // ── Zoom ────────────────────────────────────────────────────────────────

    /// The remembered zoom for `origin`, or 1.0.
    pub fn get_zoom_level<O: AsOrigin + ?Sized>(&self, origin: &O) -> Result<f64> {
        Ok(self
            .get_zoom(origin)?
            .map_or(DEFAULT_ZOOM, |zoom| zoom.scale))
    }

    pub fn get_zoom<O: AsOrigin + ?Sized>(&self, origin: &O) -> Result<Option<ZoomLevel>> {
        let origin = origin.to_origin()?;
        self.with_inner(|inner| {
            let Some(record) = inner.records.get(&origin, ZOOM_RECORD)? else {
                return Ok(None);
            };
            match codec::decode(&record.payload)? {
                (Value::Zoom(zoom), _) => Ok(Some(zoom)),
                _ => Err(CodecError::Malformed(format!("{origin} zoom record holds another type")).into()),
            }
        })
    }

    pub fn set_zoom_level<O: AsOrigin + ?Sized>(&self, origin: &O, scale: f64) -> Result<()> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(StoreError::InvalidValue(format!(
                "zoom level must be finite and positive, got {scale}"
            )));
        }
        let origin = origin.to_origin()?;
        let payload = codec::encode(&Value::Zoom(ZoomLevel::new(scale)), CURRENT_SCHEMA)?;
        self.with_inner(|inner| {
            inner.records.put(&origin, ZOOM_RECORD, &payload, false)?;
            debug!(%origin, scale, "zoom level saved");
            Ok(())
        })
    }

    // ── Secrets ─────────────────────────────────────────────────────────────

    pub fn get_secret<O: AsOrigin + ?Sized>(
        &self,
        origin: &O,
        name: &str,
    ) -> Result<Option<Zeroizing<Vec<u8>>>> {
        let origin = origin.to_origin()?;
        let record_name = namespaced(SECRET_PREFIX, name)?;
        self.with_inner(|inner| {
            let Some(record) = inner.records.get(&origin, &record_name)? else {
                return Ok(None);
            };
            let sealed = Envelope::from_bytes(&record.payload)?;
            let aad = record_aad(&origin, &record_name);
            envelope::open(&sealed, &inner.key, &aad).map(Some)
        })
    }

    pub fn set_secret<O: AsOrigin + ?Sized>(&self, origin: &O, name: &str, secret: &[u8]) -> Result<()> {
        let origin = origin.to_origin()?;
        let record_name = namespaced(SECRET_PREFIX, name)?;
        let aad = record_aad(&origin, &record_name);
        self.with_inner(|inner| {
            let sealed = envelope::seal(secret, &inner.key, &aad)?;
            inner
                .records
                .put(&origin, &record_name, &sealed.to_bytes(), true)?;
            debug!(%origin, name, "secret saved");
            Ok(())
        })
    }

    pub fn remove_secret<O: AsOrigin + ?Sized>(&self, origin: &O, name: &str) -> Result<bool> {
        let origin = origin.to_origin()?;
        let record_name = namespaced(SECRET_PREFIX, name)?;
        self.with_inner(|inner| inner.records.delete(&origin, &record_name))
    }

    // ── Preferences ─────────────────────────────────────────────────────────

    pub fn get_preference<O: AsOrigin + ?Sized>(&self, origin: &O, name: &str) -> Result<Option<Value>> {
        let origin = origin.to_origin()?;
        let record_name = namespaced(PREF_PREFIX, name)?;
        self.with_inner(|inner| {
            let Some(record) = inner.records.get(&origin, &record_name)? else {
                return Ok(None);
            };
            let (value, _) = codec::decode(&record.payload)?;
            Ok(Some(value))
        })
    }

    pub fn set_preference<O: AsOrigin + ?Sized>(&self, origin: &O, name: &str, value: &Value) -> Result<()> {
        let origin = origin.to_origin()?;
        let record_name = namespaced(PREF_PREFIX, name)?;
        let payload = codec::encode(value, CURRENT_SCHEMA)?;
        self.with_inner(|inner| {
            inner.records.put(&origin, &record_name, &payload, false)?;
            Ok(())
        })
    }

    pub fn remove_preference<O: AsOrigin + ?Sized>(&self, origin: &O, name: &str) -> Result<bool> {
        let origin = origin.to_origin()?;
        let record_name = namespaced(PREF_PREFIX, name)?;
        self.with_inner(|inner| inner.records.delete(&origin, &record_name))
    }

    // ── Scoped removal ──────────────────────────────────────────────────────

    /// Forget everything stored for `origin`. Other origins are untouched.
    pub fn clear_for_origin<O: AsOrigin + ?Sized>(&self, origin: &O) -> Result<usize> {
        let origin = origin.to_origin()?;
        self.with_inner(|inner| inner.records.clear_for_origin(&origin))
    }

    pub fn clear_all(&self) -> Result<usize> {
        self.with_inner(|inner| {
            let removed = inner.records.clear_all()?;
            info!(removed, "all site data cleared");
            Ok(removed)
        })
    }

    // ── Housekeeping ────────────────────────────────────────────────────────

    pub fn origins(&self) -> Result<Vec<Origin>> {
        self.with_inner(|inner| Ok(inner.records.origins()))
    }

    /// Record names stored under `origin`, namespaces included, sorted.
    pub fn names_for<O: AsOrigin + ?Sized>(&self, origin: &O) -> Result<Vec<String>> {
        let origin = origin.to_origin()?;
        self.with_inner(|inner| Ok(inner.records.names_for(&origin)))
    }

    pub fn compact(&self) -> Result<CompactionReport> {
        self.with_inner(|inner| inner.records.compact())
    }

    pub fn stats(&self) -> Result<StoreStats> {
        self.with_inner(|inner| inner.records.stats())
    }

    pub fn verify(&self) -> Result<VerifyReport> {
        self.with_inner(|inner| inner.records.verify())
    }

    fn with_inner<T>(&self, f: impl FnOnce(&Inner) -> Result<T>) -> Result<T> {
        let guard = self.inner.read();
        let inner = guard.as_ref().ok_or(StoreError::Closed)?;
        f(inner)
    }
}

fn namespaced(prefix: &str, name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(StoreError::InvalidValue("record name must not be empty".into()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(StoreError::InvalidValue(format!(
            "record name is {} bytes, limit is {MAX_NAME_LEN}",
            name.len()
        )));
    }
    Ok(format!("{prefix}{name}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn handle_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SiteStore>();
    }

    #[test]
    fn names_are_validated() {
        assert_eq!(namespaced(SECRET_PREFIX, "login").unwrap(), "secret/login");
        assert!(matches!(
            namespaced(PREF_PREFIX, ""),
            Err(StoreError::InvalidValue(_))
        ));
        assert!(namespaced(PREF_PREFIX, &"x".repeat(MAX_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn zoom_record_of_wrong_type_is_decode_error() {
        let dir = tempdir().unwrap();
        let store = SiteStore::open(dir.path(), StoreKey::generate()).unwrap();
        let origin = Origin::parse("https://a.example").unwrap();
        let payload = codec::encode(&Value::Int(3), CURRENT_SCHEMA).unwrap();
        store
            .with_inner(|inner| inner.records.put(&origin, ZOOM_RECORD, &payload, false))
            .unwrap();
        assert!(matches!(
            store.get_zoom_level(&origin),
            Err(StoreError::Decode(_))
        ));
    }

    #[test]
    fn secret_envelope_is_bound_to_its_record() {
        let dir = tempdir().unwrap();
        let store = SiteStore::open(dir.path(), StoreKey::generate()).unwrap();
        let a = Origin::parse("https://a.example").unwrap();
        store.set_secret(&a, "one", b"hunter2").unwrap();

        // Move the sealed bytes under another name; the AAD no longer matches.
        let sealed = store
            .with_inner(|inner| inner.records.get(&a, "secret/one"))
            .unwrap()
            .unwrap()
            .payload;
        store
            .with_inner(|inner| inner.records.put(&a, "secret/two", &sealed, true))
            .unwrap();
        assert!(matches!(
            store.get_secret(&a, "two"),
            Err(StoreError::AuthenticationFailed)
        ));
        assert_eq!(store.get_secret(&a, "one").unwrap().unwrap().as_slice(), b"hunter2");
    }
}
