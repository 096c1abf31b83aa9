//! Integration tests for the site store.
//!
//! Tests cover:
//!  1. Zoom levels: default, persistence, validation
//!  2. Secrets: round-trip, wrong key, per-record binding
//!  3. Scoped isolation and idempotent clears
//!  4. Crash between data append and manifest commit, rebuild afterwards
//!  5. Interrupted compaction leftovers
//!  6. Lifecycle: Closed after close, Locked on double open
//!  7. Concurrent readers during writes

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use sitestore_core::codec::now_millis;
use sitestore_core::store::log::{log_path, LogEntry, LogWriter, PutEntry};
use sitestore_core::{Origin, SiteStore, StoreError, StoreKey, StoreOptions, Value};
use tempfile::tempdir;

fn key() -> StoreKey {
    StoreKey::from_bytes(&[7u8; 32]).unwrap()
}

fn open(dir: &Path) -> SiteStore {
    SiteStore::open(dir, key()).unwrap()
}

fn rebuild_options() -> StoreOptions {
    StoreOptions {
        rebuild_from_log: true,
        ..StoreOptions::default()
    }
}

fn append_uncommitted(dir: &Path, generation: u64, entry: LogEntry) {
    let mut log = LogWriter::open(&log_path(dir, generation)).unwrap();
    log.append(&[entry.encode_frame().unwrap()]).unwrap();
    log.sync().unwrap();
}

// ─── Test 1: Zoom levels ────────────────────────────────────────────────────

#[test]
fn zoom_defaults_then_persists_across_reopen() {
    let dir = tempdir().unwrap();
    let store = open(dir.path());
    assert_eq!(store.get_zoom_level("https://news.example").unwrap(), 1.0);

    store.set_zoom_level("https://news.example", 1.25).unwrap();
    store.set_zoom_level("https://news.example", 1.5).unwrap();
    assert_eq!(store.get_zoom_level("https://news.example").unwrap(), 1.5);
    assert_eq!(store.get_zoom_level("https://other.example").unwrap(), 1.0);
    store.close().unwrap();

    let store = open(dir.path());
    assert_eq!(store.get_zoom_level("https://news.example").unwrap(), 1.5);
    assert_eq!(store.names_for("https://news.example").unwrap(), vec!["zoom"]);
}

#[test]
fn zoom_rejects_non_positive_and_non_finite() {
    let dir = tempdir().unwrap();
    let store = open(dir.path());
    for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
        assert!(matches!(
            store.set_zoom_level("https://a.example", bad),
            Err(StoreError::InvalidValue(_))
        ));
    }
    assert!(store.origins().unwrap().is_empty());
}

#[test]
fn origins_are_normalized() {
    let dir = tempdir().unwrap();
    let store = open(dir.path());
    store
        .set_zoom_level("HTTPS://News.Example:443/article?id=4", 2.0)
        .unwrap();
    assert_eq!(store.get_zoom_level("https://news.example").unwrap(), 2.0);
    let origin = Origin::parse("https://news.example").unwrap();
    assert_eq!(store.get_zoom_level(&origin).unwrap(), 2.0);
    assert_eq!(store.origins().unwrap(), vec![origin]);
    assert!(matches!(
        store.get_zoom_level("not an origin"),
        Err(StoreError::InvalidOrigin(_))
    ));
}

// ─── Test 2: Secrets ────────────────────────────────────────────────────────

#[test]
fn secret_roundtrip_and_wrong_key() {
    let dir = tempdir().unwrap();
    let store = open(dir.path());
    store
        .set_secret("https://bank.example", "login", b"alice:hunter2")
        .unwrap();
    assert_eq!(
        store
            .get_secret("https://bank.example", "login")
            .unwrap()
            .unwrap()
            .as_slice(),
        b"alice:hunter2"
    );
    assert!(store
        .get_secret("https://bank.example", "missing")
        .unwrap()
        .is_none());
    store.close().unwrap();

    let log = fs::read(log_path(dir.path(), 1)).unwrap();
    assert!(!log.windows(7).any(|w| w == b"hunter2"));

    let wrong = SiteStore::open(dir.path(), StoreKey::from_bytes(&[8u8; 32]).unwrap()).unwrap();
    assert!(matches!(
        wrong.get_secret("https://bank.example", "login"),
        Err(StoreError::AuthenticationFailed)
    ));
}

#[test]
fn secret_and_preference_namespaces_do_not_collide() {
    let dir = tempdir().unwrap();
    let store = open(dir.path());
    store.set_secret("https://a.example", "token", b"s3cret").unwrap();
    store
        .set_preference("https://a.example", "token", &Value::Text("visible".into()))
        .unwrap();
    assert_eq!(
        store.get_preference("https://a.example", "token").unwrap(),
        Some(Value::Text("visible".into()))
    );
    assert_eq!(
        store.get_secret("https://a.example", "token").unwrap().unwrap().as_slice(),
        b"s3cret"
    );
    assert!(store.remove_preference("https://a.example", "token").unwrap());
    assert!(!store.remove_preference("https://a.example", "token").unwrap());
    assert!(store.remove_secret("https://a.example", "token").unwrap());
    assert!(store.names_for("https://a.example").unwrap().is_empty());
}

// ─── Test 3: Scoped isolation ───────────────────────────────────────────────

#[test]
fn clear_for_origin_leaves_other_origins() {
    let dir = tempdir().unwrap();
    let store = open(dir.path());
    store.set_zoom_level("https://a.example", 1.1).unwrap();
    store.set_secret("https://a.example", "login", b"x").unwrap();
    store
        .set_preference("https://a.example", "js", &Value::Bool(false))
        .unwrap();
    store.set_zoom_level("https://b.example", 0.9).unwrap();

    assert_eq!(store.clear_for_origin("https://a.example").unwrap(), 3);
    assert_eq!(store.clear_for_origin("https://a.example").unwrap(), 0);
    assert_eq!(store.get_zoom_level("https://a.example").unwrap(), 1.0);
    assert!(store.get_secret("https://a.example", "login").unwrap().is_none());
    assert_eq!(store.get_zoom_level("https://b.example").unwrap(), 0.9);
    store.close().unwrap();

    let store = open(dir.path());
    assert!(store.names_for("https://a.example").unwrap().is_empty());
    assert_eq!(store.get_zoom_level("https://b.example").unwrap(), 0.9);
}

#[test]
fn clear_all_is_idempotent_and_durable() {
    let dir = tempdir().unwrap();
    let store = open(dir.path());
    store.set_zoom_level("https://a.example", 1.1).unwrap();
    store.set_secret("https://b.example", "pin", b"1234").unwrap();
    assert_eq!(store.clear_all().unwrap(), 2);
    assert_eq!(store.clear_all().unwrap(), 0);
    store.close().unwrap();

    let store = open(dir.path());
    assert!(store.origins().unwrap().is_empty());
    assert_eq!(store.stats().unwrap().live_records, 0);
}

// ─── Test 4: Crash between append and commit ────────────────────────────────

#[test]
fn uncommitted_frame_is_discarded_on_reopen() {
    let dir = tempdir().unwrap();
    let store = open(dir.path());
    store.set_zoom_level("https://a.example", 1.5).unwrap();
    store.set_secret("https://b.example", "login", b"pw").unwrap();
    store.close().unwrap();

    // The frame reaches the log but the manifest is never replaced.
    let payload = sitestore_core::codec::encode(
        &Value::Zoom(sitestore_core::ZoomLevel::new(3.0)),
        sitestore_core::codec::CURRENT_SCHEMA,
    )
    .unwrap();
    append_uncommitted(
        dir.path(),
        1,
        LogEntry::Put(PutEntry {
            origin: Origin::parse("https://a.example").unwrap(),
            name: "zoom".into(),
            version: 2,
            sensitive: false,
            updated_at: now_millis(),
            payload,
        }),
    );

    let store = open(dir.path());
    assert!(store.open_report().orphaned_bytes > 0);
    assert_eq!(store.get_zoom_level("https://a.example").unwrap(), 1.5);
    assert_eq!(
        store.get_secret("https://b.example", "login").unwrap().unwrap().as_slice(),
        b"pw"
    );
    assert!(store.verify().unwrap().is_clean());
}

#[test]
fn rebuild_after_torn_tail_keeps_later_writes() {
    let dir = tempdir().unwrap();
    let store = open(dir.path());
    store.set_zoom_level("https://a.example", 1.5).unwrap();
    store.close().unwrap();

    let mut log = fs::OpenOptions::new()
        .append(true)
        .open(log_path(dir.path(), 1))
        .unwrap();
    std::io::Write::write_all(&mut log, &[1, 200, 0, 0, 0, 9, 9]).unwrap();
    drop(log);

    let store = open(dir.path());
    assert_eq!(store.open_report().orphaned_bytes, 7);
    store.set_zoom_level("https://b.example", 2.0).unwrap();
    store.close().unwrap();
    fs::remove_file(dir.path().join("MANIFEST")).unwrap();

    let store = SiteStore::open_with(dir.path(), key(), rebuild_options()).unwrap();
    assert!(store.open_report().rebuilt);
    assert_eq!(store.get_zoom_level("https://a.example").unwrap(), 1.5);
    assert_eq!(store.get_zoom_level("https://b.example").unwrap(), 2.0);
}

#[test]
fn rebuild_does_not_revive_discarded_uncommitted_frame() {
    let dir = tempdir().unwrap();
    let store = open(dir.path());
    store.set_zoom_level("https://a.example", 1.5).unwrap();
    store.close().unwrap();

    let payload = sitestore_core::codec::encode(
        &Value::Zoom(sitestore_core::ZoomLevel::new(3.0)),
        sitestore_core::codec::CURRENT_SCHEMA,
    )
    .unwrap();
    append_uncommitted(
        dir.path(),
        1,
        LogEntry::Put(PutEntry {
            origin: Origin::parse("https://a.example").unwrap(),
            name: "zoom".into(),
            version: 2,
            sensitive: false,
            updated_at: now_millis(),
            payload,
        }),
    );

    let store = open(dir.path());
    store.set_zoom_level("https://b.example", 2.0).unwrap();
    store.close().unwrap();
    fs::remove_file(dir.path().join("MANIFEST")).unwrap();

    let store = SiteStore::open_with(dir.path(), key(), rebuild_options()).unwrap();
    assert_eq!(store.get_zoom_level("https://a.example").unwrap(), 1.5);
    assert_eq!(store.get_zoom_level("https://b.example").unwrap(), 2.0);
}

// ─── Test 5: Interrupted compaction ─────────────────────────────────────────

#[test]
fn leftovers_of_interrupted_compaction_are_ignored() {
    let dir = tempdir().unwrap();
    let store = open(dir.path());
    store.set_zoom_level("https://a.example", 1.2).unwrap();
    store.close().unwrap();

    let mut next = LogWriter::create(&log_path(dir.path(), 2), 2).unwrap();
    next.append(&[vec![0xAB; 40]]).unwrap();
    fs::write(dir.path().join("MANIFEST.0000.staging"), b"half written").unwrap();

    let store = open(dir.path());
    assert_eq!(store.get_zoom_level("https://a.example").unwrap(), 1.2);
    assert_eq!(store.stats().unwrap().generation, 1);
    assert!(!log_path(dir.path(), 2).exists());
    assert!(!dir.path().join("MANIFEST.0000.staging").exists());

    let report = store.compact().unwrap();
    assert_eq!(report.generation, 2);
    assert_eq!(store.get_zoom_level("https://a.example").unwrap(), 1.2);
}

#[test]
fn compaction_shrinks_log_and_keeps_records() {
    let dir = tempdir().unwrap();
    let mut options = StoreOptions::default();
    options.compaction.auto = false;
    let store = SiteStore::open_with(dir.path(), key(), options).unwrap();
    for i in 1..=100 {
        store
            .set_zoom_level("https://a.example", 1.0 + f64::from(i) / 100.0)
            .unwrap();
    }
    store.set_secret("https://a.example", "pw", b"kept").unwrap();

    let before = store.stats().unwrap();
    let report = store.compact().unwrap();
    let after = store.stats().unwrap();
    assert!(after.log_bytes < before.log_bytes);
    assert_eq!(after.dead_bytes, 0);
    assert_eq!(report.live_records, 2);
    assert_eq!(store.get_zoom_level("https://a.example").unwrap(), 2.0);
    assert_eq!(
        store.get_secret("https://a.example", "pw").unwrap().unwrap().as_slice(),
        b"kept"
    );
}

// ─── Test 6: Lifecycle ──────────────────────────────────────────────────────

#[test]
fn operations_after_close_fail_with_closed() {
    let dir = tempdir().unwrap();
    let store = open(dir.path());
    store.close().unwrap();
    assert!(!store.is_open());
    assert!(matches!(
        store.get_zoom_level("https://a.example"),
        Err(StoreError::Closed)
    ));
    assert!(matches!(
        store.set_secret("https://a.example", "x", b"y"),
        Err(StoreError::Closed)
    ));
    assert!(matches!(store.clear_all(), Err(StoreError::Closed)));
    assert!(matches!(store.close(), Err(StoreError::Closed)));
}

#[test]
fn second_open_is_locked_until_close() {
    let dir = tempdir().unwrap();
    let store = open(dir.path());
    assert!(matches!(
        SiteStore::open(dir.path(), key()),
        Err(StoreError::Locked(_))
    ));
    store.close().unwrap();
    let again = open(dir.path());
    assert!(again.is_open());
}

// ─── Test 7: Concurrency ────────────────────────────────────────────────────

#[test]
fn readers_see_committed_values_during_writes() {
    let dir = tempdir().unwrap();
    let store = Arc::new(open(dir.path()));
    store.set_zoom_level("https://a.example", 1.0).unwrap();

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 1..=200 {
                store
                    .set_zoom_level("https://a.example", f64::from(i))
                    .unwrap();
            }
        })
    };
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let mut last = 0.0;
                for _ in 0..200 {
                    let zoom = store.get_zoom_level("https://a.example").unwrap();
                    assert!(zoom >= last, "zoom went backwards: {zoom} < {last}");
                    last = zoom;
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(store.get_zoom_level("https://a.example").unwrap(), 200.0);
}
