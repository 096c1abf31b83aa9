//! Record store: durable `(origin, name) -> payload` storage.
//!
//! On disk a store directory holds:
//!
//! ```text
//! LOCK            advisory lock held by the open handle
//! MANIFEST        committed view: where each live record's frame lives
//! data-<gen>.log  append-only frames for the current generation
//! ```
//!
//! A mutation appends frames to the log, syncs it, then atomically replaces
//! the manifest. The manifest rename is the commit point: a crash before it
//! leaves the previous state, a crash after it leaves the new one.
//!
//! A new generation's log is written under a staging name and only renamed
//! to `data-<gen>.log` once complete, so the newest log on disk is always a
//! whole one.

pub mod fsutil;
pub mod log;
pub mod manifest;

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::codec::{now_millis, CodecError};
use crate::error::{Result, StoreError};
use crate::index::ScopeIndex;
use crate::options::StoreOptions;
use crate::origin::Origin;

use self::fsutil::{cleanup_staging, restrict_dir_permissions, staging_path};
use self::log::{
    list_logs, log_file_name, log_path, read_at, LogEntry, LogWriter, PutEntry, TombstoneEntry,
    LOG_HEADER_LEN,
};
use self::manifest::{Manifest, RecordKey, Slot};

pub const LOCK_FILE: &str = "LOCK";

/// A live record as read back from the log.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub origin: Origin,
    pub name: String,
    pub version: u32,
    pub sensitive: bool,
    pub updated_at: DateTime<Utc>,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRecord {
    pub origin: Origin,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VerifyReport {
    pub checked: usize,
    pub skipped: Vec<SkippedRecord>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompactionReport {
    pub generation: u64,
    pub live_records: usize,
    pub bytes_before: u64,
    pub bytes_after: u64,
    pub skipped: Vec<SkippedRecord>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct OpenReport {
    pub live_records: usize,
    /// Log bytes past the committed length: writes that never committed.
    pub orphaned_bytes: u64,
    pub rebuilt: bool,
    pub skipped: Vec<SkippedRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub live_records: usize,
    pub origins: usize,
    pub log_bytes: u64,
    pub dead_bytes: u64,
    pub generation: u64,
}

struct State {
    manifest: Manifest,
    index: ScopeIndex,
    reader: Arc<File>,
}

/// Single-writer, multi-reader record store over one directory.
///
/// Mutations serialize on `writer`; readers only take `state` shared and
/// never wait on log I/O of an in-flight write.
pub struct RecordStore {
    dir: PathBuf,
    options: StoreOptions,
    lock: File,
    writer: Mutex<LogWriter>,
    state: RwLock<State>,
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("dir", &self.dir)
            .field("generation", &self.state.read().manifest.generation)
            .finish()
    }
}

impl RecordStore {
    /// Open or create the store in `dir`, taking its exclusive lock.
    pub fn open(dir: impl AsRef<Path>, options: StoreOptions) -> Result<(Self, OpenReport)> {
        options.validate()?;
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        restrict_dir_permissions(&dir);

        let lock = acquire_lock(&dir)?;
        cleanup_staging(&dir);

        let mut report = OpenReport::default();
        let manifest = match Manifest::load(&dir) {
            Ok(Some(manifest)) => manifest,
            Ok(None) => match newest_log_with_frames(&dir)? {
                None => create_fresh(&dir)?,
                Some(_) if options.rebuild_from_log => {
                    report.rebuilt = true;
                    rebuild_manifest(&dir)?
                }
                Some(path) => {
                    return Err(StoreError::Corrupt(format!(
                        "manifest missing but {} holds records",
                        path.display()
                    )))
                }
            },
            Err(StoreError::Corrupt(msg)) if options.rebuild_from_log => {
                warn!(reason = %msg, "manifest unreadable; rebuilding from data log");
                report.rebuilt = true;
                rebuild_manifest(&dir)?
            }
            Err(e) => return Err(e),
        };

        let path = log_path(&dir, manifest.generation);
        let mut writer = match LogWriter::open(&path) {
            Ok(writer) => writer,
            Err(e) if e.kind() == io::ErrorKind::NotFound && manifest.entries.is_empty() => {
                LogWriter::create(&path, manifest.generation)?
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::Corrupt(format!(
                    "data log {} missing",
                    path.display()
                )))
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof
                ) =>
            {
                return Err(StoreError::Corrupt(format!("{}: {e}", path.display())))
            }
            Err(e) => return Err(e.into()),
        };
        if writer.generation() != manifest.generation {
            return Err(StoreError::Corrupt(format!(
                "data log generation {} does not match manifest generation {}",
                writer.generation(),
                manifest.generation
            )));
        }
        remove_stale_logs(&dir, manifest.generation);

        if writer.len() < manifest.committed_len {
            warn!(
                log_bytes = writer.len(),
                committed = manifest.committed_len,
                "data log shorter than committed length; affected records will fail to read"
            );
        }
        report.orphaned_bytes = writer.len().saturating_sub(manifest.committed_len);
        if report.orphaned_bytes > 0 {
            // New frames must follow the last committed one directly.
            warn!(
                bytes = report.orphaned_bytes,
                "discarding uncommitted data log tail"
            );
            writer.truncate(manifest.committed_len)?;
        }

        let reader = Arc::new(File::open(&path)?);
        let index = index_of(&manifest);
        let store = Self {
            dir,
            options,
            lock,
            writer: Mutex::new(writer),
            state: RwLock::new(State {
                manifest,
                index,
                reader,
            }),
        };

        if store.options.verify_on_open {
            report.skipped = store.drop_unreadable()?;
        }
        report.live_records = store.state.read().index.len();
        info!(
            dir = %store.dir.display(),
            live_records = report.live_records,
            orphaned_bytes = report.orphaned_bytes,
            rebuilt = report.rebuilt,
            "record store opened"
        );
        Ok((store, report))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Read the live record for `(origin, name)`. Absence is `Ok(None)`.
    pub fn get(&self, origin: &Origin, name: &str) -> Result<Option<Record>> {
        let key = RecordKey::new(origin, name);
        let (slot, frame) = {
            let state = self.state.read();
            let Some(slot) = state.manifest.entries.get(&key).copied() else {
                return Ok(None);
            };
            let frame = read_at(&state.reader, slot.offset, slot.frame_len as usize)?;
            (slot, frame)
        };
        decode_slot(&key, &slot, &frame).map(Some)
    }

    pub fn contains(&self, origin: &Origin, name: &str) -> bool {
        self.state.read().index.contains(origin, name)
    }

    /// Write `payload` as the new value of `(origin, name)`; returns its version.
    pub fn put(&self, origin: &Origin, name: &str, payload: &[u8], sensitive: bool) -> Result<u32> {
        let mut writer = self.writer.lock();
        let key = RecordKey::new(origin, name);
        let mut next = self.state.read().manifest.clone();

        let version = match next.entries.get(&key) {
            Some(prior) if prior.sensitive != sensitive => {
                return Err(StoreError::SensitivityMismatch {
                    origin: origin.to_string(),
                    name: name.to_string(),
                })
            }
            Some(prior) => prior.version.checked_add(1).ok_or_else(|| {
                StoreError::InvalidValue(format!("version overflow for {origin} {name}"))
            })?,
            None => 1,
        };
        let updated_at = now_millis();
        let frame = LogEntry::Put(PutEntry {
            origin: origin.clone(),
            name: name.to_string(),
            version,
            sensitive,
            updated_at,
            payload: payload.to_vec(),
        })
        .encode_frame()?;

        let locations = self.append_frames(&mut writer, &[frame])?;
        let (offset, frame_len) = locations[0];
        next.entries.insert(
            key,
            Slot {
                offset,
                frame_len,
                version,
                sensitive,
                updated_at,
            },
        );
        next.committed_len = writer.len();
        self.commit(&mut writer, next, |index| {
            index.add(origin, name);
        })?;
        debug!(%origin, name, version, "record written");

        self.maybe_compact(&mut writer);
        Ok(version)
    }

    /// Remove one record. Returns false (and writes nothing) if it was absent.
    pub fn delete(&self, origin: &Origin, name: &str) -> Result<bool> {
        let mut writer = self.writer.lock();
        let key = RecordKey::new(origin, name);
        let mut next = self.state.read().manifest.clone();
        let Some(prior) = next.entries.remove(&key) else {
            return Ok(false);
        };

        let frame = tombstone(origin, name, prior.version).encode_frame()?;
        self.append_frames(&mut writer, &[frame])?;
        next.committed_len = writer.len();
        self.commit(&mut writer, next, |index| {
            index.remove(origin, name);
        })?;
        debug!(%origin, name, "record deleted");

        self.maybe_compact(&mut writer);
        Ok(true)
    }

    /// Remove every record of `origin` in one commit. Returns how many went.
    pub fn clear_for_origin(&self, origin: &Origin) -> Result<usize> {
        let mut writer = self.writer.lock();
        let (mut next, names) = {
            let state = self.state.read();
            (state.manifest.clone(), state.index.records_for(origin))
        };
        if names.is_empty() {
            return Ok(0);
        }

        let mut frames = Vec::with_capacity(names.len());
        for name in &names {
            if let Some(prior) = next.entries.remove(&RecordKey::new(origin, name)) {
                frames.push(tombstone(origin, name, prior.version).encode_frame()?);
            }
        }
        self.append_frames(&mut writer, &frames)?;
        next.committed_len = writer.len();
        self.commit(&mut writer, next, |index| {
            index.take_origin(origin);
        })?;
        info!(%origin, removed = names.len(), "origin cleared");

        self.maybe_compact(&mut writer);
        Ok(names.len())
    }

    /// Remove every record by switching to a fresh, empty generation.
    pub fn clear_all(&self) -> Result<usize> {
        let mut writer = self.writer.lock();
        let (generation, count) = {
            let state = self.state.read();
            (state.manifest.generation, state.manifest.entries.len())
        };
        if count == 0 {
            return Ok(0);
        }

        let next_generation = generation + 1;
        let new_log = stage_log(&self.dir, next_generation)?;
        self.install_generation(&mut writer, new_log, Manifest::empty(next_generation))?;
        info!(removed = count, generation = next_generation, "store cleared");
        Ok(count)
    }

    pub fn origins(&self) -> Vec<Origin> {
        self.state.read().index.origins()
    }

    pub fn names_for(&self, origin: &Origin) -> Vec<String> {
        self.state
            .read()
            .index
            .records_for(origin)
            .into_iter()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let state = self.state.read();
        let log_bytes = state.reader.metadata()?.len();
        Ok(StoreStats {
            live_records: state.index.len(),
            origins: state.index.origin_count(),
            log_bytes,
            dead_bytes: log_bytes.saturating_sub(state.manifest.live_bytes()),
            generation: state.manifest.generation,
        })
    }

    /// Read and check every live record without changing anything.
    pub fn verify(&self) -> Result<VerifyReport> {
        let (manifest, reader) = self.snapshot();
        let mut report = VerifyReport {
            checked: manifest.entries.len(),
            skipped: Vec::new(),
        };
        for (key, slot) in sorted_by_offset(&manifest.entries) {
            if let Err(e) = read_slot(&reader, key, slot) {
                report.skipped.push(skipped(key, &e));
            }
        }
        Ok(report)
    }

    /// Rewrite live records into a new generation and drop dead space.
    pub fn compact(&self) -> Result<CompactionReport> {
        let mut writer = self.writer.lock();
        self.compact_locked(&mut writer)
    }

    /// Sync outstanding writes and release the directory lock.
    pub fn close(self) -> Result<()> {
        self.writer.lock().sync()?;
        self.lock.unlock()?;
        info!(dir = %self.dir.display(), "record store closed");
        Ok(())
    }

    fn snapshot(&self) -> (Manifest, Arc<File>) {
        let state = self.state.read();
        (state.manifest.clone(), Arc::clone(&state.reader))
    }

    fn append_frames(&self, writer: &mut LogWriter, frames: &[Vec<u8>]) -> Result<Vec<(u64, u32)>> {
        let appended = writer.append(frames).and_then(|locations| {
            if self.options.sync_writes {
                writer.sync()?;
            }
            Ok(locations)
        });
        appended.map_err(|e| {
            self.roll_back(writer);
            StoreError::from(e)
        })
    }

    /// Persist `next` and publish it. Nothing is visible before the manifest lands.
    fn commit(
        &self,
        writer: &mut LogWriter,
        next: Manifest,
        update_index: impl FnOnce(&mut ScopeIndex),
    ) -> Result<()> {
        if let Err(e) = next.commit(&self.dir) {
            self.roll_back(writer);
            return Err(e);
        }
        let mut state = self.state.write();
        state.manifest = next;
        update_index(&mut state.index);
        Ok(())
    }

    /// Drop frames appended after the last commit so later frames follow it.
    fn roll_back(&self, writer: &mut LogWriter) {
        let committed = self.state.read().manifest.committed_len;
        if writer.len() <= committed {
            return;
        }
        if let Err(e) = writer.truncate(committed) {
            warn!(error = %e, "cannot discard uncommitted data log tail");
        }
    }

    /// Publish a staged log under its real name and commit `manifest` over it.
    /// Until the manifest rename lands the new log is removed on any failure.
    fn install_generation(
        &self,
        writer: &mut LogWriter,
        mut new_log: LogWriter,
        manifest: Manifest,
    ) -> Result<()> {
        let new_path = log_path(&self.dir, manifest.generation);
        let old_path = writer.path().to_path_buf();
        let installed = (|| {
            new_log.publish(&new_path)?;
            let reader = Arc::new(File::open(&new_path)?);
            manifest.commit(&self.dir)?;
            Ok::<_, StoreError>(reader)
        })();
        let reader = match installed {
            Ok(reader) => reader,
            Err(e) => {
                let _ = fs::remove_file(new_log.path());
                return Err(e);
            }
        };

        let index = index_of(&manifest);
        {
            let mut state = self.state.write();
            state.manifest = manifest;
            state.index = index;
            state.reader = reader;
        }
        *writer = new_log;
        if let Err(e) = fs::remove_file(&old_path) {
            warn!(path = %old_path.display(), error = %e, "cannot remove superseded data log");
        }
        Ok(())
    }

    fn compact_locked(&self, writer: &mut LogWriter) -> Result<CompactionReport> {
        let (snapshot, reader) = self.snapshot();
        let bytes_before = writer.len();
        let next_generation = snapshot.generation + 1;
        let mut new_log = stage_log(&self.dir, next_generation)?;
        let mut next = Manifest::empty(next_generation);
        let mut skipped_records = Vec::new();

        let copied = (|| {
            for (key, slot) in sorted_by_offset(&snapshot.entries) {
                let frame = read_at(&reader, slot.offset, slot.frame_len as usize)?;
                if let Err(e) = decode_slot(key, slot, &frame) {
                    warn!(origin = %key.origin, name = %key.name, error = %e, "dropping unreadable record during compaction");
                    skipped_records.push(skipped(key, &e));
                    continue;
                }
                let locations = new_log.append(&[frame])?;
                next.entries.insert(
                    key.clone(),
                    Slot {
                        offset: locations[0].0,
                        ..*slot
                    },
                );
            }
            new_log.sync()?;
            Ok::<_, StoreError>(())
        })();
        if let Err(e) = copied {
            let _ = fs::remove_file(new_log.path());
            return Err(e);
        }
        next.committed_len = new_log.len();

        let report = CompactionReport {
            generation: next_generation,
            live_records: next.entries.len(),
            bytes_before,
            bytes_after: new_log.len(),
            skipped: skipped_records,
        };
        self.install_generation(writer, new_log, next)?;
        info!(
            generation = report.generation,
            bytes_before = report.bytes_before,
            bytes_after = report.bytes_after,
            skipped = report.skipped.len(),
            "compaction finished"
        );
        Ok(report)
    }

    /// Runs after a committed write; failures are logged, the write stands.
    fn maybe_compact(&self, writer: &mut LogWriter) {
        let live = self.state.read().manifest.live_bytes();
        let log_bytes = writer.len();
        let dead = log_bytes.saturating_sub(live);
        if !self.options.compaction.should_compact(log_bytes, dead) {
            return;
        }
        debug!(log_bytes, dead, "dead space over threshold; compacting");
        if let Err(e) = self.compact_locked(writer) {
            warn!(error = %e, "automatic compaction failed");
        }
    }

    /// Drop live records that fail to read back, in one commit.
    fn drop_unreadable(&self) -> Result<Vec<SkippedRecord>> {
        let mut writer = self.writer.lock();
        let (mut next, reader) = self.snapshot();
        let mut dropped = Vec::new();
        for (key, slot) in sorted_by_offset(&next.entries) {
            if let Err(e) = read_slot(&reader, key, slot) {
                warn!(origin = %key.origin, name = %key.name, error = %e, "dropping unreadable record");
                dropped.push((key.clone(), skipped(key, &e)));
            }
        }
        if dropped.is_empty() {
            return Ok(Vec::new());
        }
        for (key, _) in &dropped {
            next.entries.remove(key);
        }
        let index = index_of(&next);
        self.commit(&mut writer, next, |current| *current = index)?;
        Ok(dropped.into_iter().map(|(_, s)| s).collect())
    }
}

fn acquire_lock(dir: &Path) -> Result<File> {
    let lock = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(dir.join(LOCK_FILE))?;
    match lock.try_lock_exclusive() {
        Ok(()) => Ok(lock),
        Err(e)
            if e.kind() == io::ErrorKind::WouldBlock
                || e.raw_os_error() == fs2::lock_contended_error().raw_os_error() =>
        {
            Err(StoreError::Locked(dir.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Start the log of `generation` under a staging name.
fn stage_log(dir: &Path, generation: u64) -> Result<LogWriter> {
    let path = staging_path(dir, &log_file_name(generation));
    Ok(LogWriter::create(&path, generation)?)
}

fn create_fresh(dir: &Path) -> Result<Manifest> {
    let manifest = Manifest::empty(1);
    let path = log_path(dir, manifest.generation);
    remove_if_exists(&path)?;
    LogWriter::create(&path, manifest.generation)?;
    manifest.commit(dir)?;
    info!(dir = %dir.display(), "created new record store");
    Ok(manifest)
}

/// Newest data log that holds anything beyond its header.
fn newest_log_with_frames(dir: &Path) -> Result<Option<PathBuf>> {
    for (_, path) in list_logs(dir)?.into_iter().rev() {
        if fs::metadata(&path)?.len() > LOG_HEADER_LEN {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

/// Replay the newest readable data log into a manifest and commit it.
///
/// Only finished logs carry a `data-<gen>.log` name, so the newest one holds
/// the latest state. Newer logs whose header is unreadable are passed over.
fn rebuild_manifest(dir: &Path) -> Result<Manifest> {
    let mut logs = list_logs(dir)?;
    if logs.is_empty() {
        return create_fresh(dir);
    }
    let (path, scanned) = loop {
        let Some((generation, path)) = logs.pop() else {
            return Err(StoreError::Corrupt(format!(
                "no readable data log in {}",
                dir.display()
            )));
        };
        match log::scan(&path) {
            Ok(scanned) if scanned.generation == generation => break (path, scanned),
            Ok(scanned) => warn!(
                path = %path.display(),
                header_generation = scanned.generation,
                "data log header does not match its name; skipping"
            ),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof
                ) =>
            {
                warn!(path = %path.display(), error = %e, "unreadable data log; skipping")
            }
            Err(e) => return Err(e.into()),
        }
    };

    let mut manifest = Manifest::empty(scanned.generation);
    for frame in scanned.frames {
        let key = RecordKey::new(frame.entry.origin(), frame.entry.name());
        match frame.entry {
            LogEntry::Put(put) => {
                manifest.entries.insert(
                    key,
                    Slot {
                        offset: frame.offset,
                        frame_len: frame.len,
                        version: put.version,
                        sensitive: put.sensitive,
                        updated_at: put.updated_at,
                    },
                );
            }
            LogEntry::Tombstone(tomb) => {
                if manifest
                    .entries
                    .get(&key)
                    .is_some_and(|slot| slot.version <= tomb.version)
                {
                    manifest.entries.remove(&key);
                }
            }
        }
    }
    manifest.committed_len = scanned.valid_end;
    manifest.commit(dir)?;
    warn!(
        path = %path.display(),
        live_records = manifest.entries.len(),
        discarded_bytes = scanned.discarded,
        "manifest rebuilt from data log"
    );
    Ok(manifest)
}

fn remove_stale_logs(dir: &Path, current: u64) {
    let Ok(logs) = list_logs(dir) else { return };
    for (generation, path) in logs {
        if generation != current {
            warn!(path = %path.display(), "removing superseded data log");
            if let Err(e) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "cannot remove superseded data log");
            }
        }
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn index_of(manifest: &Manifest) -> ScopeIndex {
    ScopeIndex::from_keys(
        manifest
            .entries
            .keys()
            .map(|key| (&key.origin, key.name.as_str())),
    )
}

fn tombstone(origin: &Origin, name: &str, version: u32) -> LogEntry {
    LogEntry::Tombstone(TombstoneEntry {
        origin: origin.clone(),
        name: name.to_string(),
        version,
        deleted_at: now_millis(),
    })
}

fn sorted_by_offset(entries: &HashMap<RecordKey, Slot>) -> Vec<(&RecordKey, &Slot)> {
    let mut sorted: Vec<_> = entries.iter().collect();
    sorted.sort_by_key(|(_, slot)| slot.offset);
    sorted
}

fn read_slot(reader: &File, key: &RecordKey, slot: &Slot) -> Result<Record> {
    let frame = read_at(reader, slot.offset, slot.frame_len as usize)?;
    decode_slot(key, slot, &frame)
}

/// Decode a frame and check it is the one the manifest says lives there.
fn decode_slot(key: &RecordKey, slot: &Slot, frame: &[u8]) -> Result<Record> {
    match LogEntry::decode_frame(frame)? {
        LogEntry::Put(put)
            if put.origin == key.origin && put.name == key.name && put.version == slot.version =>
        {
            Ok(Record {
                origin: put.origin,
                name: put.name,
                version: put.version,
                sensitive: put.sensitive,
                updated_at: put.updated_at,
                payload: put.payload,
            })
        }
        _ => Err(CodecError::Malformed(format!(
            "frame at offset {} does not hold {} {} v{}",
            slot.offset, key.origin, key.name, slot.version
        ))
        .into()),
    }
}

fn skipped(key: &RecordKey, error: &StoreError) -> SkippedRecord {
    SkippedRecord {
        origin: key.origin.clone(),
        name: key.name.clone(),
        reason: error.to_string(),
    }
}
