//! Engine Module
//!
//! The storage engine that coordinates the log segment, the key directory
//! and recovery.
//!
//! ## Responsibilities
//! - Rebuild the key directory from the log on open
//! - Append every mutation before touching the index
//! - Serve reads through the index with checksum verification
//! - Guard the data file against a second concurrent opener
//! - Rewrite the log without dead records on request (compaction)

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use fs2::FileExt;
use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use crate::config::{Config, SyncStrategy};
use crate::error::{CaskError, Result};
use crate::keydir::{KeyDir, RecordPointer};
use crate::storage::{
    encode_record, now_timestamp, LogSegment, Operation, Record, Recovery, RecoveryResult,
};

/// The main storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put/delete/compact/sync/close): take the state write lock
///   - Append to the log and update the index under one guard, so no reader
///     ever sees a pointer to bytes that are not written yet
///
/// - **Reads** (get and the accessors): take the state read lock
///   - Many concurrent readers; the segment serializes the actual file read
///   - A read racing a put sees either the old or the new value, never a
///     partial one
///
/// `close()` takes the state out; every later call fails with `ClosedEngine`.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// `None` once closed
    state: RwLock<Option<EngineState>>,

    /// Stats from the open-time recovery scan
    recovery: RecoveryResult,
}

/// Everything the engine owns while open
struct EngineState {
    /// The active (and only) data file
    segment: LogSegment,

    /// key → latest live record
    keydir: KeyDir,

    /// Held for its advisory lock; released on drop
    _lock: Option<File>,
}

/// Outcome of a compaction run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionResult {
    /// Data file size before compaction
    pub bytes_before: u64,

    /// Data file size after compaction
    pub bytes_after: u64,

    /// Live records copied into the new file
    pub records_kept: u64,
}

impl Engine {
    // =========================================================================
    // Internal Constants
    // =========================================================================
    const SEGMENT_ID: u32 = 0;
    const LOCK_SUFFIX: &'static str = ".lock";
    const COMPACT_SUFFIX: &'static str = ".compact";

    /// Open or create the data file at `path` with default settings
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(Config::with_path(path.as_ref()))
    }

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Take the exclusive lock (if enabled)
    /// 2. Open/create the data file
    /// 3. Replay the log into a fresh key directory
    /// 4. Cut off a torn tail, if recovery found one
    pub fn open_with(config: Config) -> Result<Self> {
        config.validate()?;

        // Step 1: Lock before reading anything
        let lock = if config.lock_file {
            Some(Self::acquire_lock(&config.path)?)
        } else {
            None
        };

        // Step 2: Open the segment (offset = end of file)
        let mut segment = LogSegment::open(&config.path, Self::SEGMENT_ID, config.sync_strategy)?;

        // Step 3: Rebuild the index; interior corruption aborts here
        let (keydir, recovery) = Recovery::rebuild(&segment)?;

        // Step 4: Drop the torn tail so new appends follow the last good record
        if recovery.was_truncated {
            tracing::warn!(
                path = %config.path.display(),
                valid_len = recovery.valid_len,
                discarded_bytes = recovery.discarded_bytes,
                "discarding torn write at end of log"
            );
            segment.truncate(recovery.valid_len)?;
        }

        tracing::info!(
            path = %config.path.display(),
            records = recovery.records_scanned,
            live_keys = recovery.live_keys,
            size = segment.size(),
            "engine opened"
        );

        Ok(Self {
            config,
            state: RwLock::new(Some(EngineState {
                segment,
                keydir,
                _lock: lock,
            })),
            recovery,
        })
    }

    /// Get the value stored for `key`
    ///
    /// Returns `Ok(None)` if the key was never written or has been deleted.
    /// The record is checksum-verified on every read.
    pub fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        let buf = {
            let state = self.state()?;
            let Some(pointer) = state.keydir.get(key) else {
                return Ok(None);
            };
            state.segment.read(pointer.offset, pointer.length)?
        };

        let record = Record::decode_bytes(Bytes::from(buf))?;
        match record.operation {
            Operation::Put {
                key: stored_key,
                value,
            } if stored_key == key => Ok(Some(value)),
            Operation::Put { .. } => Err(CaskError::MalformedRecord(
                "index points at a record for a different key".to_string(),
            )),
            Operation::Delete { .. } => Err(CaskError::MalformedRecord(
                "index points at a tombstone".to_string(),
            )),
        }
    }

    /// Put a key-value pair
    ///
    /// Steps:
    /// 1. Check size limits and encode (before any disk write)
    /// 2. Acquire the write lock
    /// 3. Append to the log
    /// 4. Point the index at the new record
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_limits(key, Some(value))?;
        let timestamp = now_timestamp();
        let encoded = encode_record(key, Some(value), timestamp)?;

        let mut state = self.state_mut()?;
        let offset = state.segment.append(&encoded)?;
        let pointer = RecordPointer {
            segment_id: state.segment.id(),
            offset,
            length: encoded.len() as u64,
            timestamp,
        };
        state.keydir.set(Bytes::copy_from_slice(key), pointer);

        Ok(())
    }

    /// Delete a key
    ///
    /// Appends a tombstone so replay won't resurrect the key, then drops it
    /// from the index. Deleting a key that isn't live succeeds without
    /// writing anything.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.check_limits(key, None)?;

        let mut state = self.state_mut()?;
        if !state.keydir.contains_key(key) {
            return Ok(());
        }

        let encoded = encode_record(key, None, now_timestamp())?;
        state.segment.append(&encoded)?;
        state.keydir.delete(key);

        Ok(())
    }

    /// Force all appended records to stable storage
    pub fn sync(&self) -> Result<()> {
        self.state_mut()?.segment.sync()
    }

    /// Close the engine
    ///
    /// Syncs the log and releases the file handles and lock. Every later
    /// call, including another `close`, fails with `ClosedEngine`.
    pub fn close(&self) -> Result<()> {
        let EngineState {
            segment,
            keydir,
            _lock,
        } = self.state.write().take().ok_or(CaskError::ClosedEngine)?;

        let size = segment.size();
        segment.close()?;

        tracing::info!(
            path = %self.config.path.display(),
            live_keys = keydir.len(),
            size,
            "engine closed"
        );

        Ok(())
    }

    /// Rewrite the log keeping only the latest record of each live key
    ///
    /// Live records are copied verbatim (timestamps included), in log order,
    /// into `{path}.compact`, which is then renamed over the data file. The
    /// compacted segment is installed as-is, so its handles follow the
    /// rename. If anything fails before the swap the original file is left
    /// untouched.
    pub fn compact(&self) -> Result<CompactionResult> {
        let mut guard = self.state_mut()?;
        let state = &mut *guard;
        let bytes_before = state.segment.size();
        let compact_path = sidecar_path(&self.config.path, Self::COMPACT_SUFFIX);

        let swapped = Self::write_compacted(state, &compact_path).and_then(|(mut out, keydir)| {
            out.rename_to(&self.config.path)?;
            Ok((out, keydir))
        });
        let (mut segment, keydir) = match swapped {
            Ok(swapped) => swapped,
            Err(e) => {
                if compact_path.exists() {
                    if let Err(cleanup) = fs::remove_file(&compact_path) {
                        tracing::warn!(
                            path = %compact_path.display(),
                            error = %cleanup,
                            "failed to remove partial compaction file"
                        );
                    }
                }
                return Err(e);
            }
        };

        // The data file now is the compacted one; switch over before anything
        // else can fail
        segment.set_sync_strategy(self.config.sync_strategy);
        state.segment = segment;
        state.keydir = keydir;

        sync_parent_dir(&self.config.path)?;

        let result = CompactionResult {
            bytes_before,
            bytes_after: state.segment.size(),
            records_kept: state.keydir.len() as u64,
        };

        tracing::info!(
            path = %self.config.path.display(),
            bytes_before = result.bytes_before,
            bytes_after = result.bytes_after,
            records_kept = result.records_kept,
            "compaction finished"
        );

        Ok(result)
    }

    /// Copy live records into a fresh, fsynced segment and index them there
    fn write_compacted(state: &EngineState, compact_path: &Path) -> Result<(LogSegment, KeyDir)> {
        // Leftover from an interrupted compaction
        if compact_path.exists() {
            fs::remove_file(compact_path)?;
        }

        let mut live: Vec<(&Bytes, RecordPointer)> =
            state.keydir.iter().map(|(key, ptr)| (key, *ptr)).collect();
        live.sort_by_key(|(_, ptr)| ptr.offset);

        // The unsynced-append counter can't reach usize::MAX, so nothing is
        // fsynced until the explicit sync below
        let mut out = LogSegment::open(
            compact_path,
            Self::SEGMENT_ID,
            SyncStrategy::EveryNEntries { count: usize::MAX },
        )?;
        let mut keydir = KeyDir::new();

        for (key, pointer) in live {
            let buf = Bytes::from(state.segment.read(pointer.offset, pointer.length)?);
            // Refuse to carry bit rot into the new file
            Record::decode_bytes(buf.clone())?;

            let offset = out.append(&buf)?;
            keydir.set(
                key.clone(),
                RecordPointer {
                    segment_id: out.id(),
                    offset,
                    ..pointer
                },
            );
        }

        out.sync()?;
        Ok((out, keydir))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Whether `key` currently has a live value
    pub fn contains_key(&self, key: &[u8]) -> Result<bool> {
        Ok(self.state()?.keydir.contains_key(key))
    }

    /// Number of live keys
    pub fn len(&self) -> Result<usize> {
        Ok(self.state()?.keydir.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.state()?.keydir.is_empty())
    }

    /// Snapshot of the live keys, in no particular order
    pub fn keys(&self) -> Result<Vec<Bytes>> {
        Ok(self.state()?.keydir.keys().cloned().collect())
    }

    /// Current size of the data file in bytes
    pub fn size_on_disk(&self) -> Result<u64> {
        Ok(self.state()?.segment.size())
    }

    /// Path of the data file
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Stats from the recovery scan run by `open`
    pub fn recovery_result(&self) -> &RecoveryResult {
        &self.recovery
    }

    pub fn is_closed(&self) -> bool {
        self.state.read().is_none()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn state(&self) -> Result<MappedRwLockReadGuard<'_, EngineState>> {
        RwLockReadGuard::try_map(self.state.read(), |state| state.as_ref())
            .map_err(|_| CaskError::ClosedEngine)
    }

    fn state_mut(&self) -> Result<MappedRwLockWriteGuard<'_, EngineState>> {
        RwLockWriteGuard::try_map(self.state.write(), |state| state.as_mut())
            .map_err(|_| CaskError::ClosedEngine)
    }

    /// Enforce the configured caps (the codec enforces the format limits)
    fn check_limits(&self, key: &[u8], value: Option<&[u8]>) -> Result<()> {
        if key.len() as u64 > self.config.max_key_size as u64 {
            return Err(CaskError::RecordTooLarge {
                what: "key",
                len: key.len(),
                max: self.config.max_key_size as u64,
            });
        }
        if let Some(value) = value {
            if value.len() as u64 > self.config.max_value_size as u64 {
                return Err(CaskError::RecordTooLarge {
                    what: "value",
                    len: value.len(),
                    max: self.config.max_value_size as u64,
                });
            }
        }
        Ok(())
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_path = sidecar_path(path, Self::LOCK_SUFFIX);
        if let Some(parent) = lock_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)?;

        FileExt::try_lock_exclusive(&file).map_err(|_| CaskError::Locked(path.to_path_buf()))?;
        Ok(file)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // Best effort for handles dropped without close()
        if let Some(state) = self.state.get_mut().as_mut() {
            if let Err(e) = state.segment.sync() {
                tracing::warn!(
                    path = %self.config.path.display(),
                    error = %e,
                    "failed to sync log on drop"
                );
            }
        }
    }
}

/// `{path}{suffix}`, e.g. `cask.log` → `cask.log.lock`
fn sidecar_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        File::open(parent)?.sync_all()?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> Result<()> {
    Ok(())
}
