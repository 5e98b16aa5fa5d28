//! Log Segment
//!
//! A single append-only data file. Owns the file handles and the write offset.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::config::SyncStrategy;
use crate::error::{CaskError, Result};

/// An append-only log file
///
/// ## Concurrency
/// - `append`/`sync`/`truncate` take `&mut self`; the engine serializes them
///   behind its write lock.
/// - `read` takes `&self` and seeks a dedicated reader handle under a mutex,
///   so it never disturbs the append position.
#[derive(Debug)]
pub struct LogSegment {
    /// Identifier recorded in index pointers
    id: u32,

    path: PathBuf,

    /// Handle used for appends
    writer: File,

    /// Handle used for positional reads
    reader: Mutex<File>,

    /// End of the last fully written record
    offset: u64,

    sync_strategy: SyncStrategy,

    /// Appends since the last fsync
    uncommitted: usize,

    /// Opened for inspection only; mutations fail
    read_only: bool,
}

impl LogSegment {
    /// Open or create a segment file. The write offset starts at end-of-file.
    pub fn open(path: &Path, id: u32, sync_strategy: SyncStrategy) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let writer = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;
        let reader = File::open(path)?;
        let offset = writer.metadata()?.len();

        tracing::debug!(path = %path.display(), id, size = offset, "opened log segment");

        Ok(Self {
            id,
            path: path.to_path_buf(),
            writer,
            reader: Mutex::new(reader),
            offset,
            sync_strategy,
            uncommitted: 0,
            read_only: false,
        })
    }

    /// Open an existing segment for reading only. Fails if the file is missing.
    pub fn open_read_only(path: &Path, id: u32) -> Result<Self> {
        let writer = File::open(path)?;
        let reader = File::open(path)?;
        let offset = writer.metadata()?.len();

        Ok(Self {
            id,
            path: path.to_path_buf(),
            writer,
            reader: Mutex::new(reader),
            offset,
            sync_strategy: SyncStrategy::EveryWrite,
            uncommitted: 0,
            read_only: true,
        })
    }

    /// Append `buf` at the end of the segment and return where it starts.
    ///
    /// On failure (write or the strategy's fsync) the offset is left
    /// unchanged and the file is cut back to it, so a record the caller saw
    /// fail is never replayed and never sits in front of later appends.
    pub fn append(&mut self, buf: &[u8]) -> Result<u64> {
        self.ensure_writable()?;
        let start = self.offset;

        if let Err(e) = self.write_at_end(start, buf) {
            if let Err(rollback) = self.writer.set_len(start) {
                tracing::warn!(
                    path = %self.path.display(),
                    offset = start,
                    error = %rollback,
                    "failed to roll back partial append"
                );
            }
            return Err(e);
        }

        self.offset = start + buf.len() as u64;
        Ok(start)
    }

    /// Write at `start`, then fsync if the strategy says so. Only touches
    /// `uncommitted` once everything succeeded.
    fn write_at_end(&mut self, start: u64, buf: &[u8]) -> Result<()> {
        self.writer.seek(SeekFrom::Start(start))?;
        self.writer.write_all(buf)?;
        self.writer.flush()?;

        let pending = self.uncommitted + 1;
        let should_sync = match self.sync_strategy {
            SyncStrategy::EveryWrite => true,
            SyncStrategy::EveryNEntries { count } => pending >= count,
        };
        if should_sync {
            self.writer.sync_data()?;
            self.uncommitted = 0;
        } else {
            self.uncommitted = pending;
        }
        Ok(())
    }

    /// Read exactly `length` bytes starting at `offset`.
    pub fn read(&self, offset: u64, length: u64) -> Result<Vec<u8>> {
        let end = offset.checked_add(length);
        if end.map_or(true, |end| end > self.offset) {
            return Err(CaskError::OutOfRange {
                offset,
                length,
                size: self.offset,
            });
        }

        let mut buf = vec![0u8; length as usize];
        let mut reader = self.reader.lock();
        reader.seek(SeekFrom::Start(offset))?;
        reader.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Current end-of-file offset
    pub fn size(&self) -> u64 {
        self.offset
    }

    /// Force outstanding appends to stable storage
    pub fn sync(&mut self) -> Result<()> {
        if self.read_only {
            return Ok(());
        }
        self.writer.sync_data()?;
        self.uncommitted = 0;
        Ok(())
    }

    /// Cut the file to `len` bytes. Only used to drop a torn tail.
    pub fn truncate(&mut self, len: u64) -> Result<()> {
        self.ensure_writable()?;
        if len > self.offset {
            return Err(CaskError::OutOfRange {
                offset: len,
                length: 0,
                size: self.offset,
            });
        }
        self.writer.set_len(len)?;
        self.writer.sync_all()?;
        tracing::debug!(
            path = %self.path.display(),
            from = self.offset,
            to = len,
            "truncated log segment"
        );
        self.offset = len;
        self.uncommitted = 0;
        Ok(())
    }

    /// Move the file to `path`. Open handles keep pointing at the same data.
    pub fn rename_to(&mut self, path: &Path) -> Result<()> {
        self.ensure_writable()?;
        fs::rename(&self.path, path)?;
        tracing::debug!(
            from = %self.path.display(),
            to = %path.display(),
            "renamed log segment"
        );
        self.path = path.to_path_buf();
        Ok(())
    }

    pub fn set_sync_strategy(&mut self, sync_strategy: SyncStrategy) {
        self.sync_strategy = sync_strategy;
    }

    /// Sync and release the file handles
    pub fn close(mut self) -> Result<()> {
        self.sync()
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(CaskError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "segment is opened read-only",
            )));
        }
        Ok(())
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends not yet fsynced
    pub fn uncommitted_count(&self) -> usize {
        self.uncommitted
    }
}
