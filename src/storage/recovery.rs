//! Recovery
//!
//! Rebuilds the key directory by replaying a segment from the start.

use std::path::Path;

use bytes::Bytes;

use crate::error::Result;
use crate::keydir::{KeyDir, RecordPointer};

use super::record::{Operation, Record};
use super::scanner::{ScannedRecord, SegmentScanner};
use super::segment::LogSegment;

/// Replays segments into a key directory
pub struct Recovery;

/// Result of a recovery scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Records decoded successfully
    pub records_scanned: u64,

    /// Of which were puts
    pub puts: u64,

    /// Of which were tombstones
    pub tombstones: u64,

    /// Keys alive after replay
    pub live_keys: u64,

    /// End of the last valid record
    pub valid_len: u64,

    /// Bytes past `valid_len` that belong to a torn write
    pub discarded_bytes: u64,

    /// Whether a torn tail was found
    pub was_truncated: bool,
}

impl Recovery {
    /// Lazily iterate over the records of `segment`. Each call starts a fresh
    /// scan from offset 0.
    pub fn scan(segment: &LogSegment) -> SegmentScanner<'_> {
        SegmentScanner::new(segment)
    }

    /// Replay every record of `segment` in log order.
    ///
    /// Later records win, tombstones remove their key. A torn tail stops the
    /// scan and is reported in the result; the segment itself is not modified.
    /// Damage before the last record fails with `CorruptLog`.
    pub fn rebuild(segment: &LogSegment) -> Result<(KeyDir, RecoveryResult)> {
        let mut keydir = KeyDir::new();
        let mut result = RecoveryResult::default();
        let mut scanner = Self::scan(segment);

        for item in scanner.by_ref() {
            let ScannedRecord {
                offset,
                length,
                record: Record {
                    timestamp,
                    operation,
                },
            } = item?;
            result.records_scanned += 1;

            match operation {
                Operation::Put { key, .. } => {
                    result.puts += 1;
                    let pointer = RecordPointer {
                        segment_id: segment.id(),
                        offset,
                        length,
                        timestamp,
                    };
                    // Copy so the index doesn't pin the whole record buffer
                    keydir.set(Bytes::copy_from_slice(&key), pointer);
                }
                Operation::Delete { key } => {
                    result.tombstones += 1;
                    keydir.delete(&key);
                }
            }
        }

        result.valid_len = scanner.position();
        result.discarded_bytes = segment.size() - result.valid_len;
        result.was_truncated = scanner.torn_tail().is_some();
        result.live_keys = keydir.len() as u64;

        Ok((keydir, result))
    }

    /// Scan a data file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        let segment = LogSegment::open_read_only(path, 0)?;
        let (_, result) = Self::rebuild(&segment)?;
        Ok(result)
    }
}
