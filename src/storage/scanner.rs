//! Segment scanner
//!
//! Lazy, finite iteration over the records of a segment, front to back.

use bytes::Bytes;

use crate::error::{CaskError, Result};

use super::record::{Record, RecordHeader, HEADER_SIZE};
use super::segment::LogSegment;

/// A record together with where it lives in the segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedRecord {
    /// Offset of the record header
    pub offset: u64,

    /// Header + key + value
    pub length: u64,

    pub record: Record,
}

/// Iterator over the records of a segment
///
/// Stops cleanly (returns `None`) at end-of-file or at a torn tail; the torn
/// tail offset is then available from [`SegmentScanner::torn_tail`]. Damage
/// followed by more data yields a single `CorruptLog` error, then `None`.
/// A header whose length runs past end-of-file is a torn tail only if no
/// valid record can be found in the bytes after it.
pub struct SegmentScanner<'a> {
    segment: &'a LogSegment,
    /// End of the last valid record
    position: u64,
    /// Snapshot of the segment size when the scan started
    end: u64,
    torn_tail: Option<u64>,
    done: bool,
}

impl<'a> SegmentScanner<'a> {
    pub fn new(segment: &'a LogSegment) -> Self {
        Self {
            segment,
            position: 0,
            end: segment.size(),
            torn_tail: None,
            done: false,
        }
    }

    /// End of the last record read successfully
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Offset where a torn tail begins, if the scan stopped at one
    pub fn torn_tail(&self) -> Option<u64> {
        self.torn_tail
    }

    fn next_record(&mut self) -> Result<Option<ScannedRecord>> {
        if self.position >= self.end {
            return Ok(None);
        }

        let offset = self.position;
        let remaining = self.end - offset;
        if remaining < HEADER_SIZE as u64 {
            return Ok(self.stop_at_torn_tail("partial header"));
        }

        let header_bytes = self.segment.read(offset, HEADER_SIZE as u64)?;
        let header = RecordHeader::decode(&header_bytes)?;
        let length = header.record_len();
        if length > remaining {
            // A damaged length field looks like a torn write unless real
            // records follow it
            if let Some(next) = self.find_record_after(offset)? {
                return Err(CaskError::CorruptLog {
                    offset,
                    reason: format!(
                        "header declares {} bytes past end of file but a valid record follows at offset {}",
                        length, next
                    ),
                });
            }
            return Ok(self.stop_at_torn_tail("record runs past end of file"));
        }

        let buf = self.segment.read(offset, length)?;
        match Record::decode_bytes(Bytes::from(buf)) {
            Ok(record) => {
                self.position = offset + length;
                Ok(Some(ScannedRecord {
                    offset,
                    length,
                    record,
                }))
            }
            Err(e @ (CaskError::ChecksumMismatch { .. } | CaskError::MalformedRecord(_))) => {
                if offset + length == self.end {
                    Ok(self.stop_at_torn_tail("damaged final record"))
                } else {
                    Err(CaskError::CorruptLog {
                        offset,
                        reason: e.to_string(),
                    })
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Offset of the first complete, checksum-valid record starting after
    /// `offset`, if any.
    ///
    /// All-zero headers are skipped: they decode as an empty record, and a
    /// half-written run of zeros must still count as a torn tail.
    fn find_record_after(&self, offset: u64) -> Result<Option<u64>> {
        let tail = self.segment.read(offset, self.end - offset)?;

        let mut start = 1;
        while start + HEADER_SIZE <= tail.len() {
            let candidate = &tail[start..];
            if candidate[..HEADER_SIZE].iter().any(|&b| b != 0) {
                let header = RecordHeader::decode(candidate)?;
                let length = header.record_len();
                if length <= candidate.len() as u64
                    && Record::decode(&candidate[..length as usize]).is_ok()
                {
                    return Ok(Some(offset + start as u64));
                }
            }
            start += 1;
        }
        Ok(None)
    }

    fn stop_at_torn_tail(&mut self, reason: &str) -> Option<ScannedRecord> {
        tracing::debug!(
            path = %self.segment.path().display(),
            offset = self.position,
            bytes = self.end - self.position,
            reason,
            "torn tail detected"
        );
        self.torn_tail = Some(self.position);
        None
    }
}

impl<'a> Iterator for SegmentScanner<'a> {
    type Item = Result<ScannedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.next_record() {
            Ok(Some(scanned)) => Some(Ok(scanned)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
