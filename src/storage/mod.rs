//! Storage Module
//!
//! The append-only data file: record format, segment I/O, scanning and
//! recovery.
//!
//! ## Responsibilities
//! - Encode/decode records with CRC32 checksums
//! - Append records and read them back by offset
//! - Replay the log to rebuild the key directory at startup
//! - Tolerate a torn final write, refuse interior corruption
//!
//! ## File Format
//! All integers are little-endian, no padding.
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ Record 1                                                         │
//! │ ┌─────────┬──────────┬────────────┬──────────────┬─────┬───────┐ │
//! │ │ CRC (4) │  TS (4)  │ KeyLen (4) │ ValueLen (4) │ Key │ Value │ │
//! │ └─────────┴──────────┴────────────┴──────────────┴─────┴───────┘ │
//! ├──────────────────────────────────────────────────────────────────┤
//! │ Record 2 ...                                                     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//! - CRC is CRC32 over `key ++ value`
//! - TS is seconds since the Unix epoch
//! - ValueLen = u32::MAX marks a tombstone: no value bytes follow
//!   and the CRC covers the key only

mod record;
mod segment;
mod scanner;
mod recovery;

pub use record::{
    checksum, encode_record, now_timestamp, Operation, Record, RecordHeader, HEADER_SIZE,
    MAX_KEY_SIZE, MAX_VALUE_SIZE, TOMBSTONE_MARKER,
};
pub use segment::LogSegment;
pub use scanner::{ScannedRecord, SegmentScanner};
pub use recovery::{Recovery, RecoveryResult};
