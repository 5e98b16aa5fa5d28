//! Error types for CaskDB
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using CaskError
pub type Result<T> = std::result::Result<T, CaskError>;

/// Unified error type for CaskDB operations
#[derive(Debug, Error)]
pub enum CaskError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Read out of range: offset {offset} + length {length} exceeds segment size {size}")]
    OutOfRange { offset: u64, length: u64, size: u64 },

    // -------------------------------------------------------------------------
    // Record Errors
    // -------------------------------------------------------------------------
    #[error("Record too large: {what} is {len} bytes (max {max})")]
    RecordTooLarge {
        what: &'static str,
        len: usize,
        max: u64,
    },

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    // -------------------------------------------------------------------------
    // Log Errors
    // -------------------------------------------------------------------------
    #[error("Corrupt log at offset {offset}: {reason}")]
    CorruptLog { offset: u64, reason: String },

    // -------------------------------------------------------------------------
    // Engine Errors
    // -------------------------------------------------------------------------
    #[error("Engine is closed")]
    ClosedEngine,

    #[error("Data file is locked by another handle: {}", .0.display())]
    Locked(PathBuf),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
