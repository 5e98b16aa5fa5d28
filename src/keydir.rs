//! Key Directory
//!
//! In-memory index from key to the location of its latest live record.
//! Holds no values and no file handles, only coordinates. Never persisted:
//! recovery rebuilds it on every open.

use std::collections::hash_map::{self, HashMap};

use bytes::Bytes;

/// Where a full encoded record (header + key + value) lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordPointer {
    /// Segment holding the record
    pub segment_id: u32,

    /// Offset of the record header
    pub offset: u64,

    /// Total encoded length
    pub length: u64,

    /// Record timestamp (informational)
    pub timestamp: u32,
}

/// Hash index over live keys
///
/// Not synchronized; the engine guards it together with the segment.
#[derive(Debug, Default)]
pub struct KeyDir {
    entries: HashMap<Bytes, RecordPointer>,
}

impl KeyDir {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite; returns the previous pointer
    pub fn set(&mut self, key: Bytes, pointer: RecordPointer) -> Option<RecordPointer> {
        self.entries.insert(key, pointer)
    }

    pub fn get(&self, key: &[u8]) -> Option<RecordPointer> {
        self.entries.get(key).copied()
    }

    /// Remove `key`; absent keys are a no-op
    pub fn delete(&mut self, key: &[u8]) -> Option<RecordPointer> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in arbitrary order
    pub fn keys(&self) -> hash_map::Keys<'_, Bytes, RecordPointer> {
        self.entries.keys()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, Bytes, RecordPointer> {
        self.entries.iter()
    }
}
