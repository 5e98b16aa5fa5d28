//! Record codec
//!
//! Pure encode/decode of a single log record. No I/O, no state.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{CaskError, Result};

/// Header size: checksum (4) + timestamp (4) + key_size (4) + value_size (4)
pub const HEADER_SIZE: usize = 16;

/// `value_size` sentinel marking a tombstone (no value bytes follow)
pub const TOMBSTONE_MARKER: u32 = u32::MAX;

/// Largest key the header can describe
pub const MAX_KEY_SIZE: u32 = u32::MAX;

/// Largest value the header can describe (the top value is the tombstone marker)
pub const MAX_VALUE_SIZE: u32 = TOMBSTONE_MARKER - 1;

/// What a record does to its key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: Bytes, value: Bytes },

    /// Delete a key (tombstone)
    Delete { key: Bytes },
}

impl Operation {
    pub fn key(&self) -> &Bytes {
        match self {
            Operation::Put { key, .. } | Operation::Delete { key } => key,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self, Operation::Delete { .. })
    }
}

/// A decoded log record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Creation time, whole seconds since the Unix epoch
    pub timestamp: u32,

    /// The operation carried by this record
    pub operation: Operation,
}

impl Record {
    pub fn new(timestamp: u32, operation: Operation) -> Self {
        Self {
            timestamp,
            operation,
        }
    }

    /// A live key-value record
    pub fn put(key: impl Into<Bytes>, value: impl Into<Bytes>, timestamp: u32) -> Self {
        Self::new(
            timestamp,
            Operation::Put {
                key: key.into(),
                value: value.into(),
            },
        )
    }

    /// A tombstone for `key`
    pub fn tombstone(key: impl Into<Bytes>, timestamp: u32) -> Self {
        Self::new(timestamp, Operation::Delete { key: key.into() })
    }

    pub fn key(&self) -> &[u8] {
        self.operation.key()
    }

    /// The value, or `None` for a tombstone
    pub fn value(&self) -> Option<&[u8]> {
        match &self.operation {
            Operation::Put { value, .. } => Some(&value[..]),
            Operation::Delete { .. } => None,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        self.operation.is_tombstone()
    }

    /// Total bytes this record occupies on disk
    pub fn encoded_len(&self) -> u64 {
        let value_len = self.value().map_or(0, |v| v.len() as u64);
        HEADER_SIZE as u64 + self.key().len() as u64 + value_len
    }

    /// Encode to the exact on-disk byte layout.
    pub fn encode(&self) -> Result<Bytes> {
        encode_record(self.key(), self.value(), self.timestamp)
    }

    /// Decode a buffer holding exactly one encoded record.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        Self::decode_bytes(Bytes::copy_from_slice(buf))
    }

    /// Decode from an owned buffer; key and value share its allocation.
    pub fn decode_bytes(buf: Bytes) -> Result<Self> {
        let header = RecordHeader::decode(&buf)?;
        let expected = header.record_len();
        if (buf.len() as u64) != expected {
            return Err(CaskError::MalformedRecord(format!(
                "record declares {} bytes but buffer holds {}",
                expected,
                buf.len()
            )));
        }

        let key_end = HEADER_SIZE + header.key_size as usize;
        let key = buf.slice(HEADER_SIZE..key_end);
        let value = buf.slice(key_end..);

        let computed = checksum(&key, &value);
        if computed != header.checksum {
            return Err(CaskError::ChecksumMismatch {
                stored: header.checksum,
                computed,
            });
        }

        let operation = if header.is_tombstone() {
            Operation::Delete { key }
        } else {
            Operation::Put { key, value }
        };
        Ok(Self::new(header.timestamp, operation))
    }
}

/// The fixed 16-byte record header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub checksum: u32,
    pub timestamp: u32,
    pub key_size: u32,
    pub value_size: u32,
}

impl RecordHeader {
    /// Parse the header from the first `HEADER_SIZE` bytes of `buf`
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(CaskError::MalformedRecord(format!(
                "buffer of {} bytes is shorter than the {}-byte header",
                buf.len(),
                HEADER_SIZE
            )));
        }

        let mut cursor = &buf[..HEADER_SIZE];
        Ok(Self {
            checksum: cursor.get_u32_le(),
            timestamp: cursor.get_u32_le(),
            key_size: cursor.get_u32_le(),
            value_size: cursor.get_u32_le(),
        })
    }

    fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.checksum);
        buf.put_u32_le(self.timestamp);
        buf.put_u32_le(self.key_size);
        buf.put_u32_le(self.value_size);
    }

    pub fn is_tombstone(&self) -> bool {
        self.value_size == TOMBSTONE_MARKER
    }

    /// Number of value bytes following the key
    pub fn value_len(&self) -> u64 {
        if self.is_tombstone() {
            0
        } else {
            self.value_size as u64
        }
    }

    /// Header + key + value
    pub fn record_len(&self) -> u64 {
        HEADER_SIZE as u64 + self.key_size as u64 + self.value_len()
    }
}

/// Encode one record from borrowed parts; `value` is `None` for a tombstone.
///
/// Fails with `RecordTooLarge` before producing any bytes if the key or value
/// cannot be described by the 32-bit header fields.
pub fn encode_record(key: &[u8], value: Option<&[u8]>, timestamp: u32) -> Result<Bytes> {
    validate_lengths(key.len(), value.map(<[u8]>::len))?;

    let value_bytes = value.unwrap_or_default();
    let header = RecordHeader {
        checksum: checksum(key, value_bytes),
        timestamp,
        key_size: key.len() as u32,
        value_size: value.map_or(TOMBSTONE_MARKER, |v| v.len() as u32),
    };

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + key.len() + value_bytes.len());
    header.write_to(&mut buf);
    buf.put_slice(key);
    buf.put_slice(value_bytes);
    Ok(buf.freeze())
}

/// CRC32 over `key ++ value`
pub fn checksum(key: &[u8], value: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(key);
    hasher.update(value);
    hasher.finalize()
}

/// Current time as a record timestamp (seconds, saturating at `u32::MAX`)
pub fn now_timestamp() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u32::try_from(d.as_secs()).unwrap_or(u32::MAX))
        .unwrap_or(0)
}

/// Check key/value lengths against the header field widths.
/// `value_len` is `None` for a tombstone.
pub(crate) fn validate_lengths(key_len: usize, value_len: Option<usize>) -> Result<()> {
    if key_len as u64 > MAX_KEY_SIZE as u64 {
        return Err(CaskError::RecordTooLarge {
            what: "key",
            len: key_len,
            max: MAX_KEY_SIZE as u64,
        });
    }
    if let Some(len) = value_len {
        if len as u64 > MAX_VALUE_SIZE as u64 {
            return Err(CaskError::RecordTooLarge {
                what: "value",
                len,
                max: MAX_VALUE_SIZE as u64,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_lengths_accepts_limits() {
        validate_lengths(0, Some(0)).unwrap();
        validate_lengths(0, None).unwrap();
        validate_lengths(MAX_KEY_SIZE as usize, Some(MAX_VALUE_SIZE as usize)).unwrap();
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_validate_lengths_rejects_oversized_key() {
        let err = validate_lengths(MAX_KEY_SIZE as usize + 1, Some(1)).unwrap_err();
        assert!(matches!(err, CaskError::RecordTooLarge { what: "key", .. }));
    }

    #[test]
    fn test_validate_lengths_rejects_sentinel_sized_value() {
        // A value of exactly u32::MAX bytes would collide with the tombstone marker
        let err = validate_lengths(1, Some(TOMBSTONE_MARKER as usize)).unwrap_err();
        assert!(matches!(err, CaskError::RecordTooLarge { what: "value", .. }));
    }

    #[test]
    fn test_header_layout_is_little_endian() {
        let encoded = Record::put(&b"k"[..], &b"v"[..], 0x0102_0304).encode().unwrap();
        assert_eq!(&encoded[4..8], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&encoded[8..12], &[1, 0, 0, 0]);
        assert_eq!(&encoded[12..16], &[1, 0, 0, 0]);
    }

    #[test]
    fn test_now_timestamp_is_recent() {
        // 2020-01-01T00:00:00Z
        assert!(now_timestamp() > 1_577_836_800);
    }
}
