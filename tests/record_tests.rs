//! Tests for the record codec
//!
//! These tests verify:
//! - Round-trip encoding for puts and tombstones
//! - Exact byte layout against hand-assembled golden records
//! - CRC32 corruption detection
//! - Malformed buffers (short, truncated, trailing bytes)

use bytes::Bytes;
use caskdb::storage::{
    checksum, encode_record, Operation, Record, RecordHeader, HEADER_SIZE, TOMBSTONE_MARKER,
};
use caskdb::CaskError;

// =============================================================================
// Golden Records
// =============================================================================
// Assembled independently of this crate (CRC32/IEEE as computed by zlib).

/// put("k", "v") at timestamp 0x01020304
const GOLDEN_PUT: [u8; 18] = [
    0x9a, 0x74, 0xb6, 0x7e, // crc32("kv")
    0x04, 0x03, 0x02, 0x01, // timestamp
    0x01, 0x00, 0x00, 0x00, // key_size
    0x01, 0x00, 0x00, 0x00, // value_size
    b'k', b'v',
];

/// tombstone("gone") at timestamp 0
const GOLDEN_TOMBSTONE: [u8; 20] = [
    0x45, 0x4f, 0x98, 0x02, // crc32("gone")
    0x00, 0x00, 0x00, 0x00, // timestamp
    0x04, 0x00, 0x00, 0x00, // key_size
    0xff, 0xff, 0xff, 0xff, // tombstone marker
    b'g', b'o', b'n', b'e',
];

/// put("empty", "") at timestamp 1_700_000_000
const GOLDEN_EMPTY_VALUE: [u8; 21] = [
    0xc4, 0x3d, 0xc7, 0x68, // crc32("empty")
    0x00, 0xf1, 0x53, 0x65, // timestamp
    0x05, 0x00, 0x00, 0x00, // key_size
    0x00, 0x00, 0x00, 0x00, // value_size
    b'e', b'm', b'p', b't', b'y',
];

// =============================================================================
// Layout Tests
// =============================================================================

#[test]
fn test_encode_put_matches_golden_bytes() {
    let encoded = Record::put(b"k".to_vec(), b"v".to_vec(), 0x0102_0304)
        .encode()
        .unwrap();
    assert_eq!(&encoded[..], &GOLDEN_PUT[..]);
}

#[test]
fn test_encode_tombstone_matches_golden_bytes() {
    let encoded = Record::tombstone(b"gone".to_vec(), 0).encode().unwrap();
    assert_eq!(&encoded[..], &GOLDEN_TOMBSTONE[..]);
}

#[test]
fn test_encode_empty_value_matches_golden_bytes() {
    let encoded = encode_record(b"empty", Some(&b""[..]), 1_700_000_000).unwrap();
    assert_eq!(&encoded[..], &GOLDEN_EMPTY_VALUE[..]);
}

#[test]
fn test_decode_golden_records() {
    let put = Record::decode(&GOLDEN_PUT).unwrap();
    assert_eq!(put.timestamp, 0x0102_0304);
    assert_eq!(put.key(), b"k");
    assert_eq!(put.value(), Some(&b"v"[..]));

    let tombstone = Record::decode(&GOLDEN_TOMBSTONE).unwrap();
    assert!(tombstone.is_tombstone());
    assert_eq!(tombstone.key(), b"gone");
    assert_eq!(tombstone.value(), None);

    let empty = Record::decode(&GOLDEN_EMPTY_VALUE).unwrap();
    assert!(!empty.is_tombstone());
    assert_eq!(empty.value(), Some(&b""[..]));
}

#[test]
fn test_header_decode() {
    let header = RecordHeader::decode(&GOLDEN_TOMBSTONE).unwrap();
    assert_eq!(header.checksum, checksum(b"gone", b""));
    assert_eq!(header.key_size, 4);
    assert_eq!(header.value_size, TOMBSTONE_MARKER);
    assert!(header.is_tombstone());
    assert_eq!(header.value_len(), 0);
    assert_eq!(header.record_len(), GOLDEN_TOMBSTONE.len() as u64);
}

#[test]
fn test_encoded_len() {
    let put = Record::put(b"hello".to_vec(), b"world".to_vec(), 1);
    assert_eq!(put.encoded_len(), HEADER_SIZE as u64 + 10);
    assert_eq!(put.encode().unwrap().len() as u64, put.encoded_len());

    let tombstone = Record::tombstone(b"hello".to_vec(), 1);
    assert_eq!(tombstone.encoded_len(), HEADER_SIZE as u64 + 5);
}

// =============================================================================
// Round-Trip Tests
// =============================================================================

#[test]
fn test_roundtrip_put() {
    let record = Record::put(b"hello".to_vec(), b"world".to_vec(), 1_700_000_000);
    let decoded = Record::decode(&record.encode().unwrap()).unwrap();
    assert_eq!(decoded, record);
}

#[test]
fn test_roundtrip_edge_cases() {
    let records = [
        Record::put(Vec::<u8>::new(), b"empty key".to_vec(), 0),
        Record::put(b"empty value".to_vec(), Vec::<u8>::new(), u32::MAX),
        Record::put(vec![0u8, 255, 0, 255], vec![0xFF; 4096], 7),
        Record::tombstone(Vec::<u8>::new(), 3),
        Record::tombstone(b"key".to_vec(), 42),
    ];

    for record in records {
        let decoded = Record::decode(&record.encode().unwrap()).unwrap();
        assert_eq!(decoded, record);
    }
}

#[test]
fn test_decode_bytes_shares_buffer() {
    let encoded = Record::put(b"key".to_vec(), b"value".to_vec(), 9)
        .encode()
        .unwrap();
    let record = Record::decode_bytes(encoded).unwrap();

    match record.operation {
        Operation::Put { key, value } => {
            assert_eq!(key, Bytes::from_static(b"key"));
            assert_eq!(value, Bytes::from_static(b"value"));
        }
        Operation::Delete { .. } => panic!("expected a put"),
    }
}

// =============================================================================
// Corruption Detection Tests
// =============================================================================

#[test]
fn test_every_single_bit_flip_in_payload_is_detected() {
    let encoded = Record::put(b"some-key".to_vec(), b"some-value".to_vec(), 5)
        .encode()
        .unwrap()
        .to_vec();

    for byte in HEADER_SIZE..encoded.len() {
        for bit in 0..8 {
            let mut corrupted = encoded.clone();
            corrupted[byte] ^= 1 << bit;
            let err = Record::decode(&corrupted).unwrap_err();
            assert!(
                matches!(err, CaskError::ChecksumMismatch { .. }),
                "byte {} bit {}: {:?}",
                byte,
                bit,
                err
            );
        }
    }
}

#[test]
fn test_checksum_field_corruption_detected() {
    let mut corrupted = GOLDEN_PUT;
    corrupted[0] ^= 0xFF;
    let err = Record::decode(&corrupted).unwrap_err();
    assert!(matches!(err, CaskError::ChecksumMismatch { .. }));
}

#[test]
fn test_tombstone_key_corruption_detected() {
    let mut corrupted = GOLDEN_TOMBSTONE;
    corrupted[HEADER_SIZE] ^= 0x01;
    let err = Record::decode(&corrupted).unwrap_err();
    assert!(matches!(err, CaskError::ChecksumMismatch { .. }));
}

// =============================================================================
// Malformed Buffer Tests
// =============================================================================

#[test]
fn test_decode_shorter_than_header() {
    let err = Record::decode(&GOLDEN_PUT[..HEADER_SIZE - 1]).unwrap_err();
    assert!(matches!(err, CaskError::MalformedRecord(_)));

    let err = Record::decode(&[]).unwrap_err();
    assert!(matches!(err, CaskError::MalformedRecord(_)));
}

#[test]
fn test_decode_truncated_payload() {
    let err = Record::decode(&GOLDEN_PUT[..GOLDEN_PUT.len() - 1]).unwrap_err();
    assert!(matches!(err, CaskError::MalformedRecord(_)));
}

#[test]
fn test_decode_trailing_bytes() {
    let mut buf = GOLDEN_PUT.to_vec();
    buf.push(0);
    let err = Record::decode(&buf).unwrap_err();
    assert!(matches!(err, CaskError::MalformedRecord(_)));
}

#[test]
fn test_decode_inflated_key_size() {
    let mut corrupted = GOLDEN_PUT;
    corrupted[8] = 0x02; // key_size 1 -> 2
    let err = Record::decode(&corrupted).unwrap_err();
    assert!(matches!(err, CaskError::MalformedRecord(_)));
}
