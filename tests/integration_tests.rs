//! Integration tests for CaskDB
//!
//! End-to-end workflows that cross module boundaries: engine writes,
//! offline verification, compaction and reopen.

use std::fs::{self, OpenOptions};
use std::io::Write;

use caskdb::storage::{LogSegment, Recovery};
use caskdb::{CaskError, Config, Engine, SyncStrategy};
use tempfile::TempDir;

// =============================================================================
// Workflow Tests
// =============================================================================

#[test]
fn test_write_crash_verify_reopen_compact() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("data").join("cask.log");

    // Session 1: mixed workload, then "crash" mid-append
    {
        let config = Config::builder()
            .path(&path)
            .sync_strategy(SyncStrategy::EveryNEntries { count: 16 })
            .build();
        let engine = Engine::open_with(config).unwrap();
        for i in 0..50 {
            engine.put(format!("user:{}", i).as_bytes(), b"v1").unwrap();
        }
        for i in 0..50 {
            engine.put(format!("user:{}", i).as_bytes(), b"v2").unwrap();
        }
        for i in 40..50 {
            engine.delete(format!("user:{}", i).as_bytes()).unwrap();
        }
        engine.close().unwrap();
    }
    let clean_len = fs::metadata(&path).unwrap().len();
    {
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0x01, 0x02, 0x03]).unwrap();
    }

    // Offline check reports the torn tail without repairing it
    let report = Recovery::verify(&path).unwrap();
    assert_eq!(report.records_scanned, 110);
    assert_eq!(report.live_keys, 40);
    assert!(report.was_truncated);
    assert_eq!(report.discarded_bytes, 3);
    assert_eq!(fs::metadata(&path).unwrap().len(), clean_len + 3);

    // Session 2: open repairs, compaction shrinks
    {
        let engine = Engine::open(&path).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), clean_len);
        assert_eq!(engine.len().unwrap(), 40);

        let result = engine.compact().unwrap();
        assert_eq!(result.bytes_before, clean_len);
        assert_eq!(result.records_kept, 40);
        engine.close().unwrap();
    }

    // Session 3: compacted log holds exactly the live set
    let report = Recovery::verify(&path).unwrap();
    assert_eq!(report.records_scanned, 40);
    assert_eq!(report.tombstones, 0);
    assert!(!report.was_truncated);

    let engine = Engine::open(&path).unwrap();
    for i in 0..40 {
        let value = engine.get(format!("user:{}", i).as_bytes()).unwrap();
        assert_eq!(value.as_deref(), Some(&b"v2"[..]));
    }
    for i in 40..50 {
        assert_eq!(engine.get(format!("user:{}", i).as_bytes()).unwrap(), None);
    }
}

#[test]
fn test_scan_matches_engine_history() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("cask.log");

    {
        let engine = Engine::open(&path).unwrap();
        engine.put(b"a", b"1").unwrap();
        engine.put(b"b", b"2").unwrap();
        engine.delete(b"a").unwrap();
        engine.put(b"a", b"3").unwrap();
        engine.close().unwrap();
    }

    let segment = LogSegment::open_read_only(&path, 0).unwrap();
    let history: Vec<(Vec<u8>, Option<Vec<u8>>)> = Recovery::scan(&segment)
        .map(|item| {
            let scanned = item.unwrap();
            (
                scanned.record.key().to_vec(),
                scanned.record.value().map(|v| v.to_vec()),
            )
        })
        .collect();

    assert_eq!(
        history,
        vec![
            (b"a".to_vec(), Some(b"1".to_vec())),
            (b"b".to_vec(), Some(b"2".to_vec())),
            (b"a".to_vec(), None),
            (b"a".to_vec(), Some(b"3".to_vec())),
        ]
    );
}

#[test]
fn test_verify_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("absent.log");

    let err = Recovery::verify(&path).unwrap_err();

    assert!(matches!(err, CaskError::Io(_)));
    assert!(!path.exists());
}
