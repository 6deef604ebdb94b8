//! Tests for WAL Recovery
//!
//! These tests verify:
//! - Recovery from a clean WAL (no corruption)
//! - Recovery from an empty WAL
//! - Recovery with partial writes (truncated tail)
//! - Recovery with corrupted entries (CRC mismatch)
//! - Verify mode (stats only, file untouched)
//! - Entry encoding edge cases

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use tandemkv::config::WalSyncStrategy;
use tandemkv::wal::{Operation, WalEntry, WalRecovery, WalWriter, HEADER_SIZE};
use tandemkv::TandemError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.wal");
    (temp_dir, wal_path)
}

/// Write entries using WalWriter (produces a well-formed WAL)
fn write_entries_via_writer(path: &PathBuf, count: usize) {
    let mut writer = WalWriter::open(path, WalSyncStrategy::EveryWrite).unwrap();
    for i in 0..count {
        writer
            .append(Operation::Put {
                key: format!("key{}", i).into_bytes(),
                value: format!("value{}", i).into_bytes(),
            })
            .unwrap();
    }
}

/// Write raw serialized entries directly to a file (for crafting corruption)
fn write_raw_entries(path: &PathBuf, entries: &[WalEntry]) {
    let mut file = File::create(path).unwrap();
    for entry in entries {
        file.write_all(&entry.serialize().unwrap()).unwrap();
    }
    file.sync_all().unwrap();
}

fn entry(lsn: u64, key: &str) -> WalEntry {
    WalEntry::new(
        lsn,
        vec![Operation::Put {
            key: key.as_bytes().to_vec(),
            value: b"v".to_vec(),
        }],
    )
}

// =============================================================================
// Clean WAL Tests
// =============================================================================

#[test]
fn test_recover_empty_file() {
    let (_temp, wal_path) = setup_temp_wal();
    File::create(&wal_path).unwrap();

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert!(entries.is_empty());
    assert_eq!(result.entries_recovered, 0);
    assert_eq!(result.entries_corrupted, 0);
    assert_eq!(result.last_lsn, 0);
    assert!(!result.was_truncated);
}

#[test]
fn test_recover_clean_wal() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 50);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 50);
    assert_eq!(result.entries_recovered, 50);
    assert_eq!(result.last_lsn, 50);
    assert!(!result.was_truncated);
    assert_eq!(entries[49].operations[0].key(), b"key49");
}

#[test]
fn test_recover_missing_file_is_io_error() {
    let (_temp, wal_path) = setup_temp_wal();

    let err = WalRecovery::recover(&wal_path).unwrap_err();
    assert!(matches!(err, TandemError::Io(_)));
}

// =============================================================================
// Partial Write Tests
// =============================================================================

#[test]
fn test_recover_truncated_header() {
    let (_temp, wal_path) = setup_temp_wal();
    write_raw_entries(&wal_path, &[entry(1, "a"), entry(2, "b")]);
    let clean_len = std::fs::metadata(&wal_path).unwrap().len();

    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&[0u8; HEADER_SIZE / 2]).unwrap();
    drop(file);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(result.entries_corrupted, 1);
    assert_eq!(result.last_lsn, 2);
    assert!(result.was_truncated);
    assert_eq!(std::fs::metadata(&wal_path).unwrap().len(), clean_len);
}

#[test]
fn test_recover_truncated_body() {
    let (_temp, wal_path) = setup_temp_wal();
    let first = entry(1, "a").serialize().unwrap();
    let second = entry(2, "b").serialize().unwrap();

    let mut file = File::create(&wal_path).unwrap();
    file.write_all(&first).unwrap();
    file.write_all(&second[..second.len() - 3]).unwrap();
    drop(file);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(result.last_lsn, 1);
    assert!(result.was_truncated);
    assert_eq!(std::fs::metadata(&wal_path).unwrap().len(), first.len() as u64);
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_recover_crc_mismatch_stops_replay() {
    let (_temp, wal_path) = setup_temp_wal();
    let first = entry(1, "a").serialize().unwrap();
    let mut second = entry(2, "b").serialize().unwrap();
    let third = entry(3, "c").serialize().unwrap();

    let last = second.len() - 1;
    second[last] ^= 0xFF;

    let mut file = File::create(&wal_path).unwrap();
    file.write_all(&first).unwrap();
    file.write_all(&second).unwrap();
    file.write_all(&third).unwrap();
    drop(file);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    // Nothing after the first bad record is trusted
    assert_eq!(entries.len(), 1);
    assert_eq!(result.entries_corrupted, 1);
    assert!(result.was_truncated);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();
    assert_eq!(entries.len(), 1);
    assert!(!result.was_truncated);
}

#[test]
fn test_writer_appends_after_recovered_tail() {
    let (_temp, wal_path) = setup_temp_wal();
    write_raw_entries(&wal_path, &[entry(1, "a"), entry(2, "b")]);
    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(b"garbage").unwrap();
    drop(file);

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    assert_eq!(writer.append(Operation::Delete { key: b"a".to_vec() }).unwrap(), 3);
    drop(writer);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(result.entries_corrupted, 0);
}

// =============================================================================
// Verify Tests
// =============================================================================

#[test]
fn test_verify_does_not_modify_file() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 3);
    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&[1, 2, 3]).unwrap();
    drop(file);
    let len_before = std::fs::metadata(&wal_path).unwrap().len();

    let result = WalRecovery::verify(&wal_path).unwrap();

    assert_eq!(result.entries_recovered, 3);
    assert_eq!(result.entries_corrupted, 1);
    assert!(!result.was_truncated);
    assert_eq!(std::fs::metadata(&wal_path).unwrap().len(), len_before);
}

// =============================================================================
// Entry Encoding Tests
// =============================================================================

#[test]
fn test_entry_deserialize_reports_consumed_bytes() {
    let original = entry(7, "key");
    let mut bytes = original.serialize().unwrap();
    let encoded_len = bytes.len();
    bytes.extend_from_slice(b"trailing");

    let (decoded, consumed) = WalEntry::deserialize(&bytes).unwrap();

    assert_eq!(decoded, original);
    assert_eq!(consumed, encoded_len);
}

#[test]
fn test_entry_crc_binds_lsn() {
    let mut bytes = entry(1, "key").serialize().unwrap();
    // Rewrite the LSN field without touching the checksum
    bytes[0..8].copy_from_slice(&2u64.to_le_bytes());

    let err = WalEntry::deserialize(&bytes).unwrap_err();
    assert!(matches!(err, TandemError::WalCorruption(_)));
}

#[test]
fn test_entry_short_input_is_corruption() {
    let err = WalEntry::deserialize(&[0u8; 4]).unwrap_err();
    assert!(matches!(err, TandemError::WalCorruption(_)));
}
