//! Tests for StorageManager
//!
//! These tests verify:
//! - Opening and creating storage directories
//! - Flushing MemTables into numbered SSTables
//! - Newest-wins lookups across tables, tombstones included
//! - Prefix location across tables
//! - Discovery of existing tables on reopen

use std::path::PathBuf;

use tandemkv::memtable::{MemTable, MemTableEntry};
use tandemkv::storage::StorageManager;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_storage() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("sstables");
    (temp_dir, path)
}

fn memtable_with(entries: &[(&str, Option<&str>)]) -> MemTable {
    let memtable = MemTable::new();
    for (key, value) in entries {
        match value {
            Some(v) => memtable.put(key.as_bytes().to_vec(), v.as_bytes().to_vec()),
            None => memtable.delete(key.as_bytes().to_vec()),
        };
    }
    memtable
}

// =============================================================================
// Open Tests
// =============================================================================

#[test]
fn test_open_creates_directory() {
    let (_temp, path) = setup_temp_storage();

    let storage = StorageManager::open(&path).unwrap();

    assert!(path.is_dir());
    assert_eq!(storage.data_dir(), path.as_path());
    assert_eq!(storage.sstable_count(), 0);
    assert_eq!(storage.next_sstable_id(), 1);
}

#[test]
fn test_open_ignores_foreign_files() {
    let (_temp, path) = setup_temp_storage();
    std::fs::create_dir_all(&path).unwrap();
    std::fs::write(path.join("notes.txt"), b"hello").unwrap();
    std::fs::write(path.join("sstable_abc.sst"), b"junk").unwrap();

    let storage = StorageManager::open(&path).unwrap();

    assert_eq!(storage.sstable_count(), 0);
}

// =============================================================================
// Flush Tests
// =============================================================================

#[test]
fn test_flush_creates_sstable() {
    let (_temp, path) = setup_temp_storage();
    let storage = StorageManager::open(&path).unwrap();

    let table = storage
        .flush(&memtable_with(&[("a", Some("1")), ("b", Some("2"))]))
        .unwrap();

    assert_eq!(table.entry_count, 2);
    assert!(path.join("sstable_000001.sst").exists());
    assert_eq!(storage.sstable_count(), 1);
    assert_eq!(storage.next_sstable_id(), 2);
    assert_eq!(storage.get(b"a").unwrap(), Some(b"1".to_vec()));
}

#[test]
fn test_flush_empty_memtable_fails() {
    let (_temp, path) = setup_temp_storage();
    let storage = StorageManager::open(&path).unwrap();

    assert!(storage.flush(&MemTable::new()).is_err());
    assert_eq!(storage.sstable_count(), 0);
}

// =============================================================================
// Lookup Tests
// =============================================================================

#[test]
fn test_newest_table_wins() {
    let (_temp, path) = setup_temp_storage();
    let storage = StorageManager::open(&path).unwrap();

    storage
        .flush(&memtable_with(&[("k", Some("old")), ("other", Some("x"))]))
        .unwrap();
    storage.flush(&memtable_with(&[("k", Some("new"))])).unwrap();

    assert_eq!(storage.get(b"k").unwrap(), Some(b"new".to_vec()));
    assert_eq!(storage.get(b"other").unwrap(), Some(b"x".to_vec()));
    assert_eq!(storage.get(b"missing").unwrap(), None);
}

#[test]
fn test_tombstone_masks_older_value() {
    let (_temp, path) = setup_temp_storage();
    let storage = StorageManager::open(&path).unwrap();

    storage.flush(&memtable_with(&[("k", Some("v"))])).unwrap();
    storage.flush(&memtable_with(&[("k", None)])).unwrap();

    assert_eq!(storage.get(b"k").unwrap(), None);
}

// =============================================================================
// Prefix Tests
// =============================================================================

#[test]
fn test_locate_prefix_prefers_newest() {
    let (_temp, path) = setup_temp_storage();
    let storage = StorageManager::open(&path).unwrap();

    storage
        .flush(&memtable_with(&[("p/a", Some("1")), ("p/b", Some("2")), ("q", Some("3"))]))
        .unwrap();
    storage
        .flush(&memtable_with(&[("p/b", None), ("p/c", Some("4"))]))
        .unwrap();

    let located = storage.locate_prefix(b"p/");
    let keys: Vec<_> = located.keys().cloned().collect();
    assert_eq!(keys, vec![b"p/a".to_vec(), b"p/b".to_vec(), b"p/c".to_vec()]);

    assert_eq!(located[b"p/a".as_slice()].table_id, 1);
    assert_eq!(located[b"p/b".as_slice()].table_id, 2);

    assert_eq!(
        storage.read_location(located[b"p/a".as_slice()]).unwrap(),
        MemTableEntry::Value(b"1".to_vec())
    );
    assert_eq!(
        storage.read_location(located[b"p/b".as_slice()]).unwrap(),
        MemTableEntry::Tombstone
    );
}

// =============================================================================
// Reopen Tests
// =============================================================================

#[test]
fn test_reopen_discovers_tables() {
    let (_temp, path) = setup_temp_storage();

    {
        let storage = StorageManager::open(&path).unwrap();
        storage.flush(&memtable_with(&[("k", Some("v1"))])).unwrap();
        storage.flush(&memtable_with(&[("k", Some("v2"))])).unwrap();
    }

    let storage = StorageManager::open(&path).unwrap();

    assert_eq!(storage.sstable_count(), 2);
    assert_eq!(storage.next_sstable_id(), 3);
    assert_eq!(storage.get(b"k").unwrap(), Some(b"v2".to_vec()));
}

#[test]
fn test_reopen_with_corrupt_table_fails() {
    let (_temp, path) = setup_temp_storage();

    {
        let storage = StorageManager::open(&path).unwrap();
        storage.flush(&memtable_with(&[("k", Some("v"))])).unwrap();
    }
    std::fs::write(path.join("sstable_000001.sst"), vec![0u8; 64]).unwrap();

    assert!(StorageManager::open(&path).is_err());
}
