//! MemTable Tests
//!
//! Tests verify:
//! - Basic CRUD operations
//! - Size tracking
//! - Tombstone handling
//! - Sorted iteration and prefix snapshots
//! - Clear functionality
//! - Concurrent access patterns

use std::sync::Arc;
use std::thread;

use tandemkv::memtable::{MemTable, MemTableEntry};

fn value(v: &[u8]) -> Option<MemTableEntry> {
    Some(MemTableEntry::Value(v.to_vec()))
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_new_memtable_is_empty() {
    let memtable = MemTable::new();
    assert_eq!(memtable.entry_count(), 0);
    assert_eq!(memtable.size(), 0);
    assert!(memtable.is_empty());
}

#[test]
fn test_put_and_get() {
    let memtable = MemTable::new();

    memtable.put(b"key1".to_vec(), b"value1".to_vec());

    assert_eq!(memtable.get(b"key1"), value(b"value1"));
    assert_eq!(memtable.get(b"nonexistent"), None);
}

#[test]
fn test_put_overwrites_existing() {
    let memtable = MemTable::new();

    memtable.put(b"key".to_vec(), b"old".to_vec());
    memtable.put(b"key".to_vec(), b"new".to_vec());

    assert_eq!(memtable.entry_count(), 1);
    assert_eq!(memtable.get(b"key"), value(b"new"));
}

// =============================================================================
// Tombstone Tests
// =============================================================================

#[test]
fn test_delete_leaves_tombstone() {
    let memtable = MemTable::new();

    memtable.put(b"key".to_vec(), b"value".to_vec());
    memtable.delete(b"key".to_vec());

    assert_eq!(memtable.get(b"key"), Some(MemTableEntry::Tombstone));
    assert_eq!(memtable.entry_count(), 1);
    assert!(!memtable.is_empty());
}

#[test]
fn test_delete_unknown_key_still_recorded() {
    let memtable = MemTable::new();

    memtable.delete(b"ghost".to_vec());

    assert_eq!(memtable.get(b"ghost"), Some(MemTableEntry::Tombstone));
}

#[test]
fn test_entry_into_value() {
    assert_eq!(MemTableEntry::Value(b"v".to_vec()).into_value(), Some(b"v".to_vec()));
    assert_eq!(MemTableEntry::Tombstone.into_value(), None);
}

// =============================================================================
// Size Tracking Tests
// =============================================================================

#[test]
fn test_size_counts_key_and_value() {
    let memtable = MemTable::new();

    let size = memtable.put(b"key".to_vec(), b"value".to_vec());

    assert_eq!(size, 8);
    assert_eq!(memtable.size(), 8);
}

#[test]
fn test_size_tracks_overwrite_delta() {
    let memtable = MemTable::new();

    memtable.put(b"k".to_vec(), b"12345".to_vec());
    assert_eq!(memtable.size(), 6);

    memtable.put(b"k".to_vec(), b"12".to_vec());
    assert_eq!(memtable.size(), 3);

    memtable.put(b"k".to_vec(), b"1234567890".to_vec());
    assert_eq!(memtable.size(), 11);

    memtable.delete(b"k".to_vec());
    assert_eq!(memtable.size(), 1);
}

#[test]
fn test_should_flush() {
    let memtable = MemTable::new();

    memtable.put(b"key".to_vec(), vec![0u8; 97]);

    assert!(memtable.should_flush(100));
    assert!(!memtable.should_flush(101));
}

// =============================================================================
// Iteration Tests
// =============================================================================

#[test]
fn test_iter_is_sorted() {
    let memtable = MemTable::new();

    memtable.put(b"c".to_vec(), b"3".to_vec());
    memtable.put(b"a".to_vec(), b"1".to_vec());
    memtable.delete(b"b".to_vec());

    let entries: Vec<_> = memtable.iter().collect();

    assert_eq!(
        entries,
        vec![
            (b"a".to_vec(), MemTableEntry::Value(b"1".to_vec())),
            (b"b".to_vec(), MemTableEntry::Tombstone),
            (b"c".to_vec(), MemTableEntry::Value(b"3".to_vec())),
        ]
    );
}

#[test]
fn test_iter_is_a_snapshot() {
    let memtable = MemTable::new();
    memtable.put(b"a".to_vec(), b"1".to_vec());

    let iter = memtable.iter();
    memtable.put(b"b".to_vec(), b"2".to_vec());

    assert_eq!(iter.count(), 1);
}

#[test]
fn test_entries_with_prefix() {
    let memtable = MemTable::new();

    memtable.put(b"user/1".to_vec(), b"alice".to_vec());
    memtable.put(b"user/2".to_vec(), b"bob".to_vec());
    memtable.delete(b"user/3".to_vec());
    memtable.put(b"users".to_vec(), b"x".to_vec());
    memtable.put(b"order/1".to_vec(), b"y".to_vec());

    let entries = memtable.entries_with_prefix(b"user/");
    let keys: Vec<_> = entries.iter().map(|(k, _)| k.as_slice()).collect();

    assert_eq!(keys, vec![b"user/1".as_slice(), b"user/2", b"user/3"]);
    assert_eq!(entries[2].1, MemTableEntry::Tombstone);
}

#[test]
fn test_entries_with_empty_prefix_returns_all() {
    let memtable = MemTable::new();

    for i in 0..10 {
        memtable.put(format!("k{}", i).into_bytes(), b"v".to_vec());
    }

    assert_eq!(memtable.entries_with_prefix(b"").len(), 10);
}

// =============================================================================
// Clear Tests
// =============================================================================

#[test]
fn test_clear() {
    let memtable = MemTable::new();

    memtable.put(b"a".to_vec(), b"1".to_vec());
    memtable.delete(b"b".to_vec());
    memtable.clear();

    assert!(memtable.is_empty());
    assert_eq!(memtable.size(), 0);
    assert_eq!(memtable.get(b"a"), None);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_writers() {
    let memtable = Arc::new(MemTable::new());
    let mut handles = Vec::new();

    for t in 0..4 {
        let memtable = Arc::clone(&memtable);
        handles.push(thread::spawn(move || {
            for i in 0..250 {
                memtable.put(format!("t{}-k{:03}", t, i).into_bytes(), b"v".to_vec());
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(memtable.entry_count(), 1000);
    // Each key is 7 bytes, each value 1
    assert_eq!(memtable.size(), 1000 * 8);
}
