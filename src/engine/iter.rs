//! Prefix iteration across memtable and SSTables

use std::collections::btree_map;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::memtable::{MemTable, MemTableEntry};
use crate::storage::{StorageManager, TableLocation};

enum Source {
    Memtable(MemTableEntry),
    Table(TableLocation),
}

/// Live `(key, value)` pairs under a prefix, in ascending key order
///
/// The key set is resolved at seek time with the newest source winning;
/// table values are read as the iterator advances.
pub struct PrefixIter<'a> {
    storage: &'a StorageManager,
    inner: btree_map::IntoIter<Vec<u8>, Source>,
}

impl<'a> PrefixIter<'a> {
    pub(super) fn seek(memtable: &MemTable, storage: &'a StorageManager, prefix: &[u8]) -> Self {
        let mut merged: BTreeMap<Vec<u8>, Source> = storage
            .locate_prefix(prefix)
            .into_iter()
            .map(|(key, loc)| (key, Source::Table(loc)))
            .collect();

        for (key, entry) in memtable.entries_with_prefix(prefix) {
            merged.insert(key, Source::Memtable(entry));
        }

        Self {
            storage,
            inner: merged.into_iter(),
        }
    }
}

impl Iterator for PrefixIter<'_> {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (key, source) = self.inner.next()?;
            let entry = match source {
                Source::Memtable(entry) => entry,
                Source::Table(loc) => match self.storage.read_location(loc) {
                    Ok(entry) => entry,
                    Err(e) => return Some(Err(e)),
                },
            };
            if let MemTableEntry::Value(value) = entry {
                return Some(Ok((key, value)));
            }
        }
    }
}
