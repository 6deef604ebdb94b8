//! Engine transactions

use std::collections::BTreeMap;

use parking_lot::RwLockReadGuard;

use crate::error::Result;
use crate::memtable::MemTableEntry;
use crate::wal::Operation;

use super::{Engine, PrefixIter};

/// Read-only transaction
///
/// Holds the engine's shared lock, so no commit or flush can interleave
/// with its reads.
pub struct ReadTxn<'a> {
    engine: &'a Engine,
    _guard: RwLockReadGuard<'a, ()>,
}

impl<'a> ReadTxn<'a> {
    pub(super) fn new(engine: &'a Engine, guard: RwLockReadGuard<'a, ()>) -> Self {
        Self {
            engine,
            _guard: guard,
        }
    }

    /// Get a value by key
    ///
    /// Search order:
    /// 1. MemTable (most recent writes)
    /// 2. SSTables (newest to oldest)
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(entry) = self.engine.memtable.get(key) {
            return Ok(entry.into_value());
        }
        self.engine.storage.get(key)
    }

    /// Iterate live entries whose key starts with `prefix`, ascending
    pub fn prefix_iter(&self, prefix: &[u8]) -> PrefixIter<'_> {
        PrefixIter::seek(&self.engine.memtable, &self.engine.storage, prefix)
    }
}

/// Read-write transaction
///
/// Writes are buffered and become visible to others only on commit.
pub struct WriteTxn<'a> {
    engine: &'a Engine,
    pending: BTreeMap<Vec<u8>, MemTableEntry>,
}

impl<'a> WriteTxn<'a> {
    pub(super) fn new(engine: &'a Engine) -> Self {
        Self {
            engine,
            pending: BTreeMap::new(),
        }
    }

    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        self.pending
            .insert(key.to_vec(), MemTableEntry::Value(value.to_vec()));
    }

    pub fn delete(&mut self, key: &[u8]) {
        self.pending.insert(key.to_vec(), MemTableEntry::Tombstone);
    }

    /// Read through this transaction's own pending writes
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(entry) = self.pending.get(key) {
            return Ok(entry.clone().into_value());
        }
        self.engine.view(|txn| txn.get(key))
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Log the buffered writes as one WAL batch and apply them
    pub(super) fn commit(self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let operations: Vec<Operation> = self
            .pending
            .into_iter()
            .map(|(key, entry)| match entry {
                MemTableEntry::Value(value) => Operation::Put { key, value },
                MemTableEntry::Tombstone => Operation::Delete { key },
            })
            .collect();

        let _guard = self.engine.txn_lock.write();
        self.engine.ensure_open()?;
        self.engine.apply_locked(operations)
    }
}
