//! Engine Module
//!
//! The embedded storage engine that coordinates all components.
//!
//! ## Responsibilities
//! - Coordinate WAL, MemTable, and Storage
//! - Read-only and read-write transactions
//! - Trigger flushes when MemTable is full
//! - Manage crash recovery on startup

mod iter;
mod txn;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::config::EngineConfig;
use crate::error::{Result, TandemError};
use crate::memtable::MemTable;
use crate::storage::StorageManager;
use crate::wal::{Operation, WalRecovery, WalWriter};

pub use iter::PrefixIter;
pub use txn::{ReadTxn, WriteTxn};

/// The embedded storage engine
///
/// ## Concurrency Model
///
/// - **Read transactions** hold `txn_lock` shared for their whole lifetime,
///   so memtable and SSTables are seen as one consistent snapshot.
/// - **Write transactions** buffer their operations without any lock and
///   take `txn_lock` exclusively only to commit: one WAL batch, then the
///   memtable, then a flush if the memtable grew past its limit.
///
/// `StorageManager` still takes its internal write lock for SSTable reads
/// (the readers seek a shared file handle).
pub struct Engine {
    config: EngineConfig,

    /// Directory holding the SSTables
    storage_dir: PathBuf,

    wal: Mutex<WalWriter>,
    memtable: MemTable,
    storage: StorageManager,

    /// Shared by read transactions, exclusive for commit/flush/close
    txn_lock: RwLock<()>,

    closed: AtomicBool,
}

impl Engine {
    const WAL_FILENAME: &'static str = "wal.log";
    const SSTABLE_DIR: &'static str = "sstables";

    /// Open or create an engine
    ///
    /// On startup:
    /// 1. Create the data and SSTable directories
    /// 2. Load existing SSTables
    /// 3. Replay the WAL into the memtable, flush it, truncate the WAL
    pub fn open(config: EngineConfig) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;

        let storage_dir = config.data_dir.join(Self::SSTABLE_DIR);
        let wal_path = config.data_dir.join(Self::WAL_FILENAME);

        let storage = StorageManager::open(&storage_dir)?;
        let memtable = MemTable::new();

        let mut recovered = false;
        if wal_path.exists() {
            let (entries, result) = WalRecovery::recover(&wal_path)?;
            if result.entries_recovered > 0 || result.entries_corrupted > 0 {
                tracing::info!(
                    recovered = result.entries_recovered,
                    corrupted = result.entries_corrupted,
                    last_lsn = result.last_lsn,
                    truncated = result.was_truncated,
                    "WAL recovery finished"
                );
            }

            for entry in entries {
                for op in entry.operations {
                    match op {
                        Operation::Put { key, value } => memtable.put(key, value),
                        Operation::Delete { key } => memtable.delete(key),
                    };
                }
            }

            // Recovered writes become durable in an SSTable before the WAL is reset.
            if !memtable.is_empty() {
                storage.flush(&memtable)?;
                memtable.clear();
                recovered = true;
            }
        }

        let mut wal = WalWriter::open(&wal_path, config.wal_sync_strategy)?;
        if recovered {
            wal.truncate()?;
        }

        tracing::debug!(
            data_dir = %config.data_dir.display(),
            sstables = storage.sstable_count(),
            "engine opened"
        );

        Ok(Self {
            config,
            storage_dir,
            wal: Mutex::new(wal),
            memtable,
            storage,
            txn_lock: RwLock::new(()),
            closed: AtomicBool::new(false),
        })
    }

    /// Open with a path, using default settings otherwise
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(EngineConfig {
            data_dir: path.to_path_buf(),
            ..EngineConfig::default()
        })
    }

    /// Run `f` inside a read-only transaction
    ///
    /// The transaction ends when `f` returns, whatever the outcome.
    pub fn view<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&ReadTxn<'_>) -> std::result::Result<T, E>,
        E: From<TandemError>,
    {
        let guard = self.txn_lock.read();
        self.ensure_open()?;
        let txn = ReadTxn::new(self, guard);
        f(&txn)
    }

    /// Run `f` inside a read-write transaction and commit its writes
    ///
    /// If `f` fails nothing is written.
    pub fn update<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut WriteTxn<'_>) -> std::result::Result<T, E>,
        E: From<TandemError>,
    {
        self.ensure_open()?;
        let mut txn = WriteTxn::new(self);
        let out = f(&mut txn)?;
        txn.commit()?;
        Ok(out)
    }

    /// Get a value by key
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.view(|txn| txn.get(key))
    }

    /// Put a key-value pair
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.update(|txn| {
            txn.put(key, value);
            Ok(())
        })
    }

    /// Delete a key
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.update(|txn| {
            txn.delete(key);
            Ok(())
        })
    }

    /// Force a memtable flush regardless of its size
    pub fn flush(&self) -> Result<()> {
        let _guard = self.txn_lock.write();
        self.ensure_open()?;
        self.flush_locked()
    }

    /// Flush pending data, sync the WAL and reject further work
    ///
    /// Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let _guard = self.txn_lock.write();
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.flush_locked()?;
        self.wal.lock().sync()?;
        tracing::debug!(data_dir = %self.config.data_dir.display(), "engine closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Internals (called by transactions)
    // =========================================================================

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(TandemError::Closed);
        }
        Ok(())
    }

    /// Apply a committed batch. Caller holds `txn_lock` exclusively.
    fn apply_locked(&self, operations: Vec<Operation>) -> Result<()> {
        self.wal.lock().append_batch(operations.clone())?;

        for op in operations {
            match op {
                Operation::Put { key, value } => self.memtable.put(key, value),
                Operation::Delete { key } => self.memtable.delete(key),
            };
        }

        if self.memtable.should_flush(self.config.memtable_size_limit) {
            self.flush_locked()?;
        }
        Ok(())
    }

    /// Caller holds `txn_lock` exclusively.
    fn flush_locked(&self) -> Result<()> {
        if self.memtable.is_empty() {
            return Ok(());
        }
        self.storage.flush(&self.memtable)?;
        self.memtable.clear();
        self.wal.lock().truncate()?;
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Where SSTables are stored
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    pub fn memtable_entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    pub fn sstable_count(&self) -> usize {
        self.storage.sstable_count()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
