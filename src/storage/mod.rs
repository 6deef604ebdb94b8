//! Storage Module
//!
//! Persistent storage layer using SSTable files.
//!
//! ## Responsibilities
//! - Persist flushed memtables to disk in sorted format
//! - Point lookups newest → oldest
//! - Prefix range resolution for iteration
//!
//! Tables are never compacted; every flush adds one file.

mod manager;
mod sstable;

pub use manager::{StorageManager, TableLocation};
pub use sstable::{SSTable, SSTableBuilder, SSTableReader};
