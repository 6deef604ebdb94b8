//! WAL Entry definitions
//!
//! One entry is one committed write transaction: every operation in it is
//! replayed together or not at all.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TandemError};

/// Entry header: LSN (8) + CRC (4) + body length (4)
pub const HEADER_SIZE: usize = 16;

/// Upper bound on a single encoded body; anything larger is treated as corruption
pub const MAX_BODY_SIZE: usize = 64 * 1024 * 1024;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// Operations committed together
    pub operations: Vec<Operation>,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },
}

impl Operation {
    pub fn key(&self) -> &[u8] {
        match self {
            Operation::Put { key, .. } | Operation::Delete { key } => key,
        }
    }
}

#[derive(Serialize)]
struct BodyRef<'a> {
    timestamp: u64,
    operations: &'a [Operation],
}

#[derive(Deserialize)]
struct Body {
    timestamp: u64,
    operations: Vec<Operation>,
}

impl WalEntry {
    /// Create an entry stamped with the current wall-clock time
    pub fn new(lsn: u64, operations: Vec<Operation>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            lsn,
            operations,
            timestamp,
        }
    }

    /// Encode as `LSN | CRC | Len | Body`
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let body = bincode::serialize(&BodyRef {
            timestamp: self.timestamp,
            operations: &self.operations,
        })?;
        if body.len() > MAX_BODY_SIZE {
            return Err(TandemError::Storage(format!(
                "WAL entry too large: {} bytes (max {})",
                body.len(),
                MAX_BODY_SIZE
            )));
        }

        let crc = Self::compute_crc(self.lsn, &body);
        let mut out = Vec::with_capacity(HEADER_SIZE + body.len());
        out.extend_from_slice(&self.lsn.to_le_bytes());
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Decode one entry from the front of `bytes`, returning it and the
    /// number of bytes consumed
    pub fn deserialize(bytes: &[u8]) -> Result<(Self, usize)> {
        if bytes.len() < HEADER_SIZE {
            return Err(TandemError::WalCorruption(format!(
                "truncated header: {} of {} bytes",
                bytes.len(),
                HEADER_SIZE
            )));
        }

        let (lsn, crc, len) = Self::parse_header(&bytes[..HEADER_SIZE])?;
        let end = HEADER_SIZE + len;
        if bytes.len() < end {
            return Err(TandemError::WalCorruption(format!(
                "truncated body at lsn {}: {} of {} bytes",
                lsn,
                bytes.len() - HEADER_SIZE,
                len
            )));
        }

        let entry = Self::decode_body(lsn, crc, &bytes[HEADER_SIZE..end])?;
        Ok((entry, end))
    }

    /// CRC32 over the LSN and body, so a record cannot be replayed under
    /// another sequence number
    pub fn compute_crc(lsn: u64, body: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&lsn.to_le_bytes());
        hasher.update(body);
        hasher.finalize()
    }

    /// Split a header into (lsn, crc, body_len)
    pub(crate) fn parse_header(header: &[u8]) -> Result<(u64, u32, usize)> {
        let mut lsn = [0u8; 8];
        let mut crc = [0u8; 4];
        let mut len = [0u8; 4];
        lsn.copy_from_slice(&header[0..8]);
        crc.copy_from_slice(&header[8..12]);
        len.copy_from_slice(&header[12..16]);

        let len = u32::from_le_bytes(len) as usize;
        if len > MAX_BODY_SIZE {
            return Err(TandemError::WalCorruption(format!(
                "implausible body length {}",
                len
            )));
        }
        Ok((u64::from_le_bytes(lsn), u32::from_le_bytes(crc), len))
    }

    /// Verify and decode a body read after its header
    pub(crate) fn decode_body(lsn: u64, crc: u32, body: &[u8]) -> Result<Self> {
        let actual = Self::compute_crc(lsn, body);
        if actual != crc {
            return Err(TandemError::WalCorruption(format!(
                "CRC mismatch at lsn {}: stored {:08x}, computed {:08x}",
                lsn, crc, actual
            )));
        }

        let body: Body = bincode::deserialize(body).map_err(|e| {
            TandemError::WalCorruption(format!("undecodable body at lsn {}: {}", lsn, e))
        })?;
        Ok(Self {
            lsn,
            operations: body.operations,
            timestamp: body.timestamp,
        })
    }
}
