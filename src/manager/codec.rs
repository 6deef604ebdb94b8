//! Value compression (LZ4 block format, size-prepended)

use super::ManagerError;

/// Largest decompressed size a stored value may declare (256 MiB)
pub const MAX_DECOMPRESSED_SIZE: usize = 256 * 1024 * 1024;

pub fn compress(value: &[u8]) -> Vec<u8> {
    lz4_flex::compress_prepend_size(value)
}

pub fn decompress(stored: &[u8]) -> Result<Vec<u8>, ManagerError> {
    if stored.len() < 4 {
        return Err(ManagerError::Decode(format!(
            "compressed value of {} bytes has no size header",
            stored.len()
        )));
    }
    let declared = u32::from_le_bytes([stored[0], stored[1], stored[2], stored[3]]) as usize;
    if declared > MAX_DECOMPRESSED_SIZE {
        return Err(ManagerError::Decode(format!(
            "compressed value declares {} bytes, limit is {}",
            declared, MAX_DECOMPRESSED_SIZE
        )));
    }
    lz4_flex::decompress_size_prepended(stored)
        .map_err(|e| ManagerError::Decode(format!("corrupt compressed value: {}", e)))
}

