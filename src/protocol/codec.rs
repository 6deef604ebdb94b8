//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//! ```text
//! ┌────────────┬──────────┬─────────────────────────────┐
//! │ Version(1) │ Len (4)  │   bincode(Request | Reply)  │
//! └────────────┴──────────┴─────────────────────────────┘
//! ```
//! `Len` is big-endian and counts payload bytes only.

use std::io::{Read, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, TandemError};

use super::{Reply, Request};

/// Frame format version
pub const FRAME_VERSION: u8 = 1;

/// Header size: 1 byte version + 4 bytes length
pub const HEADER_SIZE: usize = 5;

/// Maximum payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

// =============================================================================
// Frame Encoding/Decoding
// =============================================================================

/// Encode a message into one frame
pub fn encode_frame<T: Serialize>(message: &T) -> Result<Vec<u8>> {
    let payload = bincode::serialize(message)?;
    if payload.len() > MAX_PAYLOAD_SIZE as usize {
        return Err(TandemError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload.len(),
            MAX_PAYLOAD_SIZE
        )));
    }

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.push(FRAME_VERSION);
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decode one complete frame
pub fn decode_frame<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    if bytes.len() < HEADER_SIZE {
        return Err(TandemError::Protocol(format!(
            "Incomplete header: expected {} bytes, got {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let payload_len = parse_header(&bytes[..HEADER_SIZE])?;
    let total_len = HEADER_SIZE + payload_len;
    if bytes.len() < total_len {
        return Err(TandemError::Protocol(format!(
            "Incomplete payload: expected {} bytes, got {}",
            total_len,
            bytes.len()
        )));
    }

    Ok(bincode::deserialize(&bytes[HEADER_SIZE..total_len])?)
}

/// Validate a header and return the payload length
fn parse_header(header: &[u8]) -> Result<usize> {
    if header[0] != FRAME_VERSION {
        return Err(TandemError::Protocol(format!(
            "Unsupported frame version: {}",
            header[0]
        )));
    }

    let payload_len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);
    if payload_len > MAX_PAYLOAD_SIZE {
        return Err(TandemError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload_len, MAX_PAYLOAD_SIZE
        )));
    }
    Ok(payload_len as usize)
}

pub fn encode_request(request: &Request) -> Result<Vec<u8>> {
    encode_frame(request)
}

pub fn decode_request(bytes: &[u8]) -> Result<Request> {
    decode_frame(bytes)
}

pub fn encode_reply(reply: &Reply) -> Result<Vec<u8>> {
    encode_frame(reply)
}

pub fn decode_reply(bytes: &[u8]) -> Result<Reply> {
    decode_frame(bytes)
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read one frame from a stream
///
/// Blocks until a complete frame is received or an error occurs.
/// Socket failures surface as `TandemError::Io`; a bad header as
/// `TandemError::Protocol`; an undecodable payload as
/// `TandemError::Serialization`.
pub fn read_frame<R: Read, T: DeserializeOwned>(reader: &mut R) -> Result<T> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;
    let payload_len = parse_header(&header)?;

    let mut payload = vec![0u8; payload_len];
    if payload_len > 0 {
        reader.read_exact(&mut payload)?;
    }

    Ok(bincode::deserialize(&payload)?)
}

/// Write one frame to a stream and flush it
pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, message: &T) -> Result<()> {
    let bytes = encode_frame(message)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

pub fn read_request<R: Read>(reader: &mut R) -> Result<Request> {
    read_frame(reader)
}

pub fn write_request<W: Write>(writer: &mut W, request: &Request) -> Result<()> {
    write_frame(writer, request)
}

pub fn read_reply<R: Read>(reader: &mut R) -> Result<Reply> {
    read_frame(reader)
}

pub fn write_reply<W: Write>(writer: &mut W, reply: &Reply) -> Result<()> {
    write_frame(writer, reply)
}
