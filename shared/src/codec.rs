//! Binary codecs for the audit log and the ground link
//!
//! Audit records are fixed 7-byte entries in network byte order:
//! ```text
//! [ 2 bytes: command type ][ 4 bytes: timestamp (s) ][ 1 byte: status ]
//! ```
//!
//! Link frames carry one packet for one port:
//! ```text
//! [ 1 byte: port ][ 2 bytes: length (u16, big-endian) ][ N bytes: payload ]
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::limits::MAX_FRAME_PAYLOAD;
use crate::{CommandStatus, Port};

/// Size of one encoded audit record
pub const AUDIT_RECORD_SIZE: usize = 7;

/// Size of a link frame header
pub const FRAME_HEADER_SIZE: usize = 3;

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("Payload too large: {0} bytes (max: {MAX_FRAME_PAYLOAD})")]
    PayloadTooLarge(usize),

    #[error("Invalid frame length prefix: {0}")]
    InvalidLength(u16),

    #[error("Unknown command status byte: {0}")]
    UnknownStatus(u8),

    #[error("Truncated audit log: {0} trailing bytes")]
    TrailingBytes(usize),
}

/// One entry of the command audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditRecord {
    pub kind: u16,
    pub timestamp: u32,
    pub status: CommandStatus,
}

impl AuditRecord {
    /// Encode this record into its 7-byte form
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(AUDIT_RECORD_SIZE);
        buf.put_u16(self.kind);
        buf.put_u32(self.timestamp);
        buf.put_u8(self.status.into());
        buf.freeze()
    }

    /// Try to decode one record from the front of a buffer
    ///
    /// Returns `Ok(None)` if fewer than 7 bytes are buffered.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Self>, CodecError> {
        if buf.len() < AUDIT_RECORD_SIZE {
            return Ok(None);
        }

        let status_byte = buf[AUDIT_RECORD_SIZE - 1];
        let status =
            CommandStatus::try_from(status_byte).map_err(CodecError::UnknownStatus)?;

        let kind = buf.get_u16();
        let timestamp = buf.get_u32();
        buf.advance(1);

        Ok(Some(Self {
            kind,
            timestamp,
            status,
        }))
    }

    /// Decode every record of a complete audit log file
    pub fn decode_all(data: &[u8]) -> Result<Vec<Self>, CodecError> {
        let mut buf = BytesMut::from(data);
        let mut records = Vec::with_capacity(data.len() / AUDIT_RECORD_SIZE);

        while let Some(record) = Self::decode(&mut buf)? {
            records.push(record);
        }

        if !buf.is_empty() {
            return Err(CodecError::TrailingBytes(buf.len()));
        }

        Ok(records)
    }
}

/// Encode one packet into a link frame
pub fn encode_frame(port: Port, payload: &[u8]) -> Result<Bytes, CodecError> {
    let mut buf = BytesMut::new();
    encode_frame_into(port, payload, &mut buf)?;
    Ok(buf.freeze())
}

/// Encode one packet directly into a provided buffer
pub fn encode_frame_into(port: Port, payload: &[u8], buf: &mut BytesMut) -> Result<(), CodecError> {
    if payload.len() > MAX_FRAME_PAYLOAD {
        return Err(CodecError::PayloadTooLarge(payload.len()));
    }

    buf.reserve(FRAME_HEADER_SIZE + payload.len());
    buf.put_u8(port.0);
    buf.put_u16(payload.len() as u16);
    buf.put_slice(payload);

    Ok(())
}

/// Try to decode one link frame from a buffer
///
/// Returns:
/// - `Ok(Some((port, payload)))` if a complete frame was decoded
/// - `Ok(None)` if more data is needed
/// - `Err(...)` if the length prefix is invalid
pub fn decode_frame(buf: &mut BytesMut) -> Result<Option<(Port, Bytes)>, CodecError> {
    if buf.len() < FRAME_HEADER_SIZE {
        return Ok(None);
    }

    // Peek at the header without consuming
    let port = Port(buf[0]);
    let len = u16::from_be_bytes([buf[1], buf[2]]);

    if len as usize > MAX_FRAME_PAYLOAD {
        return Err(CodecError::InvalidLength(len));
    }

    let total_len = FRAME_HEADER_SIZE + len as usize;
    if buf.len() < total_len {
        return Ok(None);
    }

    buf.advance(FRAME_HEADER_SIZE);
    let payload = buf.split_to(len as usize).freeze();

    Ok(Some((port, payload)))
}

/// Decoder state machine for streaming decoding
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Partial frame data being accumulated
    buffer: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(1024),
        }
    }

    /// Add data to the decoder buffer
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode the next frame from the buffer
    ///
    /// Call this repeatedly until it returns `Ok(None)` to drain all complete frames
    pub fn decode_next(&mut self) -> Result<Option<(Port, Bytes)>, CodecError> {
        decode_frame(&mut self.buffer)
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }
}
