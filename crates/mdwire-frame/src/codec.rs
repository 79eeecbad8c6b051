use bytes::{Buf, BufMut, BytesMut};
use mdwire_datagram::Datagram;

use crate::error::{FrameError, Result};

/// Frame header: length (2) = 2 bytes.
pub const HEADER_SIZE: usize = 2;

/// Largest datagram a uint16 length prefix can carry.
pub const MAX_FRAME_PAYLOAD: usize = u16::MAX as usize;

/// Encode one datagram's bytes into the wire format.
///
/// Wire format:
/// ```text
/// ┌─────────────┬────────────────────┐
/// │ Length      │ Datagram           │
/// │ (2B LE)     │ (Length bytes)     │
/// └─────────────┴────────────────────┘
/// ```
pub fn encode_frame(datagram: &[u8], dst: &mut BytesMut) -> Result<()> {
    if datagram.len() > MAX_FRAME_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: datagram.len(),
            max: MAX_FRAME_PAYLOAD,
        });
    }
    dst.reserve(HEADER_SIZE + datagram.len());
    dst.put_u16_le(datagram.len() as u16);
    dst.put_slice(datagram);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Datagram>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    let len = u16::from_le_bytes([src[0], src[1]]) as usize;
    if len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: len,
            max: max_payload,
        });
    }

    if src.len() < HEADER_SIZE + len {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    Ok(Some(Datagram::from_bytes(src.split_to(len).freeze())))
}

/// Configuration for framed streams.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum datagram size in bytes. Default and ceiling: 65535.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: MAX_FRAME_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
