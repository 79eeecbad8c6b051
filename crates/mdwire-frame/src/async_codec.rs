//! `tokio_util` codec for datagram frames.

use bytes::BytesMut;
use mdwire_datagram::Datagram;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, encode_frame, MAX_FRAME_PAYLOAD};
use crate::error::FrameError;

/// Frames datagrams for `tokio_util::codec::Framed` and friends.
#[derive(Debug, Clone)]
pub struct DatagramCodec {
    max_payload_size: usize,
}

impl DatagramCodec {
    pub fn new() -> Self {
        Self::with_max_payload(MAX_FRAME_PAYLOAD)
    }

    /// A codec that rejects inbound frames longer than `max_payload_size`.
    pub fn with_max_payload(max_payload_size: usize) -> Self {
        Self {
            max_payload_size: max_payload_size.min(MAX_FRAME_PAYLOAD),
        }
    }
}

impl Default for DatagramCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for DatagramCodec {
    type Item = Datagram;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        decode_frame(src, self.max_payload_size)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(datagram) => Ok(Some(datagram)),
            None if buf.is_empty() => Ok(None),
            None => Err(FrameError::ConnectionClosed),
        }
    }
}

impl Encoder<Datagram> for DatagramCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Datagram, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(item.data(), dst)
    }
}

impl Encoder<&Datagram> for DatagramCodec {
    type Error = FrameError;

    fn encode(&mut self, item: &Datagram, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(item.data(), dst)
    }
}
