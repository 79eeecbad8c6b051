use std::io::{self, ErrorKind, Write};

use bytes::BytesMut;
use mdwire_datagram::Datagram;
use mdwire_transport::MdStream;
use tracing::trace;

use crate::codec::{encode_frame, FrameConfig, HEADER_SIZE, MAX_FRAME_PAYLOAD};
use crate::error::{FrameError, Result};
use crate::reader::transport_to_frame_error;

/// Writes complete datagrams to any `Write` stream.
///
/// One writer per stream: frames from concurrent writers could interleave.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(HEADER_SIZE + MAX_FRAME_PAYLOAD),
            config,
        }
    }

    /// Write one datagram as a frame (blocking).
    pub fn write_frame(&mut self, datagram: &Datagram) -> Result<()> {
        self.write_bytes(datagram.data())
    }

    /// Frame and write raw datagram bytes.
    ///
    /// With a write timeout configured, a stalled stream fails with an
    /// `Io` error for which [`FrameError::is_timeout`] holds. The frame may
    /// then be partially on the wire, so the stream should not be reused.
    pub fn write_bytes(&mut self, datagram: &[u8]) -> Result<()> {
        let max = self.config.max_payload_size.min(MAX_FRAME_PAYLOAD);
        if datagram.len() > max {
            return Err(FrameError::PayloadTooLarge {
                size: datagram.len(),
                max,
            });
        }

        self.buf.clear();
        encode_frame(datagram, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if self.retry_stalled(&err) => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        trace!(len = datagram.len(), "frame sent");

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if self.retry_stalled(&err) => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// `WouldBlock` is retried only when no write timeout bounds the send.
    /// Under `SO_SNDTIMEO` it is how an expired timeout surfaces.
    fn retry_stalled(&self, err: &io::Error) -> bool {
        err.kind() == ErrorKind::WouldBlock && self.config.write_timeout.is_none()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameWriter<MdStream> {
    /// Create a frame writer for `MdStream` and apply write timeout from config.
    pub fn with_config_stream(inner: MdStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}
